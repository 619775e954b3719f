//! Facade crate: re-exports the whole reactive-stream surface — contract,
//! schedulers, operators/`Stream`, subjects, and the backpressure bridge —
//! as a single `use reactor::prelude::*`, so a downstream crate need not
//! name or depend on the five sub-crates individually.

pub use reactor_backpressure as backpressure;
pub use reactor_core as core;
pub use reactor_operators as operators;
pub use reactor_scheduler as scheduler;
pub use reactor_subjects as subjects;

pub mod prelude {
    pub use reactor_backpressure::prelude::*;
    pub use reactor_core::prelude::*;
    pub use reactor_operators::prelude::*;
    pub use reactor_scheduler::prelude::*;
    pub use reactor_subjects::prelude::*;
}
