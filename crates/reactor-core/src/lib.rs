//! `reactor-core`: the reactive contract.
//!
//! This crate defines the Observer/Source protocol, the `Disposable`
//! cancellation primitive, the error taxonomy and the process-wide hooks
//! registry — the seam every other crate in the workspace (`reactor-scheduler`,
//! `reactor-operators`, `reactor-subjects`, `reactor-backpressure`) builds on.
//! It intentionally contains no operator logic: that lives in
//! `reactor-operators` and friends, built over the `Source`/`Observer`
//! traits defined here as generic structs rather than a deep class
//! hierarchy.

pub mod contract;
pub mod disposable;
pub mod error;
pub mod hooks;
pub mod serialize;

pub use contract::{BoxObserver, Observer, Signal, Source, guard_call};
pub use disposable::{CompositeDisposable, Disposable, GenerationToken, MemberId, SerialDisposable};
pub use error::{ContractViolation, ErrorKind, ReactorError};
pub use hooks::{ErrorSink, Hooks};
pub use serialize::SerializingObserver;

pub mod prelude {
    pub use crate::contract::{BoxObserver, Observer, Signal, Source, guard_call};
    pub use crate::disposable::{
        CompositeDisposable, Disposable, GenerationToken, MemberId, SerialDisposable,
    };
    pub use crate::error::{ContractViolation, ErrorKind, ReactorError};
    pub use crate::hooks::{ErrorSink, Hooks};
    pub use crate::serialize::SerializingObserver;
}
