//! `reactor-backpressure`: pull-based demand signaling.
//!
//! Everything in [`reactor_core`] is push — a [`reactor_core::Source`]
//! delivers at its own pace and the downstream's only lever is disposal.
//! This crate adds a parallel, demand-aware protocol
//! ([`BackpressuredSource`]/[`BackpressuredObserver`]/[`Subscription`]) for
//! stages that need to shed load rather than buffer it unboundedly, plus the
//! [`OverflowStrategy`] a producer falls back to when it outruns demand and
//! the two bridge functions that cross between the push and pull worlds.

mod channel;
mod contract;
mod overflow;
mod subscription;

pub use channel::{BackpressureChannel, Emitter, FromPush, ToPush};
pub use contract::{BackpressuredObserver, BackpressuredSource, BoxBackpressuredObserver};
pub use overflow::OverflowStrategy;
pub use subscription::{BoxSubscription, Subscription, UNBOUNDED_REQUEST};

pub mod prelude {
    pub use crate::{
        BackpressureChannel, BackpressuredObserver, BackpressuredSource, BoxBackpressuredObserver,
        BoxSubscription, Emitter, FromPush, OverflowStrategy, Subscription, ToPush, UNBOUNDED_REQUEST,
    };
}
