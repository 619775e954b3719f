//! [`Subscription`]: the backpressure-aware extension of
//! [`reactor_core::Disposable`] — `request(n)` plus `cancel()`.

/// Sentinel passed to `request` to mean "as many as you can produce",
/// degrading the channel to push semantics.
pub const UNBOUNDED_REQUEST: u64 = u64::MAX;

/// An extended disposable: `request(n)` accumulates outstanding demand,
/// `cancel()` is `dispose()` under this contract's name.
pub trait Subscription: Send + Sync {
    /// Request up to `n` additional `Next` signals. `n == 0` is a no-op.
    /// Pass [`UNBOUNDED_REQUEST`] for unbounded (push) demand.
    fn request(&self, n: u64);

    /// Cancel the subscription. Idempotent.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

pub type BoxSubscription = Box<dyn Subscription>;
