//! Small pieces shared across operator implementations.

use std::sync::atomic::{AtomicBool, Ordering};

use reactor_core::{CompositeDisposable, ContractViolation, Disposable, Hooks};

/// A `Disposable` whose action disposes `composite`. `CompositeDisposable`
/// itself isn't a `Disposable` (it supports `add`/`remove`, which a plain
/// `Disposable` doesn't need), so fan-in stages that hand a single cancellation
/// handle to `on_subscribe` while fanning out to several upstream branches use
/// this to bridge the two.
pub(crate) fn composite_handle(composite: &CompositeDisposable) -> Disposable {
    let composite = composite.clone();
    Disposable::new(move || composite.dispose())
}

/// A single-shot latch: the first caller to `try_close` gets `true`, every
/// later caller gets `false`. Used by every stage that must forward at most
/// one terminal signal downstream regardless of how many threads race to
/// deliver one (upstream error racing a user-callback panic, for instance).
#[derive(Default)]
pub(crate) struct Latch(AtomicBool);

impl Latch {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns `true` the first time it is called, `false` on every call after.
    pub(crate) fn try_close(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A signal or side-effect callback panicked or raised after the stage had
/// already latched terminal; there is no downstream left to deliver it to.
pub(crate) fn report_undeliverable(reason: impl Into<String>) {
    Hooks::report(ContractViolation::Undeliverable { reason: reason.into() });
}
