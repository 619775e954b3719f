//! Process-wide hooks registry.
//!
//! A single lazily-initialized registry holds the error sink that receives
//! signals with nowhere else to go: errors after a Subject's terminal latch,
//! side-effect exceptions in `doOnError`/`doOnComplete`, and contract
//! violations. Hooks default to identity (a `tracing::error!`-backed sink);
//! `reset()` reverts to that default, which test suites rely on for isolation.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::ContractViolation;

/// Receives errors that have no `Observer` left to deliver to.
pub trait ErrorSink: Send + Sync {
    fn report(&self, violation: ContractViolation);
}

struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, violation: ContractViolation) {
        tracing::error!(error = %violation, "undeliverable reactor error");
    }
}

static HOOKS: Hooks = Hooks::new();

/// Holds the process-wide error sink behind an `ArcSwap` so reads never
/// block a concurrent `set_error_sink`.
pub struct Hooks {
    sink: OnceSwap,
}

/// `ArcSwap` needs a concrete default to initialize into; this indirection
/// lets `Hooks` live in a `static` without a `Lazy`/`OnceCell` dependency.
struct OnceSwap(std::sync::OnceLock<ArcSwap<dyn ErrorSink>>);

impl OnceSwap {
    const fn new() -> Self {
        Self(std::sync::OnceLock::new())
    }

    fn get(&self) -> &ArcSwap<dyn ErrorSink> {
        self.0
            .get_or_init(|| ArcSwap::from_pointee(TracingErrorSink))
    }
}

impl Hooks {
    const fn new() -> Self {
        Self {
            sink: OnceSwap::new(),
        }
    }

    /// Report a contract violation to the currently-installed sink.
    pub fn report(violation: ContractViolation) {
        HOOKS.sink.get().load().report(violation);
    }

    /// Install a custom sink (e.g. to assert on violations in a test, or to
    /// route them into an application's own observability stack).
    pub fn set_error_sink(sink: Arc<dyn ErrorSink>) {
        HOOKS.sink.get().store(sink);
    }

    /// Revert to the default `tracing`-backed sink.
    pub fn reset() {
        HOOKS.sink.get().store(Arc::new(TracingErrorSink));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    impl ErrorSink for RecordingSink {
        fn report(&self, violation: ContractViolation) {
            self.0.lock().push(violation.to_string());
        }
    }

    #[test]
    fn custom_sink_receives_reports_and_reset_restores_default() {
        let log = Arc::new(Mutex::new(Vec::new()));
        Hooks::set_error_sink(Arc::new(RecordingSink(log.clone())));
        Hooks::report(ContractViolation::MissingBackpressure);
        assert_eq!(log.lock().len(), 1);
        Hooks::reset();
        // After reset, our recording sink no longer receives reports.
        Hooks::report(ContractViolation::OnErrorNotImplemented);
        assert_eq!(log.lock().len(), 1);
    }
}
