//! Scheduler/Worker abstraction.
//!
//! A [`Scheduler`] produces [`Worker`]s. A `Worker` accepts `schedule`,
//! `schedule_after` (delayed) and `schedule_periodic` tasks, all returning a
//! [`Disposable`]; disposing a single task's handle cancels only that task,
//! while disposing the `Worker` cancels every task bound to it, run or not.

use std::time::Duration;

use reactor_core::{Disposable, ReactorError};

/// A unit of work handed to a [`Worker`]. Never re-run once executed.
pub type BoxTask = Box<dyn FnOnce() + Send>;

/// A unit of work handed to [`Worker::schedule_periodic`]. Unlike [`BoxTask`]
/// this is re-invoked on every tick, so it must be repeatable (`Fn`, not
/// `FnOnce`).
pub type PeriodicTask = std::sync::Arc<dyn Fn() + Send + Sync>;

/// A scoped, disposable handle to a scheduling context. Workers guarantee
/// that disposing them cancels any not-yet-run task bound to that worker;
/// already-running tasks finish, but no further tasks are accepted.
pub trait Worker: Send + Sync {
    /// Run `task` as soon as possible on this worker.
    fn schedule(&self, task: BoxTask) -> Disposable;

    /// Run `task` once, after `delay` has elapsed.
    ///
    /// Returns `Err` with `ErrorKind::ContractViolation` /
    /// `UnsupportedOperation` on schedulers that cannot honor a delay (the
    /// immediate scheduler).
    fn schedule_after(&self, task: BoxTask, delay: Duration) -> Result<Disposable, ReactorError>;

    /// Run `task` after `initial`, then again every `period` until disposed.
    fn schedule_periodic(
        &self,
        task: PeriodicTask,
        initial: Duration,
        period: Duration,
    ) -> Result<Disposable, ReactorError>;

    /// Cancel every task bound to this worker, run or not yet run, and
    /// refuse further scheduling (subsequent `schedule*` calls become no-ops
    /// returning an already-disposed handle).
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Produces [`Worker`]s that place work on this scheduler's execution
/// resource (a thread, a pool, a virtual clock, ...).
pub trait Scheduler: Send + Sync {
    fn create_worker(&self) -> std::sync::Arc<dyn Worker>;
}

pub(crate) fn unsupported(op: &'static str) -> ReactorError {
    ReactorError::new(
        "scheduler.unsupported_operation",
        format!("this scheduler does not support {op}"),
        reactor_core::ErrorKind::ContractViolation,
    )
    .with_cause(reactor_core::ContractViolation::UnsupportedOperation(op))
}
