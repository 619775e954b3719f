//! Wraps a raw task in the worker-liveness + per-task-cancellation check
//! shared by every concrete `Worker` implementation, so disposing either the
//! individual task's handle or the owning worker silently no-ops the
//! execution rather than needing each scheduler backend to reimplement it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reactor_core::Disposable;

use crate::scheduler::BoxTask;

/// Wrap `task` so it only runs while `worker_active` is still set and the
/// returned `Disposable` has not been triggered. Returns the wrapped task
/// plus the disposable bound to this task alone.
pub(crate) fn guard(worker_active: Arc<AtomicBool>, task: BoxTask) -> (BoxTask, Disposable) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    let wrapped: BoxTask = Box::new(move || {
        if worker_active.load(Ordering::Acquire) && !flag.load(Ordering::Acquire) {
            task();
        }
    });
    let handle_flag = cancelled;
    let disposable = Disposable::new(move || {
        handle_flag.store(true, Ordering::Release);
    });
    (wrapped, disposable)
}

pub(crate) fn still_live(worker_active: &AtomicBool, task_cancelled: &AtomicBool) -> bool {
    worker_active.load(Ordering::Acquire) && !task_cancelled.load(Ordering::Acquire)
}
