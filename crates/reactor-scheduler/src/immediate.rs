//! Runs every task synchronously on the calling thread. Delay is not
//! supported: `schedule_after`/`schedule_periodic` fail with
//! `UnsupportedOperation`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reactor_core::{Disposable, ReactorError};

use crate::scheduler::{BoxTask, PeriodicTask, Scheduler, Worker, unsupported};

#[derive(Default)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ImmediateScheduler {
    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(ImmediateWorker {
            disposed: AtomicBool::new(false),
        })
    }
}

struct ImmediateWorker {
    disposed: AtomicBool,
}

impl Worker for ImmediateWorker {
    fn schedule(&self, task: BoxTask) -> Disposable {
        if self.disposed.load(Ordering::Acquire) {
            return Disposable::disposed();
        }
        task();
        Disposable::disposed()
    }

    fn schedule_after(&self, _task: BoxTask, _delay: Duration) -> Result<Disposable, ReactorError> {
        Err(unsupported("delayed scheduling"))
    }

    fn schedule_periodic(
        &self,
        _task: PeriodicTask,
        _initial: Duration,
        _period: Duration,
    ) -> Result<Disposable, ReactorError> {
        Err(unsupported("periodic scheduling"))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
