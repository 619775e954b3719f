//! Spawns a dedicated OS thread per `Worker`: one thread per task, disposed
//! with a cancellation flag rather than a forceful interrupt.
//!
//! Safe Rust has no thread-interrupt primitive, so `dispose` here stops the
//! worker's thread from accepting further tasks and lets any in-flight task
//! run to completion — a cooperative approximation, consistent with this
//! runtime's cooperative-cancellation model elsewhere.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use reactor_core::{Disposable, ReactorError};

use crate::delay_queue::DelayQueue;
use crate::scheduler::{BoxTask, PeriodicTask, Scheduler, Worker};
use crate::single::schedule_periodic_via;
use crate::task_guard;

#[derive(Default)]
pub struct NewThreadScheduler;

impl NewThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for NewThreadScheduler {
    fn create_worker(&self) -> Arc<dyn Worker> {
        let (sender, receiver) = mpsc::channel::<BoxTask>();
        std::thread::Builder::new()
            .name("reactor-new-thread".to_string())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .expect("failed to spawn dedicated worker thread");
        Arc::new(NewThreadWorker {
            sender,
            timers: DelayQueue::spawn("reactor-new-thread-timer"),
            active: Arc::new(AtomicBool::new(true)),
        })
    }
}

struct NewThreadWorker {
    sender: mpsc::Sender<BoxTask>,
    timers: DelayQueue,
    active: Arc<AtomicBool>,
}

impl Worker for NewThreadWorker {
    fn schedule(&self, task: BoxTask) -> Disposable {
        let (wrapped, disposable) = task_guard::guard(self.active.clone(), task);
        let _ = self.sender.send(wrapped);
        disposable
    }

    fn schedule_after(&self, task: BoxTask, delay: Duration) -> Result<Disposable, ReactorError> {
        let (wrapped, disposable) = task_guard::guard(self.active.clone(), task);
        let sender = self.sender.clone();
        self.timers.push_after(
            delay,
            Box::new(move || {
                let _ = sender.send(wrapped);
            }),
        );
        Ok(disposable)
    }

    fn schedule_periodic(
        &self,
        task: PeriodicTask,
        initial: Duration,
        period: Duration,
    ) -> Result<Disposable, ReactorError> {
        schedule_periodic_via(&self.timers, &self.sender, self.active.clone(), task, initial, period)
    }

    fn dispose(&self) {
        self.active.store(false, Ordering::Release);
        self.timers.shutdown();
    }

    fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;

    #[test]
    fn each_worker_owns_a_dedicated_thread() {
        let scheduler = NewThreadScheduler::new();
        let w1 = scheduler.create_worker();
        let w2 = scheduler.create_worker();
        let (tx, rx) = std_mpsc::channel();
        let tx2 = tx.clone();
        w1.schedule(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        w2.schedule(Box::new(move || {
            let _ = tx2.send(std::thread::current().id());
        }));
        let t1 = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let t2 = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(t1, t2);
    }
}
