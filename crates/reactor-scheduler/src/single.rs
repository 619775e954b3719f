//! One background thread shared by every `Worker` the scheduler creates.
//! Because a single thread drains a single FIFO queue, signal ordering
//! through a `delay`/`debounce`/`sample` chain terminated on this scheduler
//! is preserved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use reactor_core::{Disposable, ReactorError};

use crate::delay_queue::DelayQueue;
use crate::scheduler::{BoxTask, PeriodicTask, Scheduler, Worker};
use crate::task_guard;

pub struct SingleScheduler {
    sender: mpsc::Sender<BoxTask>,
    timers: DelayQueue,
}

impl SingleScheduler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<BoxTask>();
        std::thread::Builder::new()
            .name("reactor-single".to_string())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .expect("failed to spawn single-thread scheduler");
        Self {
            sender,
            timers: DelayQueue::spawn("reactor-single-timer"),
        }
    }
}

impl Default for SingleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for SingleScheduler {
    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(SingleWorker {
            sender: self.sender.clone(),
            timers: self.timers.clone(),
            active: Arc::new(AtomicBool::new(true)),
        })
    }
}

struct SingleWorker {
    sender: mpsc::Sender<BoxTask>,
    timers: DelayQueue,
    active: Arc<AtomicBool>,
}

impl Worker for SingleWorker {
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
        schedule_periodic_via(
            &self.timers,
            &self.sender,
            self.active.clone(),
            task,
            initial,
            period,
        )
    }

    fn dispose(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}

pub(crate) fn schedule_periodic_via(
    timers: &DelayQueue,
    sender: &mpsc::Sender<BoxTask>,
    worker_active: Arc<AtomicBool>,
    task: PeriodicTask,
    initial: Duration,
    period: Duration,
) -> Result<Disposable, ReactorError> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let disposable = {
        let flag = cancelled.clone();
        Disposable::new(move || flag.store(true, Ordering::Release))
    };

    fn arm(
        timers: DelayQueue,
        sender: mpsc::Sender<BoxTask>,
        worker_active: Arc<AtomicBool>,
        cancelled: Arc<AtomicBool>,
        task: PeriodicTask,
        due: std::time::Instant,
        period: Duration,
    ) {
        let t = timers.clone();
        let s = sender.clone();
        let wa = worker_active.clone();
        let c = cancelled.clone();
        let job = task.clone();
        timers.push_at(
            due,
            Box::new(move || {
                if !task_guard::still_live(&wa, &c) {
                    return;
                }
                let run_task = job.clone();
                let _ = s.send(Box::new(move || {
                    run_task();
                }));
                let next_due = std::time::Instant::now() + period;
                arm(t, s, wa, c, job, next_due, period);
            }),
        );
    }

    let due = std::time::Instant::now() + initial;
    arm(
        timers.clone(),
        sender.clone(),
        worker_active,
        cancelled,
        task,
        due,
        period,
    );
    Ok(disposable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    #[test]
    fn tasks_run_in_fifo_order() {
        let scheduler = SingleScheduler::new();
        let worker = scheduler.create_worker();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel::<()>();
        for i in 0..5 {
            let l = log.clone();
            let tx = tx.clone();
            worker.schedule(Box::new(move || {
                l.lock().unwrap().push(i);
                let _ = tx.send(());
            }));
        }
        for _ in 0..5 {
            rx.recv_timeout(Duration::from_secs(1)).unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn disposing_worker_cancels_pending_tasks() {
        let scheduler = SingleScheduler::new();
        let worker = scheduler.create_worker();
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        let d = worker
            .schedule_after(
                Box::new(move || r.store(true, Ordering::SeqCst)),
                Duration::from_millis(50),
            )
            .unwrap();
        worker.dispose();
        drop(d);
        std::thread::sleep(Duration::from_millis(100));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn periodic_task_fires_multiple_times_then_stops_on_dispose() {
        let scheduler = SingleScheduler::new();
        let worker = scheduler.create_worker();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        let d = worker
            .schedule_periodic(
                Arc::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
                Duration::from_millis(10),
                Duration::from_millis(10),
            )
            .unwrap();
        let start = Instant::now();
        while count.load(Ordering::SeqCst) < 3 && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(5));
        }
        d.dispose();
        let at_dispose = count.load(Ordering::SeqCst);
        assert!(at_dispose >= 3);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), at_dispose);
    }
}
