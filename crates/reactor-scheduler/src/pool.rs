//! Bounded (`computation`) and elastic (`io`) thread-pool schedulers.
//!
//! `computation` is sized to hardware concurrency, mirroring a bounded pool
//! of daemon threads — Rust has no daemon-thread concept, so pool threads
//! simply run for the lifetime of the scheduler and the process exits
//! without waiting on them (`main` returning does not join non-detached
//! threads).
//!
//! `io` approximates the "unbounded pool for blocking I/O" by spawning a
//! fresh OS thread per submitted task rather than maintaining a fixed
//! worker count, the simplest faithful rendition of an elastic pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use reactor_core::{Disposable, ReactorError};

use crate::delay_queue::DelayQueue;
use crate::scheduler::{BoxTask, PeriodicTask, Scheduler, Worker};
use crate::task_guard;

struct FixedPoolShared {
    queue: Mutex<VecDeque<BoxTask>>,
    cond: Condvar,
    shutdown: AtomicBool,
}

/// A bounded pool of worker threads pulling from one shared FIFO queue.
struct FixedPool {
    shared: Arc<FixedPoolShared>,
}

impl FixedPool {
    fn spawn(size: usize, thread_name: &'static str) -> Self {
        let shared = Arc::new(FixedPoolShared {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        for idx in 0..size.max(1) {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name(format!("{thread_name}-{idx}"))
                .spawn(move || Self::run(shared))
                .expect("failed to spawn computation pool thread");
        }
        Self { shared }
    }

    fn run(shared: Arc<FixedPoolShared>) {
        loop {
            let mut guard = shared.queue.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = guard.pop_front() {
                    drop(guard);
                    task();
                    break;
                }
                shared.cond.wait(&mut guard);
            }
        }
    }

    fn submit(&self, task: BoxTask) {
        let mut guard = self.shared.queue.lock();
        guard.push_back(task);
        drop(guard);
        self.shared.cond.notify_one();
    }
}

pub struct ComputationScheduler {
    pool: FixedPool,
    timers: DelayQueue,
}

impl ComputationScheduler {
    pub fn new() -> Self {
        Self::with_parallelism(num_cpus::get())
    }

    pub fn with_parallelism(size: usize) -> Self {
        Self {
            pool: FixedPool::spawn(size, "reactor-computation"),
            timers: DelayQueue::spawn("reactor-computation-timer"),
        }
    }
}

impl Default for ComputationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ComputationScheduler {
    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(PoolWorker {
            submit: PoolSubmit::Fixed(self.pool.shared.clone()),
            timers: self.timers.clone(),
            active: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// `io` spawns one thread per task rather than sharing a fixed pool.
pub struct IoScheduler {
    timers: DelayQueue,
}

impl IoScheduler {
    pub fn new() -> Self {
        Self {
            timers: DelayQueue::spawn("reactor-io-timer"),
        }
    }
}

impl Default for IoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for IoScheduler {
    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(PoolWorker {
            submit: PoolSubmit::Elastic,
            timers: self.timers.clone(),
            active: Arc::new(AtomicBool::new(true)),
        })
    }
}

enum PoolSubmit {
    Fixed(Arc<FixedPoolShared>),
    Elastic,
}

impl PoolSubmit {
    fn submit(&self, task: BoxTask) {
        match self {
            PoolSubmit::Fixed(shared) => {
                let mut guard = shared.queue.lock();
                guard.push_back(task);
                drop(guard);
                shared.cond.notify_one();
            }
            PoolSubmit::Elastic => {
                std::thread::spawn(task);
            }
        }
    }
}

struct PoolWorker {
    submit: PoolSubmit,
    timers: DelayQueue,
    active: Arc<AtomicBool>,
}

impl Worker for PoolWorker {
    fn schedule(&self, task: BoxTask) -> Disposable {
        let (wrapped, disposable) = task_guard::guard(self.active.clone(), task);
        self.submit.submit(wrapped);
        disposable
    }

    fn schedule_after(&self, task: BoxTask, delay: Duration) -> Result<Disposable, ReactorError> {
        let (wrapped, disposable) = task_guard::guard(self.active.clone(), task);
        let submit = self.submit.clone_handle();
        self.timers.push_after(
            delay,
            Box::new(move || {
                submit.submit(wrapped);
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
        let cancelled = Arc::new(AtomicBool::new(false));
        let disposable = {
            let flag = cancelled.clone();
            Disposable::new(move || flag.store(true, Ordering::Release))
        };

        fn arm(
            timers: DelayQueue,
            submit: PoolSubmit,
            worker_active: Arc<AtomicBool>,
            cancelled: Arc<AtomicBool>,
            task: PeriodicTask,
            due: std::time::Instant,
            period: Duration,
        ) {
            let t = timers.clone();
            let wa = worker_active.clone();
            let c = cancelled.clone();
            let job = task.clone();
            let submit_for_fire = submit.clone_handle();
            timers.push_at(
                due,
                Box::new(move || {
                    if !task_guard::still_live(&wa, &c) {
                        return;
                    }
                    let run_task = job.clone();
                    submit_for_fire.submit(Box::new(move || run_task()));
                    let next_due = std::time::Instant::now() + period;
                    arm(t, submit, wa, c, job, next_due, period);
                }),
            );
        }

        let due = std::time::Instant::now() + initial;
        arm(
            self.timers.clone(),
            self.submit.clone_handle(),
            self.active.clone(),
            cancelled,
            task,
            due,
            period,
        );
        Ok(disposable)
    }

    fn dispose(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}

impl PoolSubmit {
    fn clone_handle(&self) -> PoolSubmit {
        match self {
            PoolSubmit::Fixed(shared) => PoolSubmit::Fixed(shared.clone()),
            PoolSubmit::Elastic => PoolSubmit::Elastic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn computation_scheduler_runs_tasks_concurrently_across_workers() {
        let scheduler = ComputationScheduler::with_parallelism(4);
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let worker = scheduler.create_worker();
            let tx = tx.clone();
            worker.schedule(Box::new(move || {
                let _ = tx.send(i);
            }));
        }
        let mut received: Vec<i32> = (0..8)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        received.sort();
        assert_eq!(received, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn io_scheduler_runs_task_on_its_own_thread() {
        let scheduler = IoScheduler::new();
        let worker = scheduler.create_worker();
        let (tx, rx) = mpsc::channel();
        worker.schedule(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        let task_thread = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(task_thread, std::thread::current().id());
    }

    #[test]
    fn disposing_pool_worker_cancels_delayed_task() {
        let scheduler = ComputationScheduler::with_parallelism(2);
        let worker = scheduler.create_worker();
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        worker
            .schedule_after(
                Box::new(move || r.store(true, Ordering::SeqCst)),
                Duration::from_millis(40),
            )
            .unwrap();
        worker.dispose();
        std::thread::sleep(Duration::from_millis(80));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
