//! A manually-advanced virtual clock for deterministic tests of
//! `delay`/`debounce`/`throttleFirst`/`sample`/`timeout`/windowing without
//! real sleeps. Nothing runs until [`TestScheduler::advance_time_by`] is
//! called; due tasks then execute synchronously, in timestamp order, inline
//! on the calling thread.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reactor_core::Disposable;

use crate::scheduler::{BoxTask, PeriodicTask, Scheduler, Worker};

enum Job {
    Once(BoxTask),
    Periodic(PeriodicTask, Duration),
}

struct Entry {
    due: Duration,
    seq: u64,
    job: Job,
    worker_active: Arc<AtomicBool>,
    task_cancelled: Arc<AtomicBool>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    now: Duration,
    heap: BinaryHeap<Entry>,
    seq: u64,
}

/// Virtual-clock scheduler: every `Worker` it creates shares the same clock.
#[derive(Clone)]
pub struct TestScheduler {
    state: Arc<Mutex<State>>,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                now: Duration::ZERO,
                heap: BinaryHeap::new(),
                seq: 0,
            })),
        }
    }

    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Advance the virtual clock by `delta`, running every due task (and any
    /// tasks they themselves schedule within the new window) synchronously,
    /// in timestamp order.
    pub fn advance_time_by(&self, delta: Duration) {
        let target = {
            let guard = self.state.lock();
            guard.now + delta
        };
        loop {
            let due_entry = {
                let mut guard = self.state.lock();
                match guard.heap.peek() {
                    Some(entry) if entry.due <= target => {
                        let entry = guard.heap.pop().expect("peeked entry must exist");
                        guard.now = entry.due;
                        Some(entry)
                    }
                    _ => None,
                }
            };
            match due_entry {
                None => break,
                Some(entry) => self.fire(entry),
            }
        }
        let mut guard = self.state.lock();
        guard.now = target;
    }

    fn fire(&self, entry: Entry) {
        let live = entry.worker_active.load(Ordering::Acquire)
            && !entry.task_cancelled.load(Ordering::Acquire);
        match entry.job {
            Job::Once(task) => {
                if live {
                    task();
                }
            }
            Job::Periodic(task, period) => {
                if live {
                    task();
                    let next_due = entry.due + period;
                    let mut guard = self.state.lock();
                    let seq = guard.seq;
                    guard.seq += 1;
                    guard.heap.push(Entry {
                        due: next_due,
                        seq,
                        job: Job::Periodic(task, period),
                        worker_active: entry.worker_active,
                        task_cancelled: entry.task_cancelled,
                    });
                }
            }
        }
    }

    fn push(&self, due: Duration, job: Job, worker_active: Arc<AtomicBool>) -> Disposable {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut guard = self.state.lock();
        let seq = guard.seq;
        guard.seq += 1;
        guard.heap.push(Entry {
            due,
            seq,
            job,
            worker_active,
            task_cancelled: cancelled.clone(),
        });
        drop(guard);
        Disposable::new(move || cancelled.store(true, Ordering::Release))
    }
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TestScheduler {
    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(TestWorker {
            scheduler: self.clone(),
            active: Arc::new(AtomicBool::new(true)),
        })
    }
}

struct TestWorker {
    scheduler: TestScheduler,
    active: Arc<AtomicBool>,
}

impl Worker for TestWorker {
    fn schedule(&self, task: BoxTask) -> Disposable {
        let now = self.scheduler.now();
        self.scheduler.push(now, Job::Once(task), self.active.clone())
    }

    fn schedule_after(
        &self,
        task: BoxTask,
        delay: Duration,
    ) -> Result<Disposable, reactor_core::ReactorError> {
        let due = self.scheduler.now() + delay;
        Ok(self.scheduler.push(due, Job::Once(task), self.active.clone()))
    }

    fn schedule_periodic(
        &self,
        task: PeriodicTask,
        initial: Duration,
        period: Duration,
    ) -> Result<Disposable, reactor_core::ReactorError> {
        let due = self.scheduler.now() + initial;
        Ok(self
            .scheduler
            .push(due, Job::Periodic(task, period), self.active.clone()))
    }

    fn dispose(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}
