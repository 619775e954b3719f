//! A background min-heap timer, shared by every scheduler backend that
//! needs delayed/periodic execution (`single`, `computation`, `io`,
//! `new-thread`). One dedicated thread wakes at the next due instant and
//! hands the task to a `fire` callback supplied by the owning scheduler
//! (direct execution for `single`, submission onto a pool queue for
//! `computation`/`io`).

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::scheduler::BoxTask;

struct ScheduledJob {
    due: Instant,
    seq: u64,
    task: BoxTask,
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so BinaryHeap (a max-heap) pops the earliest due time first.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    heap: BinaryHeap<ScheduledJob>,
    shutdown: bool,
}

/// A shared timer. Cloning shares the same background driver thread.
#[derive(Clone)]
pub(crate) struct DelayQueue {
    state: Arc<Mutex<State>>,
    wake: Arc<Condvar>,
    seq: Arc<AtomicU64>,
}

impl DelayQueue {
    /// Spawn the driver thread and return a handle to push onto it.
    pub(crate) fn spawn(thread_name: &'static str) -> Self {
        let state = Arc::new(Mutex::new(State {
            heap: BinaryHeap::new(),
            shutdown: false,
        }));
        let wake = Arc::new(Condvar::new());
        let queue = DelayQueue {
            state,
            wake,
            seq: Arc::new(AtomicU64::new(0)),
        };
        let driver = queue.clone();
        std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || driver.drive())
            .expect("failed to spawn timer driver thread");
        queue
    }

    fn drive(&self) {
        loop {
            let mut guard = self.state.lock();
            if guard.shutdown {
                return;
            }
            match guard.heap.peek() {
                None => {
                    self.wake.wait(&mut guard);
                }
                Some(job) => {
                    let now = Instant::now();
                    if job.due <= now {
                        let job = guard.heap.pop().expect("peeked job must exist");
                        drop(guard);
                        (job.task)();
                    } else {
                        let wait_for = job.due - now;
                        self.wake.wait_for(&mut guard, wait_for);
                    }
                }
            }
        }
    }

    /// Schedule `task` to run at `due`.
    pub(crate) fn push_at(&self, due: Instant, task: BoxTask) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.state.lock();
        guard.heap.push(ScheduledJob { due, seq, task });
        drop(guard);
        self.wake.notify_one();
    }

    pub(crate) fn push_after(&self, delay: Duration, task: BoxTask) {
        self.push_at(Instant::now() + delay, task);
    }

    pub(crate) fn shutdown(&self) {
        let mut guard = self.state.lock();
        guard.shutdown = true;
        guard.heap.clear();
        drop(guard);
        self.wake.notify_all();
    }
}
