//! Observer serialization.
//!
//! Any stage that may receive concurrent upstream `Next` — `merge`,
//! `flatMap`, a Subject fed by multiple threads, `observeOn`'s queue drain —
//! must serialize its own downstream dispatch so the downstream `Observer`
//! never sees concurrent re-entry. [`SerializingObserver`] wraps a downstream
//! observer in a trampoline: the first caller to arrive drains a FIFO queue
//! of pending signals (via a busy-flag, not a held lock across the callback)
//! while later concurrent callers simply enqueue and return, guaranteeing
//! exactly one in-flight delivery to `downstream` at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contract::{Observer, Signal};
use crate::disposable::Disposable;

struct State<T, E> {
    queue: VecDeque<Signal<T, E>>,
    dispatching: bool,
    done: bool,
}

pub struct SerializingObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Mutex<State<T, E>>,
}

impl<T, E> SerializingObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(downstream: Arc<dyn Observer<T, E>>) -> Arc<Self> {
        Arc::new(Self {
            downstream,
            state: Mutex::new(State {
                queue: VecDeque::new(),
                dispatching: false,
                done: false,
            }),
        })
    }

    /// Enqueue `signal`; drains the queue inline if no other thread is
    /// currently dispatching. A terminal signal latches `done`, silently
    /// discarding anything emitted after it.
    pub fn emit(&self, signal: Signal<T, E>) {
        {
            let mut guard = self.state.lock();
            if guard.done {
                return;
            }
            guard.queue.push_back(signal);
            if guard.dispatching {
                return;
            }
            guard.dispatching = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let item = {
                let mut guard = self.state.lock();
                match guard.queue.pop_front() {
                    Some(item) => item,
                    None => {
                        guard.dispatching = false;
                        return;
                    }
                }
            };
            let terminal = item.is_terminal();
            match item {
                Signal::Next(v) => self.downstream.on_next(v),
                Signal::Error(e) => self.downstream.on_error(e),
                Signal::Complete => self.downstream.on_complete(),
            }
            if terminal {
                let mut guard = self.state.lock();
                guard.done = true;
                guard.dispatching = false;
                guard.queue.clear();
                return;
            }
        }
    }
}

impl<T, E> Observer<T, E> for SerializingObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_subscribe(&self, disposable: Disposable) {
        self.downstream.on_subscribe(disposable);
    }

    fn on_next(&self, value: T) {
        self.emit(Signal::Next(value));
    }

    fn on_error(&self, error: E) {
        self.emit(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.emit(Signal::Complete);
    }
}
