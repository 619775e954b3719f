//! Shared subscriber-set + terminal-latch + serialized dispatch machinery
//! used by every concrete [`crate::Subject`] flavor.
//!
//! Subscriber membership is snapshotted per dispatched signal (cloned out of
//! the lock before any `Observer` callback runs) so a subscriber added or
//! removed concurrently with an in-flight dispatch never races the
//! dispatch loop itself — a copy-on-write/snapshot-for-iteration policy.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{Observer, Signal};

pub(crate) enum SubscribeOutcome<T, E> {
    /// No terminal has landed yet; the caller is now a live subscriber under `id`.
    Live(u64),
    /// A terminal already landed before this subscribe call; deliver it directly.
    Terminal(Signal<T, E>),
}

struct State<T, E> {
    subscribers: Vec<(u64, Arc<dyn Observer<T, E>>)>,
    next_id: u64,
    terminal: Option<Signal<T, E>>,
    queue: VecDeque<Signal<T, E>>,
    dispatching: bool,
}

pub(crate) struct Broadcaster<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> Broadcaster<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                subscribers: Vec::new(),
                next_id: 0,
                terminal: None,
                queue: VecDeque::new(),
                dispatching: false,
            }),
        }
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn Observer<T, E>>) -> SubscribeOutcome<T, E> {
        let mut guard = self.state.lock();
        if let Some(terminal) = guard.terminal.clone() {
            return SubscribeOutcome::Terminal(terminal);
        }
        let id = guard.next_id;
        guard.next_id += 1;
        guard.subscribers.push((id, observer));
        SubscribeOutcome::Live(id)
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.retain(|(i, _)| *i != id);
    }

    pub(crate) fn has_observers(&self) -> bool {
        !self.state.lock().subscribers.is_empty()
    }

    pub(crate) fn terminal(&self) -> Option<Signal<T, E>> {
        self.state.lock().terminal.clone()
    }

    /// Enqueue `signal` for delivery to the current subscriber set. Reentrant
    /// calls made from within a subscriber's callback are queued and drained
    /// by the in-progress dispatch loop rather than interleaved.
    pub(crate) fn emit(&self, signal: Signal<T, E>) {
        {
            let mut guard = self.state.lock();
            if guard.terminal.is_some() {
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
            let (item, subscribers) = {
                let mut guard = self.state.lock();
                match guard.queue.pop_front() {
                    None => {
                        guard.dispatching = false;
                        return;
                    }
                    Some(item) => {
                        if item.is_terminal() {
                            guard.terminal = Some(item.clone());
                        }
                        let subs = guard.subscribers.iter().map(|(_, o)| o.clone()).collect();
                        (item, subs)
                    }
                }
            };
            self.dispatch(&item, &subscribers);
            if item.is_terminal() {
                let mut guard = self.state.lock();
                guard.dispatching = false;
                guard.subscribers.clear();
                return;
            }
        }
    }

    fn dispatch(&self, item: &Signal<T, E>, subscribers: &[Arc<dyn Observer<T, E>>]) {
        match item {
            Signal::Next(v) => {
                for s in subscribers {
                    s.on_next(v.clone());
                }
            }
            Signal::Error(e) => {
                for s in subscribers {
                    s.on_error(e.clone());
                }
            }
            Signal::Complete => {
                for s in subscribers {
                    s.on_complete();
                }
            }
        }
    }
}
