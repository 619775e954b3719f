//! `ReplaySubject`: an ordered log of past `Next` signals, bounded or
//! unbounded. A new subscriber replays the whole buffer before joining the
//! live set (or before receiving an already-latched terminal).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use reactor_core::{BoxObserver, Disposable, Observer, Signal, Source};

use crate::broadcaster::{Broadcaster, SubscribeOutcome};

struct ReplayBuffer<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
}

impl<T> ReplayBuffer<T> {
    fn push(&mut self, value: T) {
        self.items.push_back(value);
        if let Some(cap) = self.capacity {
            while self.items.len() > cap {
                self.items.pop_front();
            }
        }
    }
}

pub struct ReplaySubject<T, E> {
    broadcaster: Arc<Broadcaster<T, E>>,
    buffer: Arc<RwLock<ReplayBuffer<T>>>,
}

impl<T, E> Clone for ReplaySubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            broadcaster: self.broadcaster.clone(),
            buffer: self.buffer.clone(),
        }
    }
}

impl<T, E> ReplaySubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    pub fn create_with_size(n: usize) -> Self {
        Self::with_capacity(Some(n))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            broadcaster: Arc::new(Broadcaster::new()),
            buffer: Arc::new(RwLock::new(ReplayBuffer {
                items: VecDeque::new(),
                capacity,
            })),
        }
    }

    pub fn has_observers(&self) -> bool {
        self.broadcaster.has_observers()
    }

    pub fn has_complete(&self) -> bool {
        matches!(self.broadcaster.terminal(), Some(Signal::Complete))
    }

    pub fn has_throwable(&self) -> bool {
        matches!(self.broadcaster.terminal(), Some(Signal::Error(_)))
    }

    fn replay_into(&self, observer: &dyn Observer<T, E>) {
        let snapshot: Vec<T> = self.buffer.read().items.iter().cloned().collect();
        for v in snapshot {
            observer.on_next(v);
        }
    }
}

impl<T, E> Source<T, E> for ReplaySubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let observer: Arc<dyn Observer<T, E>> = Arc::from(observer);
        match self.broadcaster.subscribe(observer.clone()) {
            SubscribeOutcome::Terminal(signal) => {
                observer.on_subscribe(Disposable::disposed());
                self.replay_into(observer.as_ref());
                match signal {
                    Signal::Error(e) => observer.on_error(e),
                    Signal::Complete => observer.on_complete(),
                    Signal::Next(_) => unreachable!("terminal latch never holds a Next"),
                }
            }
            SubscribeOutcome::Live(id) => {
                let broadcaster = self.broadcaster.clone();
                observer.on_subscribe(Disposable::new(move || broadcaster.unsubscribe(id)));
                self.replay_into(observer.as_ref());
            }
        }
    }
}

impl<T, E> Observer<T, E> for ReplaySubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, _disposable: Disposable) {}

    fn on_next(&self, value: T) {
        self.buffer.write().push(value.clone());
        self.broadcaster.emit(Signal::Next(value));
    }

    fn on_error(&self, error: E) {
        self.broadcaster.emit(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.broadcaster.emit(Signal::Complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder(Arc<Mutex<Vec<String>>>);
    impl Observer<i32, String> for Recorder {
        fn on_subscribe(&self, _d: Disposable) {}
        fn on_next(&self, value: i32) {
            self.0.lock().push(format!("next:{value}"));
        }
        fn on_error(&self, error: String) {
            self.0.lock().push(format!("error:{error}"));
        }
        fn on_complete(&self) {
            self.0.lock().push("complete".to_string());
        }
    }

    #[test]
    fn bounded_replay_keeps_only_the_last_n_values() {
        let subject = ReplaySubject::<i32, String>::create_with_size(2);
        subject.on_next(1);
        subject.on_next(2);
        subject.on_next(3);
        let log = Arc::new(Mutex::new(Vec::new()));
        subject.subscribe(Box::new(Recorder(log.clone())));
        assert_eq!(*log.lock(), vec!["next:2", "next:3"]);
    }

    #[test]
    fn unbounded_replay_then_terminal_for_late_subscriber() {
        let subject = ReplaySubject::<i32, String>::unbounded();
        subject.on_next(1);
        subject.on_next(2);
        subject.on_complete();
        let log = Arc::new(Mutex::new(Vec::new()));
        subject.subscribe(Box::new(Recorder(log.clone())));
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "complete"]);
    }
}
