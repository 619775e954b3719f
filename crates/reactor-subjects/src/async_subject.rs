//! `AsyncSubject`: emits only the most recently received value, and only
//! once the source completes normally. An error terminates without ever
//! emitting a value, matching the other `Subject` flavors' error semantics.
//!
//! The generic [`Broadcaster`] terminal latch only remembers the
//! `Complete`/`Error` signal itself, not the `Next` that preceded it, so
//! this subject keeps its own last-value cell and performs the
//! value-then-complete catch-up by hand rather than going through
//! [`Broadcaster::subscribe`]'s generic terminal replay.

use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer, Signal, Source};

use crate::broadcaster::{Broadcaster, SubscribeOutcome};

struct LastValue<T> {
    value: Option<T>,
}

pub struct AsyncSubject<T, E> {
    broadcaster: Arc<Broadcaster<T, E>>,
    last: Arc<Mutex<LastValue<T>>>,
}

impl<T, E> Clone for AsyncSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            broadcaster: self.broadcaster.clone(),
            last: self.last.clone(),
        }
    }
}

impl<T, E> AsyncSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            broadcaster: Arc::new(Broadcaster::new()),
            last: Arc::new(Mutex::new(LastValue { value: None })),
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
}

impl<T, E> Default for AsyncSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Source<T, E> for AsyncSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let observer: Arc<dyn Observer<T, E>> = Arc::from(observer);
        match self.broadcaster.subscribe(observer.clone()) {
            SubscribeOutcome::Terminal(signal) => {
                observer.on_subscribe(Disposable::disposed());
                match signal {
                    Signal::Complete => {
                        if let Some(v) = self.last.lock().value.clone() {
                            observer.on_next(v);
                        }
                        observer.on_complete();
                    }
                    Signal::Error(e) => observer.on_error(e),
                    Signal::Next(_) => unreachable!("terminal latch never holds a Next"),
                }
            }
            SubscribeOutcome::Live(id) => {
                let broadcaster = self.broadcaster.clone();
                observer.on_subscribe(Disposable::new(move || broadcaster.unsubscribe(id)));
            }
        }
    }
}

impl<T, E> Observer<T, E> for AsyncSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, _disposable: Disposable) {}

    fn on_next(&self, value: T) {
        self.last.lock().value = Some(value);
    }

    fn on_error(&self, error: E) {
        self.broadcaster.emit(Signal::Error(error));
    }

    fn on_complete(&self) {
        let value = self.last.lock().value.clone();
        if let Some(v) = value {
            self.broadcaster.emit(Signal::Next(v));
        }
        self.broadcaster.emit(Signal::Complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn only_the_last_value_is_emitted_on_complete() {
        let subject = AsyncSubject::<i32, String>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        subject.subscribe(Box::new(Recorder(log.clone())));
        subject.on_next(1);
        subject.on_next(2);
        subject.on_next(3);
        subject.on_complete();
        assert_eq!(*log.lock(), vec!["next:3", "complete"]);
    }

    #[test]
    fn late_subscriber_after_complete_gets_last_value_then_complete() {
        let subject = AsyncSubject::<i32, String>::new();
        subject.on_next(42);
        subject.on_complete();
        let log = Arc::new(Mutex::new(Vec::new()));
        subject.subscribe(Box::new(Recorder(log.clone())));
        assert_eq!(*log.lock(), vec!["next:42", "complete"]);
    }

    #[test]
    fn error_suppresses_any_pending_value() {
        let subject = AsyncSubject::<i32, String>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        subject.subscribe(Box::new(Recorder(log.clone())));
        subject.on_next(1);
        subject.on_error("boom".to_string());
        assert_eq!(*log.lock(), vec!["error:boom"]);
    }

    #[test]
    fn completing_with_no_values_emits_only_complete() {
        let subject = AsyncSubject::<i32, String>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        subject.subscribe(Box::new(Recorder(log.clone())));
        subject.on_complete();
        assert_eq!(*log.lock(), vec!["complete"]);
    }
}
