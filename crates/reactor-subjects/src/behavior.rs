//! `BehaviorSubject`: remembers the last emitted value; every new
//! subscriber (live or after terminal) is replayed that value before
//! joining the live set or receiving the terminal.

use std::sync::Arc;

use parking_lot::RwLock;
use reactor_core::{BoxObserver, Disposable, Observer, Signal, Source};

use crate::broadcaster::{Broadcaster, SubscribeOutcome};

pub struct BehaviorSubject<T, E> {
    broadcaster: Arc<Broadcaster<T, E>>,
    value: Arc<RwLock<T>>,
}

impl<T, E> Clone for BehaviorSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            broadcaster: self.broadcaster.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T, E> BehaviorSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn create_default(initial: T) -> Self {
        Self {
            broadcaster: Arc::new(Broadcaster::new()),
            value: Arc::new(RwLock::new(initial)),
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

    pub fn value(&self) -> T {
        self.value.read().clone()
    }
}

impl<T, E> Source<T, E> for BehaviorSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let observer: Arc<dyn Observer<T, E>> = Arc::from(observer);
        match self.broadcaster.subscribe(observer.clone()) {
            SubscribeOutcome::Terminal(signal) => {
                observer.on_subscribe(Disposable::disposed());
                observer.on_next(self.value());
                match signal {
                    Signal::Error(e) => observer.on_error(e),
                    Signal::Complete => observer.on_complete(),
                    Signal::Next(_) => unreachable!("terminal latch never holds a Next"),
                }
            }
            SubscribeOutcome::Live(id) => {
                let broadcaster = self.broadcaster.clone();
                observer.on_subscribe(Disposable::new(move || broadcaster.unsubscribe(id)));
                observer.on_next(self.value());
            }
        }
    }
}

impl<T, E> Observer<T, E> for BehaviorSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, _disposable: Disposable) {}

    fn on_next(&self, value: T) {
        *self.value.write() = value.clone();
        self.broadcaster.emit(Signal::Next(value));
    }

    fn on_error(&self, error: E) {
        self.broadcaster.emit(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.broadcaster.emit(Signal::Complete);
    }
}
