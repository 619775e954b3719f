//! `PublishSubject`: no replay history. Only observers attached at the
//! moment a signal is emitted receive it.

use std::sync::Arc;

use reactor_core::{BoxObserver, Disposable, Observer, Signal, Source};

use crate::broadcaster::{Broadcaster, SubscribeOutcome};

pub struct PublishSubject<T, E> {
    broadcaster: Arc<Broadcaster<T, E>>,
}

impl<T, E> Clone for PublishSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            broadcaster: self.broadcaster.clone(),
        }
    }
}

impl<T, E> PublishSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            broadcaster: Arc::new(Broadcaster::new()),
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

impl<T, E> Default for PublishSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Source<T, E> for PublishSubject<T, E>
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
                    Signal::Error(e) => observer.on_error(e),
                    Signal::Complete => observer.on_complete(),
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

impl<T, E> Observer<T, E> for PublishSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, _disposable: Disposable) {}

    fn on_next(&self, value: T) {
        self.broadcaster.emit(Signal::Next(value));
    }

    fn on_error(&self, error: E) {
        self.broadcaster.emit(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.broadcaster.emit(Signal::Complete);
    }
}
