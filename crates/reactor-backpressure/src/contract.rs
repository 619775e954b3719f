//! The backpressured mirror of [`reactor_core::Observer`]/[`reactor_core::Source`]:
//! `on_subscribe` hands the downstream a [`Subscription`] (request/cancel)
//! instead of a bare `Disposable`.

use std::sync::Arc;

use crate::subscription::BoxSubscription;

/// A consumer of a backpressured channel.
pub trait BackpressuredObserver<T, E>: Send + Sync {
    fn on_subscribe(&self, subscription: BoxSubscription);
    fn on_next(&self, value: T);
    fn on_error(&self, error: E);
    fn on_complete(&self);
}

pub type BoxBackpressuredObserver<T, E> = Box<dyn BackpressuredObserver<T, E>>;

/// A producer that delivers `Next` signals only up to accumulated
/// outstanding `request(n)` demand.
pub trait BackpressuredSource<T, E>: Send + Sync {
    fn subscribe(&self, observer: BoxBackpressuredObserver<T, E>);
}

impl<T, E> BackpressuredSource<T, E> for Arc<dyn BackpressuredSource<T, E>> {
    fn subscribe(&self, observer: BoxBackpressuredObserver<T, E>) {
        self.as_ref().subscribe(observer);
    }
}
