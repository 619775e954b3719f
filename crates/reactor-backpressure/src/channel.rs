//! A pull-based [`BackpressuredSource`] built from a user-supplied producer
//! closure, mirroring [`crate::contract`]'s `create`-style entry point but
//! honoring downstream `request(n)` instead of pushing freely.
//!
//! The producer closure runs synchronously inside `subscribe`, receiving an
//! [`Emitter`] it can call `on_next`/`on_error`/`on_complete` on from any
//! thread afterwards (the emitter is `Send + Sync` and cheaply cloneable).
//! Items emitted while demand is exhausted are handled per
//! [`OverflowStrategy`]; `DropOldest`/`DropLatest` bound their pending queue
//! by `capacity` (default 1 — the spec leaves this unspecified, so a single
//! pending slot is the simplest deterministic reading of "drop to make
//! room").

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{ErrorKind, ReactorError};

use crate::contract::{BackpressuredObserver, BackpressuredSource, BoxBackpressuredObserver};
use crate::overflow::OverflowStrategy;
use crate::subscription::{Subscription, UNBOUNDED_REQUEST};

struct State<T> {
    buffer: VecDeque<T>,
    requested: u64,
    cancelled: bool,
    terminal_sent: bool,
}

struct Inner<T, E> {
    observer: BoxBackpressuredObserver<T, E>,
    strategy: OverflowStrategy,
    capacity: usize,
    state: Mutex<State<T>>,
}

/// Handed to the producer closure; emits `Next`/`Error`/`Complete` against
/// the channel's overflow policy and outstanding demand.
pub struct Emitter<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> Emitter<T, E> {
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    pub fn on_next(&self, value: T) {
        let mut state = self.inner.state.lock();
        if state.cancelled || state.terminal_sent {
            return;
        }
        if state.requested > 0 && state.buffer.is_empty() {
            state.requested -= 1;
            drop(state);
            self.inner.observer.on_next(value);
            return;
        }
        match self.inner.strategy {
            OverflowStrategy::Buffer => state.buffer.push_back(value),
            OverflowStrategy::Drop => {
                tracing::trace!("dropping item: no outstanding request under the DROP overflow strategy");
            }
            OverflowStrategy::DropOldest => {
                if state.buffer.len() >= self.inner.capacity.max(1) {
                    state.buffer.pop_front();
                }
                state.buffer.push_back(value);
            }
            OverflowStrategy::DropLatest => {
                if state.buffer.len() >= self.inner.capacity.max(1) {
                    state.buffer.pop_back();
                }
                state.buffer.push_back(value);
            }
            OverflowStrategy::Error => {
                state.terminal_sent = true;
                drop(state);
                self.inner.observer.on_error(missing_backpressure::<E>());
                return;
            }
        }
        self.drain_locked(state);
    }

    fn drain_locked(&self, mut state: parking_lot::MutexGuard<'_, State<T>>) {
        let mut ready = Vec::new();
        while state.requested > 0 {
            match state.buffer.pop_front() {
                Some(item) => {
                    state.requested -= 1;
                    ready.push(item);
                }
                None => break,
            }
        }
        drop(state);
        for item in ready {
            self.inner.observer.on_next(item);
        }
    }

    pub fn on_error(&self, error: E) {
        let mut state = self.inner.state.lock();
        if state.cancelled || state.terminal_sent {
            return;
        }
        state.terminal_sent = true;
        drop(state);
        self.inner.observer.on_error(error);
    }

    pub fn on_complete(&self) {
        let mut state = self.inner.state.lock();
        if state.cancelled || state.terminal_sent {
            return;
        }
        if !state.buffer.is_empty() {
            // Let any still-buffered, already-requested items drain first;
            // completion is delivered once the buffer is empty via request().
            state.terminal_sent = true;
            return;
        }
        state.terminal_sent = true;
        drop(state);
        self.inner.observer.on_complete();
    }
}

fn missing_backpressure<E>() -> E
where
    E: From<ReactorError>,
{
    let cause = reactor_core::ContractViolation::MissingBackpressure;
    ReactorError::new("backpressure.missing_backpressure", cause.to_string(), ErrorKind::ContractViolation)
        .with_cause(cause)
        .into()
}

struct ChannelSubscription<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Subscription for ChannelSubscription<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn request(&self, n: u64) {
        if n == 0 {
            return;
        }
        let mut state = self.inner.state.lock();
        if state.cancelled {
            return;
        }
        state.requested = state.requested.saturating_add(n);
        let mut ready = Vec::new();
        while state.requested > 0 {
            match state.buffer.pop_front() {
                Some(item) => {
                    state.requested -= 1;
                    ready.push(item);
                }
                None => break,
            }
        }
        let finished = state.buffer.is_empty() && state.terminal_sent;
        drop(state);
        for item in ready {
            self.inner.observer.on_next(item);
        }
        if finished {
            self.inner.observer.on_complete();
        }
    }

    fn cancel(&self) {
        self.inner.state.lock().cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }
}

/// A backpressured source whose production is driven by a user closure
/// invoked synchronously at subscribe time, in the spirit of
/// [`crate::contract`]'s push analogue.
pub struct BackpressureChannel<T, E> {
    strategy: OverflowStrategy,
    capacity: usize,
    producer: Mutex<Option<Box<dyn FnOnce(Emitter<T, E>) + Send>>>,
}

impl<T, E> BackpressureChannel<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn create(strategy: OverflowStrategy, producer: impl FnOnce(Emitter<T, E>) + Send + 'static) -> Self {
        Self::create_with_capacity(strategy, 1, producer)
    }

    pub fn create_with_capacity(
        strategy: OverflowStrategy,
        capacity: usize,
        producer: impl FnOnce(Emitter<T, E>) + Send + 'static,
    ) -> Self {
        Self {
            strategy,
            capacity,
            producer: Mutex::new(Some(Box::new(producer))),
        }
    }
}

impl<T, E> BackpressuredSource<T, E> for BackpressureChannel<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxBackpressuredObserver<T, E>) {
        let Some(producer) = self.producer.lock().take() else {
            observer.on_subscribe(Box::new(ChannelSubscription {
                inner: Arc::new(Inner {
                    observer: NoopObserver::boxed(),
                    strategy: self.strategy,
                    capacity: self.capacity,
                    state: Mutex::new(State {
                        buffer: VecDeque::new(),
                        requested: 0,
                        cancelled: true,
                        terminal_sent: true,
                    }),
                }),
            }));
            observer.on_error(missing_backpressure_channel_reused::<E>());
            return;
        };
        let inner = Arc::new(Inner {
            observer,
            strategy: self.strategy,
            capacity: self.capacity,
            state: Mutex::new(State {
                buffer: VecDeque::new(),
                requested: 0,
                cancelled: false,
                terminal_sent: false,
            }),
        });
        inner
            .observer
            .on_subscribe(Box::new(ChannelSubscription { inner: inner.clone() }));
        producer(Emitter { inner });
    }
}

fn missing_backpressure_channel_reused<E>() -> E
where
    E: From<ReactorError>,
{
    let cause = reactor_core::ContractViolation::Undeliverable {
        reason: "a BackpressureChannel's producer runs at most once; this channel was already subscribed".into(),
    };
    ReactorError::new("backpressure.channel_already_subscribed", cause.to_string(), ErrorKind::ContractViolation)
        .with_cause(cause)
        .into()
}

struct NoopObserver;
impl NoopObserver {
    fn boxed<T, E>() -> BoxBackpressuredObserver<T, E> {
        Box::new(NoopObserver)
    }
}
impl<T, E> BackpressuredObserver<T, E> for NoopObserver {
    fn on_subscribe(&self, _subscription: crate::subscription::BoxSubscription) {}
    fn on_next(&self, _value: T) {}
    fn on_error(&self, _error: E) {}
    fn on_complete(&self) {}
}

/// Degrades a [`BackpressuredSource`] to push semantics by requesting
/// [`UNBOUNDED_REQUEST`] immediately, then forwarding every signal to a
/// plain [`reactor_core::Observer`].
pub struct ToPush<T, E> {
    upstream: Arc<dyn BackpressuredSource<T, E>>,
}

impl<T, E> ToPush<T, E> {
    pub fn new(upstream: Arc<dyn BackpressuredSource<T, E>>) -> Self {
        Self { upstream }
    }
}

impl<T, E> reactor_core::Source<T, E> for ToPush<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: reactor_core::BoxObserver<T, E>) {
        let observer: Arc<dyn reactor_core::Observer<T, E>> = Arc::from(observer);
        self.upstream.subscribe(Box::new(PushAdapter { downstream: observer }));
    }
}

struct PushAdapter<T, E> {
    downstream: Arc<dyn reactor_core::Observer<T, E>>,
}

impl<T, E> BackpressuredObserver<T, E> for PushAdapter<T, E> {
    fn on_subscribe(&self, subscription: crate::subscription::BoxSubscription) {
        subscription.request(UNBOUNDED_REQUEST);
        self.downstream
            .on_subscribe(reactor_core::Disposable::new(move || subscription.cancel()));
    }
    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
}

/// Wraps a push [`reactor_core::Source`] as a [`BackpressuredSource`]: every
/// `Next` the upstream delivers is buffered per `strategy` until the
/// downstream's accumulated `request(n)` catches up.
pub struct FromPush<T, E> {
    upstream: Arc<dyn reactor_core::Source<T, E>>,
    strategy: OverflowStrategy,
    capacity: usize,
}

impl<T, E> FromPush<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn new(upstream: Arc<dyn reactor_core::Source<T, E>>, strategy: OverflowStrategy) -> Self {
        Self::with_capacity(upstream, strategy, 1)
    }

    pub fn with_capacity(
        upstream: Arc<dyn reactor_core::Source<T, E>>,
        strategy: OverflowStrategy,
        capacity: usize,
    ) -> Self {
        Self { upstream, strategy, capacity }
    }
}

impl<T, E> BackpressuredSource<T, E> for FromPush<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxBackpressuredObserver<T, E>) {
        let inner = Arc::new(Inner {
            observer,
            strategy: self.strategy,
            capacity: self.capacity,
            state: Mutex::new(State {
                buffer: VecDeque::new(),
                requested: 0,
                cancelled: false,
                terminal_sent: false,
            }),
        });
        inner
            .observer
            .on_subscribe(Box::new(ChannelSubscription { inner: inner.clone() }));
        self.upstream.subscribe(Box::new(FromPushObserver {
            emitter: Emitter { inner },
        }));
    }
}

struct FromPushObserver<T, E> {
    emitter: Emitter<T, E>,
}

impl<T, E> reactor_core::Observer<T, E> for FromPushObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, _disposable: reactor_core::Disposable) {}
    fn on_next(&self, value: T) {
        self.emitter.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.emitter.on_error(error);
    }
    fn on_complete(&self) {
        self.emitter.on_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Requests `initial_request` items the moment it is subscribed, before
    /// the producer (which runs synchronously inside `subscribe`) emits
    /// anything — the only way a synchronous DROP-strategy producer can be
    /// observed losing exactly the right items in a test.
    struct Capturing<T> {
        values: Arc<Mutex<Vec<T>>>,
        completed: Arc<AtomicUsize>,
        initial_request: u64,
    }

    impl<T: Send + Sync + 'static> BackpressuredObserver<T, ReactorError> for Capturing<T> {
        fn on_subscribe(&self, subscription: crate::subscription::BoxSubscription) {
            subscription.request(self.initial_request);
        }
        fn on_next(&self, value: T) {
            self.values.lock().push(value);
        }
        fn on_error(&self, _error: ReactorError) {}
        fn on_complete(&self) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_strategy_delivers_exactly_the_requested_count() {
        let channel = BackpressureChannel::<i32, ReactorError>::create(OverflowStrategy::Drop, |emitter| {
            for i in 0..100 {
                emitter.on_next(i);
            }
            emitter.on_complete();
        });

        let values = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));

        channel.subscribe(Box::new(Capturing {
            values: values.clone(),
            completed: completed.clone(),
            initial_request: 10,
        }));

        assert_eq!(values.lock().len(), 10);
        assert_eq!(*values.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    /// Holds onto its subscription instead of requesting eagerly, so the
    /// test can drain the producer's buffered backlog one request at a time.
    struct CapturingManual<T> {
        values: Arc<Mutex<Vec<T>>>,
        completed: Arc<AtomicUsize>,
        subscription_slot: Arc<Mutex<Option<crate::subscription::BoxSubscription>>>,
    }

    impl<T: Send + Sync + 'static> BackpressuredObserver<T, ReactorError> for CapturingManual<T> {
        fn on_subscribe(&self, subscription: crate::subscription::BoxSubscription) {
            *self.subscription_slot.lock() = Some(subscription);
        }
        fn on_next(&self, value: T) {
            self.values.lock().push(value);
        }
        fn on_error(&self, _error: ReactorError) {}
        fn on_complete(&self) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn buffer_strategy_delivers_everything_across_several_requests() {
        let channel = BackpressureChannel::<i32, ReactorError>::create_with_capacity(
            OverflowStrategy::Buffer,
            usize::MAX,
            |emitter| {
                for i in 0..20 {
                    emitter.on_next(i);
                }
                emitter.on_complete();
            },
        );

        let values = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));
        let subscription_slot = Arc::new(Mutex::new(None));

        channel.subscribe(Box::new(CapturingManual {
            values: values.clone(),
            completed: completed.clone(),
            subscription_slot: subscription_slot.clone(),
        }));

        assert_eq!(completed.load(Ordering::SeqCst), 0, "complete withheld until the buffer drains");
        for _ in 0..20 {
            subscription_slot.lock().as_ref().unwrap().request(1);
        }
        assert_eq!(*values.lock(), (0..20).collect::<Vec<_>>());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_push_buffers_a_synchronous_push_source_until_requested() {
        struct Counting;
        impl reactor_core::Source<i32, ReactorError> for Counting {
            fn subscribe(&self, observer: reactor_core::BoxObserver<i32, ReactorError>) {
                observer.on_subscribe(reactor_core::Disposable::empty());
                for i in 0..5 {
                    observer.on_next(i);
                }
                observer.on_complete();
            }
        }

        let bridge = FromPush::new(Arc::new(Counting), OverflowStrategy::Buffer);
        let values = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));
        let subscription_slot = Arc::new(Mutex::new(None));

        bridge.subscribe(Box::new(CapturingManual {
            values: values.clone(),
            completed: completed.clone(),
            subscription_slot: subscription_slot.clone(),
        }));

        assert!(values.lock().is_empty());
        subscription_slot.lock().as_ref().unwrap().request(5);
        assert_eq!(*values.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn to_push_requests_unbounded_and_forwards_every_signal() {
        let channel = Arc::new(BackpressureChannel::<i32, ReactorError>::create(
            OverflowStrategy::Buffer,
            |emitter| {
                for i in 0..5 {
                    emitter.on_next(i);
                }
                emitter.on_complete();
            },
        ));
        let pushed = Arc::new(Mutex::new(Vec::new()));

        struct Recording {
            pushed: Arc<Mutex<Vec<i32>>>,
            completed: Arc<AtomicUsize>,
        }
        impl reactor_core::Observer<i32, ReactorError> for Recording {
            fn on_subscribe(&self, _disposable: reactor_core::Disposable) {}
            fn on_next(&self, value: i32) {
                self.pushed.lock().push(value);
            }
            fn on_error(&self, _error: ReactorError) {}
            fn on_complete(&self) {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let completed = Arc::new(AtomicUsize::new(0));
        let as_push: ToPush<i32, ReactorError> = ToPush::new(channel);
        reactor_core::Source::subscribe(
            &as_push,
            Box::new(Recording { pushed: pushed.clone(), completed: completed.clone() }),
        );

        assert_eq!(*pushed.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}
