//! Multicast bridge between a cold [`Source`] and a [`Subject`]-shaped
//! broadcast point: `connect`, `refCount`, `autoConnect`.
//!
//! `ConnectableSource` itself never subscribes to the upstream source; it
//! only forwards subscribers to the multicasting subject. Connecting —
//! explicitly via [`ConnectableSource::connect`], or implicitly via
//! [`ConnectableSource::ref_count`]/[`ConnectableSource::auto_connect`] — is
//! the one moment the upstream actually runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer, Source};

use crate::publish::PublishSubject;
use crate::replay::ReplaySubject;

/// Something that can both receive signals (as an `Observer`, forwarded
/// from upstream) and be subscribed to (as a `Source`, fanning out to
/// downstream). Every concrete `Subject` flavor satisfies this.
pub trait MulticastTarget<T, E>: Source<T, E> + Observer<T, E> + Clone + Send + Sync {}

impl<T, E, S> MulticastTarget<T, E> for S where S: Source<T, E> + Observer<T, E> + Clone + Send + Sync
{}

enum ConnectionState {
    Idle,
    Connected(Disposable),
}

type SubjectFactory<M> = Box<dyn Fn() -> M + Send + Sync>;

struct Shared<T, E, M> {
    upstream: Arc<dyn Source<T, E>>,
    factory: SubjectFactory<M>,
    subject: Mutex<M>,
    state: Mutex<ConnectionState>,
    subscriber_count: Mutex<usize>,
    /// Set once the current subject has latched a terminal signal. The next
    /// `connect()` sees this and mints a fresh subject via `factory` before
    /// resubscribing, so a terminated connection can be restarted cleanly
    /// (the `Terminated -> Idle` edge re-creates the subject).
    needs_reset: AtomicBool,
}

/// A cold source paired with a multicast target, connected on demand.
pub struct ConnectableSource<T, E, M> {
    shared: Arc<Shared<T, E, M>>,
}

impl<T, E, M> Clone for ConnectableSource<T, E, M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E, M> ConnectableSource<T, E, M>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: MulticastTarget<T, E> + 'static,
{
    pub fn new(upstream: Arc<dyn Source<T, E>>, subject: M) -> Self {
        Self::with_factory(upstream, move || subject.clone())
    }

    /// Like [`Self::new`], but mints every (re)connection's subject from
    /// `factory` rather than cloning a single fixed instance — needed so a
    /// terminated subject is replaced by a fresh one on the next `connect()`.
    pub fn with_factory(upstream: Arc<dyn Source<T, E>>, factory: impl Fn() -> M + Send + Sync + 'static) -> Self {
        let initial = factory();
        Self {
            shared: Arc::new(Shared {
                upstream,
                factory: Box::new(factory),
                subject: Mutex::new(initial),
                state: Mutex::new(ConnectionState::Idle),
                subscriber_count: Mutex::new(0),
                needs_reset: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes the multicast target to the upstream source, if not
    /// already connected. Returns a `Disposable` that tears the connection
    /// down and resets state to `Idle`, so a subsequent `connect()` starts
    /// a fresh upstream subscription.
    pub fn connect(&self) -> Disposable {
        let mut state = self.shared.state.lock();
        let stale = self.shared.needs_reset.load(Ordering::Acquire);
        if !stale {
            if let ConnectionState::Connected(d) = &*state {
                return d.clone();
            }
        }
        if stale {
            self.shared.needs_reset.store(false, Ordering::Release);
            *self.shared.subject.lock() = (self.shared.factory)();
        }
        let subject = self.shared.subject.lock().clone();
        let shared = self.shared.clone();
        let disposable = Disposable::new({
            let shared = shared.clone();
            move || {
                *shared.state.lock() = ConnectionState::Idle;
            }
        });
        *state = ConnectionState::Connected(disposable.clone());
        // Mark connected and release the lock before running `subscribe`:
        // a synchronous upstream can complete/error inline, and the
        // downstream chain is allowed to react by calling back into
        // `connect`/`disconnect` from the same thread — holding the lock
        // across that call would deadlock against a non-reentrant mutex.
        drop(state);
        self.shared.upstream.subscribe(Box::new(ForwardingObserver { target: subject, shared }));
        disposable
    }

    /// Tears down the current connection if one is active, without
    /// reconnecting. Unlike calling `connect().dispose()`, this never mints
    /// a fresh subject first — it simply releases whatever is live.
    fn disconnect(&self) {
        let mut state = self.shared.state.lock();
        if let ConnectionState::Connected(d) = std::mem::replace(&mut *state, ConnectionState::Idle) {
            drop(state);
            d.dispose();
        }
    }

    /// `publish().refCount()`: connects on the first subscriber and
    /// disconnects when the last subscriber leaves.
    pub fn ref_count(&self) -> RefCountSource<T, E, M> {
        RefCountSource {
            connectable: self.clone(),
        }
    }

    /// Connects automatically once `subscriber_count` subscribers have
    /// arrived, and never disconnects on its own afterwards.
    pub fn auto_connect(&self, subscriber_count: usize) -> AutoConnectSource<T, E, M> {
        AutoConnectSource {
            connectable: self.clone(),
            threshold: subscriber_count.max(1),
        }
    }
}

impl<T, E, M> Source<T, E> for ConnectableSource<T, E, M>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: MulticastTarget<T, E> + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let subject = self.shared.subject.lock().clone();
        subject.subscribe(observer);
    }
}

struct ForwardingObserver<T, E, M> {
    target: M,
    shared: Arc<Shared<T, E, M>>,
}

impl<T, E, M> Observer<T, E> for ForwardingObserver<T, E, M>
where
    M: Observer<T, E>,
{
    fn on_subscribe(&self, _disposable: Disposable) {}
    fn on_next(&self, value: T) {
        self.target.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.target.on_error(error);
        self.shared.needs_reset.store(true, Ordering::Release);
    }
    fn on_complete(&self) {
        self.target.on_complete();
        self.shared.needs_reset.store(true, Ordering::Release);
    }
}

/// Wraps subscriptions to count live subscribers and connect/disconnect
/// the underlying [`ConnectableSource`] accordingly.
pub struct RefCountSource<T, E, M> {
    connectable: ConnectableSource<T, E, M>,
}

impl<T, E, M> Clone for RefCountSource<T, E, M> {
    fn clone(&self) -> Self {
        Self {
            connectable: self.connectable.clone(),
        }
    }
}

impl<T, E, M> Source<T, E> for RefCountSource<T, E, M>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: MulticastTarget<T, E> + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let shared = self.connectable.shared.clone();
        // Attach to the multicast subject before connecting, so a source
        // that emits synchronously inside `connect()` cannot deliver its
        // first signals to an empty subscriber set.
        let connectable = self.connectable.clone();
        self.connectable.subscribe(Box::new(RefCountingObserver {
            inner: observer,
            shared: shared.clone(),
            connectable,
        }));

        let mut count = shared.subscriber_count.lock();
        *count += 1;
        if *count == 1 {
            drop(count);
            self.connectable.connect();
        }
    }
}

struct RefCountingObserver<T, E, M> {
    inner: BoxObserver<T, E>,
    shared: Arc<Shared<T, E, M>>,
    connectable: ConnectableSource<T, E, M>,
}

impl<T, E, M> Observer<T, E> for RefCountingObserver<T, E, M>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: MulticastTarget<T, E> + 'static,
{
    fn on_subscribe(&self, disposable: Disposable) {
        // The subject only hands back a disposable that removes this
        // observer from its subscriber set (`broadcaster.unsubscribe`); it
        // has no notion of ref-counting. Wrap it so a downstream `dispose()`
        // also releases our share of `subscriber_count`, matching the
        // terminal paths below (spec.md §4.6: "on downstream dispose or
        // terminal, decrement...").
        let shared = self.shared.clone();
        let connectable = self.connectable.clone();
        self.inner.on_subscribe(Disposable::new(move || {
            disposable.dispose();
            release(&shared, &connectable);
        }));
    }

    fn on_next(&self, value: T) {
        self.inner.on_next(value);
    }

    fn on_error(&self, error: E) {
        self.inner.on_error(error);
        release(&self.shared, &self.connectable);
    }

    fn on_complete(&self) {
        self.inner.on_complete();
        release(&self.shared, &self.connectable);
    }
}

/// Decrements `subscriber_count` and disconnects the underlying
/// `ConnectableSource` once it reaches zero. Called both from a downstream
/// `dispose()` (via the wrapped disposable in `on_subscribe`) and from the
/// terminal signal paths above; a redundant call past zero or against an
/// already-idle connection is a no-op.
fn release<T, E, M>(shared: &Arc<Shared<T, E, M>>, connectable: &ConnectableSource<T, E, M>)
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: MulticastTarget<T, E> + 'static,
{
    {
        let mut count = shared.subscriber_count.lock();
        if *count > 0 {
            *count -= 1;
        }
        if *count > 0 {
            return;
        }
    }
    connectable.disconnect();
}

/// Connects once `threshold` subscribers have subscribed; never
/// disconnects itself afterwards.
pub struct AutoConnectSource<T, E, M> {
    connectable: ConnectableSource<T, E, M>,
    threshold: usize,
}

impl<T, E, M> Clone for AutoConnectSource<T, E, M> {
    fn clone(&self) -> Self {
        Self {
            connectable: self.connectable.clone(),
            threshold: self.threshold,
        }
    }
}

impl<T, E, M> Source<T, E> for AutoConnectSource<T, E, M>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: MulticastTarget<T, E> + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.connectable.subscribe(observer);
        let mut count = self.connectable.shared.subscriber_count.lock();
        *count += 1;
        if *count >= self.threshold {
            drop(count);
            self.connectable.connect();
        }
    }
}

/// `Observable.publish()`: multicast `source` through a fresh
/// [`PublishSubject`], connecting on demand.
pub fn publish<T, E>(
    source: Arc<dyn Source<T, E>>,
) -> ConnectableSource<T, E, PublishSubject<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    ConnectableSource::with_factory(source, PublishSubject::new)
}

/// `Observable.replay()` / `replay(n)`: multicast `source` through a
/// [`ReplaySubject`], bounded to `capacity` entries when given.
pub fn replay<T, E>(
    source: Arc<dyn Source<T, E>>,
    capacity: Option<usize>,
) -> ConnectableSource<T, E, ReplaySubject<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    ConnectableSource::with_factory(source, move || match capacity {
        Some(n) => ReplaySubject::create_with_size(n),
        None => ReplaySubject::unbounded(),
    })
}

/// `Observable.share()`: `publish(source).refCount()`.
pub fn share<T, E>(source: Arc<dyn Source<T, E>>) -> RefCountSource<T, E, PublishSubject<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    publish(source).ref_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        subscribes: Arc<AtomicUsize>,
    }

    impl Source<i32, String> for CountingSource {
        fn subscribe(&self, observer: BoxObserver<i32, String>) {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            observer.on_subscribe(Disposable::disposed());
            observer.on_next(1);
            observer.on_next(2);
            observer.on_complete();
        }
    }

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
    fn connect_subscribes_upstream_exactly_once_regardless_of_downstream_count() {
        let subscribes = Arc::new(AtomicUsize::new(0));
        let upstream: Arc<dyn Source<i32, String>> = Arc::new(CountingSource {
            subscribes: subscribes.clone(),
        });
        let connectable = ConnectableSource::new(upstream, PublishSubject::<i32, String>::new());

        let log_a = Arc::new(Mutex::new(Vec::new()));
        connectable.subscribe(Box::new(Recorder(log_a.clone())));
        connectable.connect();

        assert_eq!(subscribes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ref_count_connects_on_first_subscriber_and_disconnects_on_last_release() {
        let subscribes = Arc::new(AtomicUsize::new(0));
        let upstream: Arc<dyn Source<i32, String>> = Arc::new(CountingSource {
            subscribes: subscribes.clone(),
        });
        let connectable = ConnectableSource::new(upstream, PublishSubject::<i32, String>::new());
        let shared = connectable.ref_count();

        let log = Arc::new(Mutex::new(Vec::new()));
        shared.subscribe(Box::new(Recorder(log.clone())));
        assert_eq!(subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "complete"]);
    }

    #[test]
    fn reconnecting_after_terminal_gets_a_fresh_subject() {
        let subscribes = Arc::new(AtomicUsize::new(0));
        let upstream: Arc<dyn Source<i32, String>> = Arc::new(CountingSource {
            subscribes: subscribes.clone(),
        });
        let connectable = ConnectableSource::new(upstream, PublishSubject::<i32, String>::new());

        let first = Arc::new(Mutex::new(Vec::new()));
        connectable.subscribe(Box::new(Recorder(first.clone())));
        connectable.connect();
        assert_eq!(*first.lock(), vec!["next:1", "next:2", "complete"]);

        // The subject is now terminal; a late subscriber before reconnecting
        // still observes that stale terminal signal.
        let late = Arc::new(Mutex::new(Vec::new()));
        connectable.subscribe(Box::new(Recorder(late.clone())));
        assert_eq!(*late.lock(), vec!["complete"]);

        // Reconnecting mints a fresh subject: a subscriber attached after the
        // second connect observes the second run's values, not the stale terminal.
        connectable.connect();
        let second = Arc::new(Mutex::new(Vec::new()));
        connectable.subscribe(Box::new(Recorder(second.clone())));
        assert_eq!(subscribes.load(Ordering::SeqCst), 2);
        assert_eq!(*second.lock(), vec!["complete"]);
    }
}
