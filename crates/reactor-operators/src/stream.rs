//! The fluent `Stream<T, E>` builder: the single type most callers compose
//! against, wrapping an `Arc<dyn Source<T, E>>` and exposing every operator
//! in this crate (plus the subject/multicast layer and the backpressure
//! bridge) as a chainable method, the way a user of the original library
//! chains method calls on one `Observable<T>` type rather than naming each
//! operator's struct directly.
//!
//! Per spec.md §9 ("Dynamic dispatch"): composition here is monomorphized —
//! each method wraps `self.source` in a new concrete operator struct behind
//! a fresh `Arc<dyn Source<T, E>>` — boxing only at the point every operator
//! already boxes, not introducing any extra dynamic dispatch of its own.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use reactor_backpressure::{BackpressuredSource, FromPush, OverflowStrategy, ToPush};
use reactor_core::{Disposable, Observer, ReactorError, SerialDisposable, Source};
use reactor_scheduler::Scheduler;
use reactor_subjects::{BehaviorSubject, ConnectableSource, PublishSubject, RefCountSource, ReplaySubject};

use crate::aggregate;
use crate::blocking::{self, BlockingIter};
use crate::combine;
use crate::creation::{self, Emitter};
use crate::error_redirect;
use crate::flat;
use crate::group::{self, GroupedSource};
use crate::retry;
use crate::scheduling;
use crate::stateless::{self, Tap};
use crate::time;
use crate::windowing;

/// A cold, composable stream of `T` values terminated by at most one
/// `Error(E)` or `Complete`. Wraps the underlying [`Source`] trait object;
/// every method here returns a new `Stream` wrapping the operator it builds,
/// leaving `self` untouched so the same pipeline prefix can be reused to
/// build several downstream variants.
pub struct Stream<T, E> {
    source: Arc<dyn Source<T, E>>,
}

impl<T, E> Clone for Stream<T, E> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone() }
    }
}

impl<T, E> Stream<T, E> {
    /// Wraps an existing `Source` as a `Stream`, the escape hatch for
    /// operators not (yet) exposed as a fluent method.
    pub fn from_source(source: Arc<dyn Source<T, E>>) -> Self {
        Self { source }
    }

    /// Returns the underlying `Source`, e.g. to hand to a combinator that
    /// takes several sources directly (`Stream::merge`, `Stream::zip`, ...).
    pub fn as_source(&self) -> Arc<dyn Source<T, E>> {
        self.source.clone()
    }
}

impl<T, E> Source<T, E> for Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: reactor_core::BoxObserver<T, E>) {
        self.source.subscribe(observer);
    }
}

// ---------------------------------------------------------------------
// Subscription entry points
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Subscribes a hand-rolled [`Observer`], returning nothing — the
    /// observer received its `Disposable` via `on_subscribe` already, per
    /// the contract.
    pub fn subscribe(&self, observer: impl Observer<T, E> + 'static) {
        self.source.subscribe(Box::new(observer));
    }

    /// Subscribes with three plain closures instead of an `Observer` impl,
    /// returning the `Disposable` the chain handed back synchronously.
    pub fn subscribe_with(
        &self,
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(E) + Send + Sync + 'static,
        on_complete: impl Fn() + Send + Sync + 'static,
    ) -> Disposable {
        struct Bridge<T, E, N, Er, C> {
            on_next: N,
            on_error: Er,
            on_complete: C,
            serial: SerialDisposable,
            _marker: std::marker::PhantomData<fn(T, E)>,
        }
        impl<T, E, N, Er, C> Observer<T, E> for Bridge<T, E, N, Er, C>
        where
            T: Send + Sync + 'static,
            E: Send + Sync + 'static,
            N: Fn(T) + Send + Sync + 'static,
            Er: Fn(E) + Send + Sync + 'static,
            C: Fn() + Send + Sync + 'static,
        {
            fn on_subscribe(&self, d: Disposable) {
                self.serial.replace(d);
            }
            fn on_next(&self, value: T) {
                (self.on_next)(value);
            }
            fn on_error(&self, error: E) {
                (self.on_error)(error);
            }
            fn on_complete(&self) {
                (self.on_complete)();
            }
        }
        let serial = SerialDisposable::new();
        let handle = serial.as_disposable();
        self.source.subscribe(Box::new(Bridge {
            on_next,
            on_error,
            on_complete,
            serial,
            _marker: std::marker::PhantomData,
        }));
        handle
    }
}

// ---------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn just(values: impl Into<Vec<T>>) -> Self {
        Self::from_source(Arc::new(creation::just(values)))
    }

    pub fn start_with(prefix: impl Into<Vec<T>>, upstream: Stream<T, E>) -> Self {
        Self::from_source(Arc::new(combine::start_with(prefix.into(), upstream.source)))
    }

    pub fn default_if_empty(self, default: T) -> Self {
        Self::from_source(Arc::new(stateless::default_if_empty(self.source, default)))
    }
}

impl<E: Send + Sync + 'static> Stream<i64, E> {
    pub fn range(start: i64, count: u64) -> Self {
        Self::from_source(Arc::new(creation::range(start, count)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn empty() -> Self {
        Self::from_source(Arc::new(creation::empty()))
    }

    pub fn never() -> Self {
        Self::from_source(Arc::new(creation::never()))
    }

    pub fn from_sequence(
        factory: impl Fn() -> Box<dyn Iterator<Item = Result<T, E>> + Send> + Send + Sync + 'static,
    ) -> Self {
        Self::from_source(Arc::new(creation::from_sequence(factory)))
    }

    pub fn from_iter<I>(factory: impl Fn() -> I + Send + Sync + 'static) -> Self
    where
        I: IntoIterator<Item = T> + 'static,
        I::IntoIter: Send,
    {
        Self::from_source(Arc::new(creation::from_iter(factory)))
    }

    pub fn create(producer: impl Fn(Emitter<T, E>) + Send + Sync + 'static) -> Self {
        Self::from_source(Arc::new(creation::create(producer)))
    }

    pub fn defer(factory: impl Fn() -> Arc<dyn Source<T, E>> + Send + Sync + 'static) -> Self {
        Self::from_source(Arc::new(creation::defer(factory)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn error(e: E) -> Self {
        Self::from_source(Arc::new(creation::error(e)))
    }
}

impl<E> Stream<u64, E>
where
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn interval(period: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(creation::interval(period, scheduler)))
    }

    pub fn timer(delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(creation::timer(delay, scheduler)))
    }
}

// ---------------------------------------------------------------------
// Stateless transformation / filtering
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn map<U: Send + Sync + 'static>(
        self,
        mapper: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Stream<U, E> {
        Stream::from_source(Arc::new(stateless::map(self.source, mapper)))
    }

    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self::from_source(Arc::new(stateless::filter(self.source, predicate)))
    }

    pub fn all(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Stream<bool, E> {
        Stream::from_source(Arc::new(stateless::all(self.source, predicate)))
    }

    pub fn any(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Stream<bool, E> {
        Stream::from_source(Arc::new(stateless::any(self.source, predicate)))
    }

    pub fn is_empty(self) -> Stream<bool, E> {
        Stream::from_source(Arc::new(stateless::is_empty(self.source)))
    }
}

impl<T, E> Stream<T, E>
where
    T: PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn contains(self, target: T) -> Stream<bool, E> {
        Stream::from_source(Arc::new(stateless::contains(self.source, target)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn take(self, n: u64) -> Self {
        Self::from_source(Arc::new(stateless::take(self.source, n)))
    }

    pub fn skip(self, n: u64) -> Self {
        Self::from_source(Arc::new(stateless::skip(self.source, n)))
    }

    pub fn count(self) -> Stream<u64, E> {
        Stream::from_source(Arc::new(stateless::count(self.source)))
    }

    /// Side-effect hooks (`doOnNext`/`doOnError`/`doOnComplete`/
    /// `doOnSubscribe`/`doOnDispose`), built from a [`Tap`] assembled with
    /// the builder methods on [`Tap`] itself:
    /// `stream.do_on(Tap::new().on_next(|v| ..))`.
    pub fn do_on(self, taps: Tap<T, E>) -> Self {
        Self::from_source(Arc::new(stateless::do_on(self.source, taps)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn distinct_until_changed(self) -> Self {
        Self::from_source(Arc::new(stateless::distinct_until_changed(self.source)))
    }
}

// ---------------------------------------------------------------------
// Stateful combinators
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn flat_map<U: Send + Sync + 'static>(
        self,
        mapper: impl Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
        max_concurrency: usize,
    ) -> Stream<U, E> {
        Stream::from_source(Arc::new(flat::flat_map(self.source, mapper, max_concurrency)))
    }

    pub fn concat_map<U: Send + Sync + 'static>(
        self,
        mapper: impl Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
    ) -> Stream<U, E> {
        Stream::from_source(Arc::new(flat::concat_map(self.source, mapper)))
    }

    pub fn switch_map<U: Send + Sync + 'static>(
        self,
        mapper: impl Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
    ) -> Stream<U, E> {
        Stream::from_source(Arc::new(flat::switch_map(self.source, mapper)))
    }

    pub fn on_error_resume_next(
        self,
        resume: impl Fn(&E) -> Arc<dyn Source<T, E>> + Send + Sync + 'static,
    ) -> Self {
        Self::from_source(Arc::new(error_redirect::on_error_resume_next(self.source, resume)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
{
    pub fn retry_when(
        self,
        handler: impl Fn(Arc<dyn Source<E, E>>) -> Arc<dyn Source<E, E>> + Send + Sync + 'static,
    ) -> Self {
        Stream::from_source(Arc::new(retry::retry_when(self.source, handler)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn merge(sources: Vec<Stream<T, E>>) -> Self {
        Self::from_source(Arc::new(combine::merge(sources.into_iter().map(|s| s.source).collect())))
    }

    pub fn concat(sources: Vec<Stream<T, E>>) -> Self {
        Self::from_source(Arc::new(combine::concat(sources.into_iter().map(|s| s.source).collect())))
    }

    pub fn retry(self, max_attempts: u64) -> Self {
        Self::from_source(Arc::new(retry::retry(self.source, max_attempts)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn on_error_return<F>(self, fallback: F) -> Self
    where
        F: Fn(&E) -> T + Send + Sync + 'static,
    {
        Self::from_source(Arc::new(error_redirect::on_error_return(self.source, fallback)))
    }
}

impl<T1, E> Stream<T1, E> {
    pub fn zip_with<T2, U>(
        self,
        other: Stream<T2, E>,
        combiner: impl Fn(T1, T2) -> U + Send + Sync + 'static,
    ) -> Stream<U, E>
    where
        T1: Send + Sync + 'static,
        T2: Send + Sync + 'static,
        U: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        Stream::from_source(Arc::new(combine::zip(self.source, other.source, combiner)))
    }

    pub fn combine_latest<T2, U>(
        self,
        other: Stream<T2, E>,
        combiner: impl Fn(T1, T2) -> U + Send + Sync + 'static,
    ) -> Stream<U, E>
    where
        T1: Clone + Send + Sync + 'static,
        T2: Clone + Send + Sync + 'static,
        U: Send + Sync + 'static,
        E: Send + Sync + 'static + From<ReactorError>,
    {
        Stream::from_source(Arc::new(combine::combine_latest(self.source, other.source, combiner)))
    }

    pub fn with_latest_from<T2, U>(
        self,
        other: Stream<T2, E>,
        combiner: impl Fn(T1, T2) -> U + Send + Sync + 'static,
    ) -> Stream<U, E>
    where
        T1: Send + Sync + 'static,
        T2: Clone + Send + Sync + 'static,
        U: Send + Sync + 'static,
        E: Send + Sync + 'static + From<ReactorError>,
    {
        Stream::from_source(Arc::new(combine::with_latest_from(self.source, other.source, combiner)))
    }
}

impl<T, E> Stream<T, E>
where
    T: PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn sequence_equal(self, other: Stream<T, E>) -> Stream<bool, E> {
        Stream::from_source(Arc::new(combine::sequence_equal(self.source, other.source)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
{
    pub fn group_by<K>(
        self,
        key_selector: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Stream<Arc<GroupedSource<K, T, E>>, E>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
    {
        Stream::from_source(Arc::new(group::group_by(self.source, key_selector)))
    }
}

// ---------------------------------------------------------------------
// Windowing / accumulation
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn scan<U: Clone + Send + Sync + 'static>(
        self,
        seed: U,
        accumulator: impl Fn(U, T) -> U + Send + Sync + 'static,
    ) -> Stream<U, E> {
        Stream::from_source(Arc::new(windowing::scan(self.source, seed, accumulator)))
    }

    pub fn reduce<U: Clone + Send + Sync + 'static>(
        self,
        seed: U,
        accumulator: impl Fn(U, T) -> U + Send + Sync + 'static,
    ) -> Stream<U, E> {
        Stream::from_source(Arc::new(windowing::reduce(self.source, seed, accumulator)))
    }

    pub fn to_list(self) -> Stream<Vec<T>, E> {
        Stream::from_source(Arc::new(aggregate::to_list(self.source)))
    }

    pub fn collect<C: Send + Sync + 'static>(
        self,
        seed_fn: impl Fn() -> C + Send + Sync + 'static,
        accumulator: impl Fn(&mut C, T) + Send + Sync + 'static,
    ) -> Stream<C, E> {
        Stream::from_source(Arc::new(aggregate::collect(self.source, seed_fn, accumulator)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Eq + Hash + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn to_set(self) -> Stream<HashSet<T>, E> {
        Stream::from_source(Arc::new(aggregate::to_set(self.source)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn to_map<K, V>(
        self,
        key_fn: impl Fn(&T) -> K + Send + Sync + 'static,
        value_fn: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Stream<HashMap<K, V>, E>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        Stream::from_source(Arc::new(aggregate::to_map(self.source, key_fn, value_fn)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
{
    pub fn buffer(self, count: usize, skip: usize) -> Stream<Vec<T>, E> {
        Stream::from_source(Arc::new(windowing::buffer(self.source, count, skip)))
    }

    pub fn buffer_time(self, timespan: Duration, scheduler: Arc<dyn Scheduler>) -> Stream<Vec<T>, E> {
        Stream::from_source(Arc::new(windowing::buffer_time(self.source, timespan, scheduler)))
    }

    pub fn window(self, count: usize, skip: usize) -> Stream<Arc<dyn Source<T, E>>, E> {
        Stream::from_source(Arc::new(windowing::window(self.source, count, skip)))
    }

    pub fn window_time(
        self,
        timespan: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Stream<Arc<dyn Source<T, E>>, E> {
        Stream::from_source(Arc::new(windowing::window_time(self.source, timespan, scheduler)))
    }
}

// ---------------------------------------------------------------------
// Time operators
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn delay(self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(time::delay(self.source, delay, scheduler)))
    }

    pub fn throttle_first(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(time::throttle_first(self.source, duration, scheduler)))
    }

    pub fn delay_subscription(self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(time::delay_subscription(self.source, delay, scheduler)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn subscribe_on(self, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(scheduling::subscribe_on(self.source, scheduler)))
    }

    pub fn observe_on(self, scheduler: Arc<dyn Scheduler>, buffer_size: usize) -> Self {
        Self::from_source(Arc::new(scheduling::observe_on(self.source, scheduler, buffer_size)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn debounce(self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(time::debounce(self.source, delay, scheduler)))
    }

    pub fn sample(self, period: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(time::sample(self.source, period, scheduler)))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    pub fn timeout(self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_source(Arc::new(time::timeout(self.source, delay, scheduler)))
    }
}

// ---------------------------------------------------------------------
// Multicast
// ---------------------------------------------------------------------

/// A `Stream` paired with a multicast target, activated on demand. Produced
/// by [`Stream::publish`]/[`Stream::replay`]; [`Self::connect`] subscribes
/// the upstream once, [`Self::ref_count`]/[`Self::auto_connect`] convert it
/// back into a plain `Stream` that connects/disconnects implicitly.
pub struct ConnectableStream<T, E, M> {
    inner: ConnectableSource<T, E, M>,
}

impl<T, E, M> Clone for ConnectableStream<T, E, M> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E, M> ConnectableStream<T, E, M>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: Source<T, E> + Observer<T, E> + Clone + Send + Sync + 'static,
{
    /// Subscribes the multicast subject to the upstream source if it is not
    /// already connected, returning a `Disposable` that tears the
    /// connection down (a subsequent `connect()` starts a fresh one).
    pub fn connect(&self) -> Disposable {
        self.inner.connect()
    }

    pub fn ref_count(&self) -> Stream<T, E> {
        Stream::from_source(Arc::new(self.inner.ref_count()))
    }

    pub fn auto_connect(&self, subscriber_count: usize) -> Stream<T, E> {
        Stream::from_source(Arc::new(self.inner.auto_connect(subscriber_count)))
    }

    pub fn as_stream(&self) -> Stream<T, E> {
        Stream::from_source(Arc::new(self.inner.clone()))
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// `publish()`: multicasts through a fresh [`PublishSubject`] (no
    /// replay — late subscribers only see values emitted after they join).
    pub fn publish(self) -> ConnectableStream<T, E, PublishSubject<T, E>> {
        ConnectableStream { inner: reactor_subjects::publish(self.source) }
    }

    /// `replay(n)`: multicasts through a [`ReplaySubject`] bounded to `n`
    /// entries (`None` for unbounded), so late subscribers catch up first.
    pub fn replay(self, capacity: Option<usize>) -> ConnectableStream<T, E, ReplaySubject<T, E>> {
        ConnectableStream { inner: reactor_subjects::replay(self.source, capacity) }
    }

    /// `share()` = `publish().refCount()`.
    pub fn share(self) -> Stream<T, E> {
        let shared: RefCountSource<T, E, PublishSubject<T, E>> = reactor_subjects::share(self.source);
        Stream::from_source(Arc::new(shared))
    }
}

// ---------------------------------------------------------------------
// Backpressure bridge
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    /// Bridges this push `Stream` into a [`reactor_backpressure::BackpressuredSource`],
    /// buffering per `strategy` whenever the producer outruns the
    /// downstream's accumulated `request(n)`.
    pub fn to_backpressured(self, strategy: OverflowStrategy) -> Arc<dyn BackpressuredSource<T, E>> {
        Arc::new(FromPush::new(self.source, strategy))
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Bridges a [`reactor_backpressure::BackpressuredSource`] back into a
    /// push `Stream` by requesting unbounded demand immediately.
    pub fn from_backpressured(upstream: Arc<dyn BackpressuredSource<T, E>>) -> Self {
        Self::from_source(Arc::new(ToPush::new(upstream)))
    }
}

// ---------------------------------------------------------------------
// Blocking adapters
// ---------------------------------------------------------------------

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn blocking_first(self, default: Option<T>) -> Result<T, E> {
        blocking::blocking_first(self.source, default)
    }

    pub fn blocking_last(self, default: Option<T>) -> Result<T, E> {
        blocking::blocking_last(self.source, default)
    }

    pub fn blocking_iterable(self) -> BlockingIter<T, E> {
        blocking::blocking_iterable(self.source)
    }
}

// `createDefault(v)` (Behavior subject) surfaced directly rather than via
// `Stream`, since a `BehaviorSubject` is both sink and source and callers
// need `on_next`/`get_value` access the fluent builder deliberately hides.
pub fn behavior_subject<T, E>(initial: T) -> BehaviorSubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    BehaviorSubject::create_default(initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use reactor_scheduler::{ImmediateScheduler, TestScheduler};

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);
    impl From<ReactorError> for TestError {
        fn from(e: ReactorError) -> Self {
            TestError(e.to_string())
        }
    }

    #[test]
    fn filter_map_take_chain_matches_spec_scenario() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        Stream::<i64, TestError>::range(1, 10)
            .filter(|x| x % 2 == 0)
            .map(|x| x * 10)
            .take(3)
            .subscribe_with(move |v| l.lock().push(v), |_| {}, || {});
        assert_eq!(*log.lock(), vec![20, 40, 60]);
    }

    #[test]
    fn subscribe_on_plus_observe_on_round_trip_on_immediate_scheduler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let immediate = Arc::new(ImmediateScheduler::new()) as Arc<dyn Scheduler>;
        Stream::<i32, TestError>::just(vec![1, 2, 3])
            .subscribe_on(immediate.clone())
            .observe_on(immediate, 4)
            .subscribe_with(move |v| l.lock().push(v), |_| {}, || {});
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn share_connects_once_for_concurrent_subscribers() {
        let subscribe_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count_for_factory = subscribe_count.clone();
        let scheduler = TestScheduler::new();
        let shared = Stream::<u64, TestError>::defer(move || {
            count_for_factory.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Arc::new(creation::just(vec![1u64])) as Arc<dyn Source<u64, TestError>>
        })
        .share();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l1 = log.clone();
        let d1 = shared.clone().subscribe_with(move |v| l1.lock().push(v), |_| {}, || {});
        let l2 = log.clone();
        let d2 = shared.clone().subscribe_with(move |v| l2.lock().push(v), |_| {}, || {});
        assert_eq!(subscribe_count.load(std::sync::atomic::Ordering::SeqCst), 1);
        d1.dispose();
        d2.dispose();
        let _ = scheduler;
    }
}
