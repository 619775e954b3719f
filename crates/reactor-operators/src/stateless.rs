//! Stateless transformations and predicate/aggregation terminals: operators
//! whose output for a given item depends only on that item (or, for the
//! terminals, only on the running total), never on a window of history.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer, ReactorError, Source, guard_call};

use crate::support::Latch;

/// `map(f)`
pub struct Map<T, U, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    mapper: Arc<F>,
}

impl<T, U, E, F> Map<T, U, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, mapper: F) -> Self {
        Self { upstream, mapper: Arc::new(mapper) }
    }
}

impl<T, U, E, F> Source<U, E> for Map<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        self.upstream.subscribe(Box::new(MapObserver {
            downstream: observer,
            mapper: self.mapper.clone(),
            latch: Latch::new(),
        }));
    }
}

struct MapObserver<T, U, E, F> {
    downstream: BoxObserver<U, E>,
    mapper: Arc<F>,
    latch: Latch,
}

impl<T, U, E, F> Observer<T, E> for MapObserver<T, U, E, F>
where
    F: Fn(T) -> U + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let mapper = &self.mapper;
        match guard_call("map.callback_panicked", move || mapper(value)) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(e) => {
                if self.latch.try_close() {
                    self.downstream.on_error(e.into());
                }
            }
        }
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_complete();
        }
    }
}

pub fn map<T, U, E, F>(upstream: Arc<dyn Source<T, E>>, mapper: F) -> Map<T, U, E, F>
where
    F: Fn(T) -> U + Send + Sync + 'static,
{
    Map::new(upstream, mapper)
}

/// `filter(predicate)`
pub struct Filter<T, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    predicate: Arc<F>,
}

impl<T, E, F> Filter<T, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, predicate: F) -> Self {
        Self { upstream, predicate: Arc::new(predicate) }
    }
}

impl<T, E, F> Source<T, E> for Filter<T, E, F>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.upstream.subscribe(Box::new(FilterObserver {
            downstream: observer,
            predicate: self.predicate.clone(),
            latch: Latch::new(),
        }));
    }
}

struct FilterObserver<T, E, F> {
    downstream: BoxObserver<T, E>,
    predicate: Arc<F>,
    latch: Latch,
}

impl<T, E, F> Observer<T, E> for FilterObserver<T, E, F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let predicate = &self.predicate;
        match guard_call("filter.predicate_panicked", || predicate(&value)) {
            Ok(true) => self.downstream.on_next(value),
            Ok(false) => {}
            Err(e) => {
                if self.latch.try_close() {
                    self.downstream.on_error(e.into());
                }
            }
        }
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_complete();
        }
    }
}

pub fn filter<T, E, F>(upstream: Arc<dyn Source<T, E>>, predicate: F) -> Filter<T, E, F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Filter::new(upstream, predicate)
}

/// `take(n)`: forwards the first `n` items then completes and cancels upstream.
/// `n == 0` completes immediately without subscribing upstream at all.
pub struct Take<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    n: u64,
}

impl<T, E> Take<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, n: u64) -> Self {
        Self { upstream, n }
    }
}

impl<T, E> Source<T, E> for Take<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        if self.n == 0 {
            observer.on_subscribe(Disposable::disposed());
            observer.on_complete();
            return;
        }
        self.upstream.subscribe(Box::new(TakeObserver {
            downstream: observer,
            remaining: AtomicU64::new(self.n),
            latch: Latch::new(),
            disposable: Mutex::new(None),
        }));
    }
}

struct TakeObserver<T, E> {
    downstream: BoxObserver<T, E>,
    remaining: AtomicU64,
    latch: Latch,
    disposable: Mutex<Option<Disposable>>,
}

impl<T, E> Observer<T, E> for TakeObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        *self.disposable.lock() = Some(d.clone());
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let before = self.remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            if n == 0 { None } else { Some(n - 1) }
        });
        let Ok(before) = before else { return };
        self.downstream.on_next(value);
        if before == 1 && self.latch.try_close() {
            if let Some(d) = self.disposable.lock().take() {
                d.dispose();
            }
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_complete();
        }
    }
}

pub fn take<T, E>(upstream: Arc<dyn Source<T, E>>, n: u64) -> Take<T, E> {
    Take::new(upstream, n)
}

/// `skip(n)`: drops the first `n` items, forwards the rest.
pub struct Skip<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    n: u64,
}

impl<T, E> Skip<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, n: u64) -> Self {
        Self { upstream, n }
    }
}

impl<T, E> Source<T, E> for Skip<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.upstream.subscribe(Box::new(SkipObserver {
            downstream: observer,
            remaining: AtomicU64::new(self.n),
        }));
    }
}

struct SkipObserver<T, E> {
    downstream: BoxObserver<T, E>,
    remaining: AtomicU64,
}

impl<T, E> Observer<T, E> for SkipObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        let skipped = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| if n == 0 { None } else { Some(n - 1) });
        if skipped.is_err() {
            self.downstream.on_next(value);
        }
    }
    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
}

pub fn skip<T, E>(upstream: Arc<dyn Source<T, E>>, n: u64) -> Skip<T, E> {
    Skip::new(upstream, n)
}

/// `distinctUntilChanged()`: suppresses an item structurally equal to its
/// immediate predecessor. Uses Rust's `Eq` — see the crate-level note on
/// `f64`-keyed streams.
pub struct DistinctUntilChanged<T, E> {
    upstream: Arc<dyn Source<T, E>>,
}

impl<T, E> DistinctUntilChanged<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>) -> Self {
        Self { upstream }
    }
}

impl<T, E> Source<T, E> for DistinctUntilChanged<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.upstream.subscribe(Box::new(DistinctObserver {
            downstream: observer,
            last: Mutex::new(None),
        }));
    }
}

struct DistinctObserver<T, E> {
    downstream: BoxObserver<T, E>,
    last: Mutex<Option<T>>,
}

impl<T, E> Observer<T, E> for DistinctObserver<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        let mut last = self.last.lock();
        if last.as_ref() == Some(&value) {
            return;
        }
        *last = Some(value.clone());
        drop(last);
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
}

pub fn distinct_until_changed<T, E>(upstream: Arc<dyn Source<T, E>>) -> DistinctUntilChanged<T, E> {
    DistinctUntilChanged::new(upstream)
}

/// `defaultIfEmpty(v)`: emits `v` if the upstream completes without ever
/// emitting a value; passes every other stream through unchanged.
pub struct DefaultIfEmpty<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    default: T,
}

impl<T: Clone, E> DefaultIfEmpty<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, default: T) -> Self {
        Self { upstream, default }
    }
}

impl<T, E> Source<T, E> for DefaultIfEmpty<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.upstream.subscribe(Box::new(DefaultIfEmptyObserver {
            downstream: observer,
            default: self.default.clone(),
            saw_value: std::sync::atomic::AtomicBool::new(false),
        }));
    }
}

struct DefaultIfEmptyObserver<T, E> {
    downstream: BoxObserver<T, E>,
    default: T,
    saw_value: std::sync::atomic::AtomicBool,
}

impl<T, E> Observer<T, E> for DefaultIfEmptyObserver<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        self.saw_value.store(true, Ordering::Release);
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        if !self.saw_value.load(Ordering::Acquire) {
            self.downstream.on_next(self.default.clone());
        }
        self.downstream.on_complete();
    }
}

pub fn default_if_empty<T: Clone, E>(upstream: Arc<dyn Source<T, E>>, default: T) -> DefaultIfEmpty<T, E> {
    DefaultIfEmpty::new(upstream, default)
}

/// `doOnNext`/`doOnError`/`doOnComplete`/`doOnSubscribe`/`doOnDispose`:
/// side-effecting taps that pass every signal through unchanged. A panic
/// inside a tap closure is reported to the process-wide sink (there is no
/// way to turn a tap failure into an `Error` without changing what
/// downstream already received). Unlike the others, `on_dispose` fires only
/// when the consumer actually disposes the subscription, not on ordinary
/// termination.
pub struct Tap<T, E> {
    on_subscribe: Option<Arc<dyn Fn() + Send + Sync>>,
    on_next: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&E) + Send + Sync>>,
    on_complete: Option<Arc<dyn Fn() + Send + Sync>>,
    on_dispose: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl<T, E> Tap<T, E> {
    pub fn new() -> Self {
        Self { on_subscribe: None, on_next: None, on_error: None, on_complete: None, on_dispose: None }
    }
    pub fn on_subscribe(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_subscribe = Some(Arc::new(f));
        self
    }
    pub fn on_next(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_next = Some(Arc::new(f));
        self
    }
    pub fn on_error(mut self, f: impl Fn(&E) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }
    pub fn on_dispose(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_dispose = Some(Arc::new(f));
        self
    }
}

pub struct DoOn<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    taps: Arc<Tap<T, E>>,
}

impl<T, E> DoOn<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, taps: Tap<T, E>) -> Self {
        Self { upstream, taps: Arc::new(taps) }
    }
}

impl<T, E> Source<T, E> for DoOn<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        if let Some(f) = &self.taps.on_subscribe {
            if let Err(e) = guard_call("doOn.on_subscribe_panicked", || f()) {
                crate::support::report_undeliverable(format!("doOnSubscribe callback panicked: {}", e.message()));
            }
        }
        self.upstream.subscribe(Box::new(DoOnObserver { downstream: observer, taps: self.taps.clone() }));
    }
}

struct DoOnObserver<T, E> {
    downstream: BoxObserver<T, E>,
    taps: Arc<Tap<T, E>>,
}

impl<T, E> Observer<T, E> for DoOnObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        match self.taps.on_dispose.clone() {
            Some(f) => {
                self.downstream.on_subscribe(Disposable::new(move || {
                    d.dispose();
                    if let Err(e) = guard_call("doOn.on_dispose_panicked", || f()) {
                        crate::support::report_undeliverable(format!("doOnDispose callback panicked: {}", e.message()));
                    }
                }));
            }
            None => self.downstream.on_subscribe(d),
        }
    }
    fn on_next(&self, value: T) {
        if let Some(f) = &self.taps.on_next {
            if let Err(e) = guard_call("doOn.on_next_panicked", || f(&value)) {
                crate::support::report_undeliverable(format!("doOnNext callback panicked: {}", e.message()));
            }
        }
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        if let Some(f) = &self.taps.on_error {
            if let Err(e) = guard_call("doOn.on_error_panicked", || f(&error)) {
                crate::support::report_undeliverable(format!("doOnError callback panicked: {}", e.message()));
            }
        }
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        if let Some(f) = &self.taps.on_complete {
            if let Err(e) = guard_call("doOn.on_complete_panicked", || f()) {
                crate::support::report_undeliverable(format!("doOnComplete callback panicked: {}", e.message()));
            }
        }
        self.downstream.on_complete();
    }
}

pub fn do_on<T, E>(upstream: Arc<dyn Source<T, E>>, taps: Tap<T, E>) -> DoOn<T, E> {
    DoOn::new(upstream, taps)
}

/// `count()`
pub struct Count<T, E> {
    upstream: Arc<dyn Source<T, E>>,
}

impl<T, E> Count<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>) -> Self {
        Self { upstream }
    }
}

impl<T, E> Source<u64, E> for Count<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<u64, E>) {
        self.upstream.subscribe(Box::new(CountObserver {
            downstream: observer,
            count: AtomicU64::new(0),
            latch: Latch::new(),
        }));
    }
}

struct CountObserver<E> {
    downstream: BoxObserver<u64, E>,
    count: AtomicU64,
    latch: Latch,
}

impl<T, E> Observer<T, E> for CountObserver<E>
where
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, _value: T) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_next(self.count.load(Ordering::Acquire));
            self.downstream.on_complete();
        }
    }
}

pub fn count<T, E>(upstream: Arc<dyn Source<T, E>>) -> Count<T, E> {
    Count::new(upstream)
}

/// Shared shape for the short-circuiting boolean terminals (`all`/`any`/
/// `contains`/`isEmpty`): evaluate a per-item test, emit as soon as the
/// result is determined and cancel the upstream production.
struct ShortCircuit<T, E, F> {
    downstream: BoxObserver<bool, E>,
    test: Arc<F>,
    short_on: bool,
    latch: Latch,
    disposable: Mutex<Option<Disposable>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, E, F> Observer<T, E> for ShortCircuit<T, E, F>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        *self.disposable.lock() = Some(d.clone());
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let test = &self.test;
        match guard_call("predicate_panicked", || test(&value)) {
            Ok(result) if result == self.short_on => {
                if self.latch.try_close() {
                    if let Some(d) = self.disposable.lock().take() {
                        d.dispose();
                    }
                    self.downstream.on_next(self.short_on);
                    self.downstream.on_complete();
                }
            }
            Ok(_) => {}
            Err(e) => {
                if self.latch.try_close() {
                    if let Some(d) = self.disposable.lock().take() {
                        d.dispose();
                    }
                    self.downstream.on_error(e.into());
                }
            }
        }
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_next(!self.short_on);
            self.downstream.on_complete();
        }
    }
}

/// `all(predicate)`: `false` as soon as one item fails; `true` if every item
/// passes (including the empty stream).
pub struct All<T, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    predicate: Arc<F>,
}

impl<T, E, F> All<T, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, predicate: F) -> Self {
        Self { upstream, predicate: Arc::new(predicate) }
    }
}

impl<T, E, F> Source<bool, E> for All<T, E, F>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<bool, E>) {
        self.upstream.subscribe(Box::new(ShortCircuit {
            downstream: observer,
            test: self.predicate.clone(),
            short_on: false,
            latch: Latch::new(),
            disposable: Mutex::new(None),
            _marker: std::marker::PhantomData,
        }));
    }
}

pub fn all<T, E, F>(upstream: Arc<dyn Source<T, E>>, predicate: F) -> All<T, E, F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    All::new(upstream, predicate)
}

/// `any(predicate)`: `true` as soon as one item passes; `false` if the
/// upstream completes without a match.
pub struct Any<T, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    predicate: Arc<F>,
}

impl<T, E, F> Any<T, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, predicate: F) -> Self {
        Self { upstream, predicate: Arc::new(predicate) }
    }
}

impl<T, E, F> Source<bool, E> for Any<T, E, F>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<bool, E>) {
        self.upstream.subscribe(Box::new(ShortCircuit {
            downstream: observer,
            test: self.predicate.clone(),
            short_on: true,
            latch: Latch::new(),
            disposable: Mutex::new(None),
            _marker: std::marker::PhantomData,
        }));
    }
}

pub fn any<T, E, F>(upstream: Arc<dyn Source<T, E>>, predicate: F) -> Any<T, E, F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Any::new(upstream, predicate)
}

/// `contains(target)`
pub fn contains<T, E>(upstream: Arc<dyn Source<T, E>>, target: T) -> Any<T, E, impl Fn(&T) -> bool + Send + Sync + 'static>
where
    T: PartialEq + Send + Sync + 'static,
{
    Any::new(upstream, move |value: &T| *value == target)
}

/// `isEmpty()`: `true` if the upstream completes without emitting, `false`
/// as soon as a first item arrives. Built on [`All`] rather than [`Any`]:
/// the predicate is trivially false for every item, so `All`'s short-circuit
/// (on first failure) fires with its `short_on = false` value, and `All`'s
/// complete-without-short-circuit value is `true` — exactly `isEmpty`'s polarity.
pub fn is_empty<T, E>(upstream: Arc<dyn Source<T, E>>) -> All<T, E, impl Fn(&T) -> bool + Send + Sync + 'static>
where
    T: Send + Sync + 'static,
{
    All::new(upstream, |_: &T| false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::just;
    use reactor_core::Signal;

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);
    impl From<ReactorError> for TestError {
        fn from(e: ReactorError) -> Self {
            TestError(e.to_string())
        }
    }

    struct Recorder<T> {
        log: Arc<Mutex<Vec<String>>>,
        _marker: std::marker::PhantomData<T>,
    }
    impl<T: std::fmt::Debug + Send + Sync + 'static> Observer<T, TestError> for Recorder<T> {
        fn on_subscribe(&self, _d: Disposable) {}
        fn on_next(&self, value: T) {
            self.log.lock().push(format!("next:{value:?}"));
        }
        fn on_error(&self, error: TestError) {
            self.log.lock().push(format!("error:{error}"));
        }
        fn on_complete(&self) {
            self.log.lock().push("complete".into());
        }
    }
    fn recorder<T>() -> (Arc<Mutex<Vec<String>>>, Box<Recorder<T>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (log.clone(), Box::new(Recorder { log, _marker: std::marker::PhantomData }))
    }
    fn upstream(values: Vec<i32>) -> Arc<dyn Source<i32, TestError>> {
        Arc::new(just(values))
    }

    #[test]
    fn map_transforms_every_value() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&map(upstream(vec![1, 2, 3]), |v| v * 10), obs);
        assert_eq!(*log.lock(), vec!["next:10", "next:20", "next:30", "complete"]);
    }

    #[test]
    fn map_panic_becomes_operator_error() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(
            &map(upstream(vec![1]), |_: i32| -> i32 { panic!("boom") }),
            obs,
        );
        assert_eq!(log.lock().len(), 1);
        assert!(log.lock()[0].starts_with("error:"));
    }

    #[test]
    fn filter_keeps_only_matching_values() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&filter(upstream(vec![1, 2, 3, 4]), |v| v % 2 == 0), obs);
        assert_eq!(*log.lock(), vec!["next:2", "next:4", "complete"]);
    }

    #[test]
    fn take_zero_completes_without_subscribing_upstream() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&take(upstream(vec![1, 2, 3]), 0), obs);
        assert_eq!(*log.lock(), vec!["complete"]);
    }

    #[test]
    fn take_n_stops_after_n_values() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&take(upstream(vec![1, 2, 3, 4, 5]), 2), obs);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "complete"]);
    }

    #[test]
    fn skip_past_length_yields_nothing_but_complete() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&skip(upstream(vec![1, 2]), 10), obs);
        assert_eq!(*log.lock(), vec!["complete"]);
    }

    #[test]
    fn distinct_until_changed_suppresses_consecutive_duplicates() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&distinct_until_changed(upstream(vec![1, 1, 2, 2, 1])), obs);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "next:1", "complete"]);
    }

    #[test]
    fn default_if_empty_substitutes_on_empty_stream() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&default_if_empty(upstream(vec![]), 42), obs);
        assert_eq!(*log.lock(), vec!["next:42", "complete"]);
    }

    #[test]
    fn default_if_empty_passes_nonempty_stream_through() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&default_if_empty(upstream(vec![7]), 42), obs);
        assert_eq!(*log.lock(), vec!["next:7", "complete"]);
    }

    #[test]
    fn count_emits_the_total_then_completes() {
        let (log, obs) = recorder();
        Source::<u64, TestError>::subscribe(&count(upstream(vec![1, 2, 3])), obs);
        assert_eq!(*log.lock(), vec!["next:3", "complete"]);
    }

    #[test]
    fn all_short_circuits_to_false_on_first_failure() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&all(upstream(vec![2, 4, 5, 6]), |v| v % 2 == 0), obs);
        assert_eq!(*log.lock(), vec!["next:false", "complete"]);
    }

    #[test]
    fn all_on_empty_stream_is_true() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&all(upstream(vec![]), |v: &i32| *v > 0), obs);
        assert_eq!(*log.lock(), vec!["next:true", "complete"]);
    }

    #[test]
    fn any_short_circuits_to_true_on_first_match() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&any(upstream(vec![1, 3, 4, 5]), |v| v % 2 == 0), obs);
        assert_eq!(*log.lock(), vec!["next:true", "complete"]);
    }

    #[test]
    fn contains_finds_target_value() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&contains(upstream(vec![1, 2, 3]), 2), obs);
        assert_eq!(*log.lock(), vec!["next:true", "complete"]);
    }

    #[test]
    fn is_empty_true_when_no_items_arrive() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&is_empty(upstream(vec![])), obs);
        assert_eq!(*log.lock(), vec!["next:true", "complete"]);
    }

    #[test]
    fn is_empty_false_when_an_item_arrives() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&is_empty(upstream(vec![1])), obs);
        assert_eq!(*log.lock(), vec!["next:false", "complete"]);
    }

    #[test]
    fn do_on_next_observes_values_without_altering_them() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let taps = Tap::new().on_next(move |v: &i32| s.lock().push(*v));
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&do_on(upstream(vec![1, 2]), taps), obs);
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "complete"]);
    }

    #[test]
    fn signal_ordering_matches_source_contract() {
        let sig: Signal<i32, TestError> = Signal::Next(1);
        assert!(!sig.is_terminal());
        assert!(Signal::<i32, TestError>::Complete.is_terminal());
    }
}
