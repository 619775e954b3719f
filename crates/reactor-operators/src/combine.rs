//! Multi-source combinators: `merge`, `concat`, `startWith`, `zip`,
//! `combineLatest`, `withLatestFrom`, `sequenceEqual`.
//!
//! `zip`/`combineLatest`/`withLatestFrom` are expressed as 2-ary functions
//! taking an explicit combiner rather than variadic N-ary operators — the
//! idiomatic Rust shape (mirroring `Iterator::zip`/`futures::join`) given the
//! language has no variadic generics. Chain them (`zip(zip(a, b, ...), c,
//! ...)`) to combine more than two sources.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use reactor_core::{
    BoxObserver, CompositeDisposable, Disposable, Observer, ReactorError, SerialDisposable,
    SerializingObserver, Source, guard_call,
};

use crate::support::{Latch, composite_handle};

/// `merge(sources)`: interleaves every source's items as they arrive;
/// completes once every source has completed; the first error from any
/// source cancels the rest and is forwarded immediately.
pub struct Merge<T, E> {
    sources: Vec<Arc<dyn Source<T, E>>>,
}

impl<T, E> Merge<T, E> {
    pub fn new(sources: Vec<Arc<dyn Source<T, E>>>) -> Self {
        Self { sources }
    }
}

impl<T, E> Source<T, E> for Merge<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        if self.sources.is_empty() {
            observer.on_subscribe(Disposable::disposed());
            observer.on_complete();
            return;
        }
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let serializing = SerializingObserver::new(downstream.clone());
        let composite = CompositeDisposable::new();
        downstream.on_subscribe(composite_handle(&composite));
        let remaining = Arc::new(AtomicUsize::new(self.sources.len()));
        for source in &self.sources {
            source.subscribe(Box::new(MergeBranch {
                serializing: serializing.clone(),
                composite: composite.clone(),
                remaining: remaining.clone(),
            }));
        }
    }
}

struct MergeBranch<T, E> {
    serializing: Arc<SerializingObserver<T, E>>,
    composite: CompositeDisposable,
    remaining: Arc<AtomicUsize>,
}

impl<T, E> Observer<T, E> for MergeBranch<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.composite.add(d);
    }
    fn on_next(&self, value: T) {
        self.serializing.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.composite.dispose();
        self.serializing.on_error(error);
    }
    fn on_complete(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.serializing.on_complete();
        }
    }
}

pub fn merge<T, E>(sources: Vec<Arc<dyn Source<T, E>>>) -> Merge<T, E> {
    Merge::new(sources)
}

/// `concat(sources)`: subscribes to each source in order, only moving to the
/// next once the previous has completed. An error from the active source
/// cancels the chain and is forwarded immediately.
pub struct Concat<T, E> {
    sources: Arc<Vec<Arc<dyn Source<T, E>>>>,
}

impl<T, E> Concat<T, E> {
    pub fn new(sources: Vec<Arc<dyn Source<T, E>>>) -> Self {
        Self { sources: Arc::new(sources) }
    }
}

impl<T, E> Source<T, E> for Concat<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        if self.sources.is_empty() {
            observer.on_subscribe(Disposable::disposed());
            observer.on_complete();
            return;
        }
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let serial = SerialDisposable::new();
        downstream.on_subscribe(serial.as_disposable());
        concat_step(self.sources.clone(), 0, downstream, serial);
    }
}

fn concat_step<T, E>(
    sources: Arc<Vec<Arc<dyn Source<T, E>>>>,
    index: usize,
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
) where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    if index >= sources.len() {
        downstream.on_complete();
        return;
    }
    let advance_sources = sources.clone();
    let advance_downstream = downstream.clone();
    let advance_serial = serial.clone();
    let branch = ConcatBranch {
        downstream,
        serial: serial.clone(),
        advance: Mutex::new(Some(Box::new(move || {
            concat_step(advance_sources, index + 1, advance_downstream, advance_serial);
        }))),
    };
    sources[index].subscribe(Box::new(branch));
}

struct ConcatBranch<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
    advance: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<T, E> Observer<T, E> for ConcatBranch<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.serial.replace(d);
    }
    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        if let Some(advance) = self.advance.lock().take() {
            advance();
        }
    }
}

pub fn concat<T, E>(sources: Vec<Arc<dyn Source<T, E>>>) -> Concat<T, E> {
    Concat::new(sources)
}

/// `startWith(values, source)`: emits `values` in order, synchronously,
/// before subscribing to `source`.
pub struct StartWith<T, E> {
    prefix: Arc<Vec<T>>,
    upstream: Arc<dyn Source<T, E>>,
}

impl<T, E> StartWith<T, E> {
    pub fn new(prefix: Vec<T>, upstream: Arc<dyn Source<T, E>>) -> Self {
        Self { prefix: Arc::new(prefix), upstream }
    }
}

impl<T, E> Source<T, E> for StartWith<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let serial = SerialDisposable::new();
        downstream.on_subscribe(serial.as_disposable());
        for value in self.prefix.iter() {
            downstream.on_next(value.clone());
        }
        self.upstream.subscribe(Box::new(StartWithBranch { downstream, serial }));
    }
}

struct StartWithBranch<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
}

impl<T, E> Observer<T, E> for StartWithBranch<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.serial.replace(d);
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

pub fn start_with<T, E>(prefix: Vec<T>, upstream: Arc<dyn Source<T, E>>) -> StartWith<T, E> {
    StartWith::new(prefix, upstream)
}

/// `zip(a, b, combiner)`: pairs the n-th item of `a` with the n-th item of
/// `b`; completes once either side is exhausted and has no further buffered
/// partner (an unequal-length zip silently drops the longer side's tail).
pub struct Zip<T1, T2, U, E, F> {
    first: Arc<dyn Source<T1, E>>,
    second: Arc<dyn Source<T2, E>>,
    combiner: Arc<F>,
    _marker: std::marker::PhantomData<U>,
}

impl<T1, T2, U, E, F> Zip<T1, T2, U, E, F> {
    pub fn new(first: Arc<dyn Source<T1, E>>, second: Arc<dyn Source<T2, E>>, combiner: F) -> Self {
        Self { first, second, combiner: Arc::new(combiner), _marker: std::marker::PhantomData }
    }
}

struct PairState<T1, T2> {
    left: VecDeque<T1>,
    right: VecDeque<T2>,
    left_done: bool,
    right_done: bool,
}

struct ZipShared<T1, T2, U, E, F> {
    downstream: Arc<dyn Observer<U, E>>,
    combiner: Arc<F>,
    state: Mutex<PairState<T1, T2>>,
    latch: Latch,
    composite: CompositeDisposable,
}

impl<T1, T2, U, E, F> ZipShared<T1, T2, U, E, F>
where
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn try_emit(&self) {
        loop {
            let pair = {
                let mut state = self.state.lock();
                if !state.left.is_empty() && !state.right.is_empty() {
                    Some((state.left.pop_front().unwrap(), state.right.pop_front().unwrap()))
                } else {
                    None
                }
            };
            match pair {
                Some((l, r)) => {
                    if self.latch.is_closed() {
                        return;
                    }
                    let combiner = &self.combiner;
                    match guard_call("zip.combiner_panicked", move || combiner(l, r)) {
                        Ok(value) => self.downstream.on_next(value),
                        Err(e) => {
                            if self.latch.try_close() {
                                self.composite.dispose();
                                self.downstream.on_error(e.into());
                            }
                            return;
                        }
                    }
                }
                None => {
                    self.check_complete();
                    return;
                }
            }
        }
    }

    fn check_complete(&self) {
        let done = {
            let state = self.state.lock();
            (state.left_done && state.left.is_empty()) || (state.right_done && state.right.is_empty())
        };
        if done && self.latch.try_close() {
            self.composite.dispose();
            self.downstream.on_complete();
        }
    }
}

struct ZipLeft<T1, T2, U, E, F> {
    shared: Arc<ZipShared<T1, T2, U, E, F>>,
}

impl<T1, T2, U, E, F> Observer<T1, E> for ZipLeft<T1, T2, U, E, F>
where
    T1: Send + Sync + 'static,
    T2: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T1) {
        self.shared.state.lock().left.push_back(value);
        self.shared.try_emit();
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.state.lock().left_done = true;
        self.shared.check_complete();
    }
}

struct ZipRight<T1, T2, U, E, F> {
    shared: Arc<ZipShared<T1, T2, U, E, F>>,
}

impl<T1, T2, U, E, F> Observer<T2, E> for ZipRight<T1, T2, U, E, F>
where
    T1: Send + Sync + 'static,
    T2: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T2) {
        self.shared.state.lock().right.push_back(value);
        self.shared.try_emit();
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.state.lock().right_done = true;
        self.shared.check_complete();
    }
}

impl<T1, T2, U, E, F> Source<U, E> for Zip<T1, T2, U, E, F>
where
    T1: Send + Sync + 'static,
    T2: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        let downstream: Arc<dyn Observer<U, E>> = Arc::from(observer);
        let shared = Arc::new(ZipShared {
            downstream,
            combiner: self.combiner.clone(),
            state: Mutex::new(PairState {
                left: VecDeque::new(),
                right: VecDeque::new(),
                left_done: false,
                right_done: false,
            }),
            latch: Latch::new(),
            composite: CompositeDisposable::new(),
        });
        shared.downstream.on_subscribe(composite_handle(&shared.composite));
        self.first.subscribe(Box::new(ZipLeft { shared: shared.clone() }));
        self.second.subscribe(Box::new(ZipRight { shared: shared.clone() }));
    }
}

pub fn zip<T1, T2, U, E, F>(first: Arc<dyn Source<T1, E>>, second: Arc<dyn Source<T2, E>>, combiner: F) -> Zip<T1, T2, U, E, F>
where
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    Zip::new(first, second, combiner)
}

/// `combineLatest(a, b, combiner)`: emits a combined value every time either
/// side emits, once both sides have produced at least one value.
pub struct CombineLatest<T1, T2, U, E, F> {
    first: Arc<dyn Source<T1, E>>,
    second: Arc<dyn Source<T2, E>>,
    combiner: Arc<F>,
    _marker: std::marker::PhantomData<U>,
}

impl<T1, T2, U, E, F> CombineLatest<T1, T2, U, E, F> {
    pub fn new(first: Arc<dyn Source<T1, E>>, second: Arc<dyn Source<T2, E>>, combiner: F) -> Self {
        Self { first, second, combiner: Arc::new(combiner), _marker: std::marker::PhantomData }
    }
}

struct LatestState<T1, T2> {
    left: Option<T1>,
    right: Option<T2>,
    left_done: bool,
    right_done: bool,
}

struct CombineLatestShared<T1, T2, U, E, F>
where
    T1: Clone,
    T2: Clone,
{
    downstream: Arc<dyn Observer<U, E>>,
    combiner: Arc<F>,
    state: Mutex<LatestState<T1, T2>>,
    latch: Latch,
    composite: CompositeDisposable,
}

impl<T1, T2, U, E, F> CombineLatestShared<T1, T2, U, E, F>
where
    T1: Clone + Send + Sync + 'static,
    T2: Clone + Send + Sync + 'static,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn try_emit(&self) {
        let pair = {
            let state = self.state.lock();
            match (&state.left, &state.right) {
                (Some(l), Some(r)) => Some((l.clone(), r.clone())),
                _ => None,
            }
        };
        if let Some((l, r)) = pair {
            let combiner = &self.combiner;
            match guard_call("combineLatest.combiner_panicked", move || combiner(l, r)) {
                Ok(value) => self.downstream.on_next(value),
                Err(e) => {
                    if self.latch.try_close() {
                        self.composite.dispose();
                        self.downstream.on_error(e.into());
                    }
                }
            }
        }
    }

    fn check_complete(&self) {
        let done = {
            let state = self.state.lock();
            state.left_done && state.right_done
        };
        if done && self.latch.try_close() {
            self.composite.dispose();
            self.downstream.on_complete();
        }
    }
}

struct CombineLeft<T1, T2, U, E, F>
where
    T1: Clone,
    T2: Clone,
{
    shared: Arc<CombineLatestShared<T1, T2, U, E, F>>,
}

impl<T1, T2, U, E, F> Observer<T1, E> for CombineLeft<T1, T2, U, E, F>
where
    T1: Clone + Send + Sync + 'static,
    T2: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T1) {
        self.shared.state.lock().left = Some(value);
        self.shared.try_emit();
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.state.lock().left_done = true;
        self.shared.check_complete();
    }
}

struct CombineRight<T1, T2, U, E, F>
where
    T1: Clone,
    T2: Clone,
{
    shared: Arc<CombineLatestShared<T1, T2, U, E, F>>,
}

impl<T1, T2, U, E, F> Observer<T2, E> for CombineRight<T1, T2, U, E, F>
where
    T1: Clone + Send + Sync + 'static,
    T2: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T2) {
        self.shared.state.lock().right = Some(value);
        self.shared.try_emit();
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.state.lock().right_done = true;
        self.shared.check_complete();
    }
}

impl<T1, T2, U, E, F> Source<U, E> for CombineLatest<T1, T2, U, E, F>
where
    T1: Clone + Send + Sync + 'static,
    T2: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        let downstream: Arc<dyn Observer<U, E>> = Arc::from(observer);
        let shared = Arc::new(CombineLatestShared {
            downstream,
            combiner: self.combiner.clone(),
            state: Mutex::new(LatestState { left: None, right: None, left_done: false, right_done: false }),
            latch: Latch::new(),
            composite: CompositeDisposable::new(),
        });
        shared.downstream.on_subscribe(composite_handle(&shared.composite));
        self.first.subscribe(Box::new(CombineLeft { shared: shared.clone() }));
        self.second.subscribe(Box::new(CombineRight { shared: shared.clone() }));
    }
}

pub fn combine_latest<T1, T2, U, E, F>(
    first: Arc<dyn Source<T1, E>>,
    second: Arc<dyn Source<T2, E>>,
    combiner: F,
) -> CombineLatest<T1, T2, U, E, F>
where
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    CombineLatest::new(first, second, combiner)
}

/// `withLatestFrom(primary, other, combiner)`: emits once per `primary` item,
/// paired with the most recent `other` value; a `primary` item arriving
/// before `other` has ever emitted is dropped. Only `primary`'s termination
/// (or an error from either side) ends the stream.
pub struct WithLatestFrom<T1, T2, U, E, F> {
    primary: Arc<dyn Source<T1, E>>,
    other: Arc<dyn Source<T2, E>>,
    combiner: Arc<F>,
    _marker: std::marker::PhantomData<U>,
}

impl<T1, T2, U, E, F> WithLatestFrom<T1, T2, U, E, F> {
    pub fn new(primary: Arc<dyn Source<T1, E>>, other: Arc<dyn Source<T2, E>>, combiner: F) -> Self {
        Self { primary, other, combiner: Arc::new(combiner), _marker: std::marker::PhantomData }
    }
}

struct WithLatestShared<T2, U, E, F> {
    downstream: Arc<dyn Observer<U, E>>,
    combiner: Arc<F>,
    latest: Mutex<Option<T2>>,
    latch: Latch,
    composite: CompositeDisposable,
}

struct WithLatestPrimary<T1, T2, U, E, F> {
    shared: Arc<WithLatestShared<T2, U, E, F>>,
    _marker: std::marker::PhantomData<T1>,
}

impl<T1, T2, U, E, F> Observer<T1, E> for WithLatestPrimary<T1, T2, U, E, F>
where
    T1: Send + Sync + 'static,
    T2: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T1) {
        let other = self.shared.latest.lock().clone();
        let Some(other) = other else { return };
        let combiner = &self.shared.combiner;
        match guard_call("withLatestFrom.combiner_panicked", move || combiner(value, other)) {
            Ok(combined) => self.shared.downstream.on_next(combined),
            Err(e) => {
                if self.shared.latch.try_close() {
                    self.shared.composite.dispose();
                    self.shared.downstream.on_error(e.into());
                }
            }
        }
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_complete();
        }
    }
}

struct WithLatestOther<T2, U, E, F> {
    shared: Arc<WithLatestShared<T2, U, E, F>>,
}

impl<T2, U, E, F> Observer<T2, E> for WithLatestOther<T2, U, E, F>
where
    T2: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T2) {
        *self.shared.latest.lock() = Some(value);
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        // `other` completing doesn't end the stream; only `primary` does.
    }
}

impl<T1, T2, U, E, F> Source<U, E> for WithLatestFrom<T1, T2, U, E, F>
where
    T1: Send + Sync + 'static,
    T2: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        let downstream: Arc<dyn Observer<U, E>> = Arc::from(observer);
        let shared = Arc::new(WithLatestShared {
            downstream,
            combiner: self.combiner.clone(),
            latest: Mutex::new(None),
            latch: Latch::new(),
            composite: CompositeDisposable::new(),
        });
        shared.downstream.on_subscribe(composite_handle(&shared.composite));
        self.other.subscribe(Box::new(WithLatestOther { shared: shared.clone() }));
        self.primary.subscribe(Box::new(WithLatestPrimary { shared, _marker: std::marker::PhantomData }));
    }
}

pub fn with_latest_from<T1, T2, U, E, F>(
    primary: Arc<dyn Source<T1, E>>,
    other: Arc<dyn Source<T2, E>>,
    combiner: F,
) -> WithLatestFrom<T1, T2, U, E, F>
where
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    WithLatestFrom::new(primary, other, combiner)
}

/// `sequenceEqual(a, b)`: `true` iff both streams emit the same items, in the
/// same order, and complete at the same length.
pub struct SequenceEqual<T, E> {
    first: Arc<dyn Source<T, E>>,
    second: Arc<dyn Source<T, E>>,
}

impl<T, E> SequenceEqual<T, E> {
    pub fn new(first: Arc<dyn Source<T, E>>, second: Arc<dyn Source<T, E>>) -> Self {
        Self { first, second }
    }
}

struct EqShared<T, E> {
    downstream: Arc<dyn Observer<bool, E>>,
    state: Mutex<PairState<T, T>>,
    latch: Latch,
    composite: CompositeDisposable,
}

impl<T, E> EqShared<T, E>
where
    T: PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn finish(&self, result: bool) {
        if self.latch.try_close() {
            self.composite.dispose();
            self.downstream.on_next(result);
            self.downstream.on_complete();
        }
    }

    fn progress(&self) {
        loop {
            if self.latch.is_closed() {
                return;
            }
            let mut state = self.state.lock();
            if !state.left.is_empty() && !state.right.is_empty() {
                let l = state.left.pop_front().unwrap();
                let r = state.right.pop_front().unwrap();
                drop(state);
                if l != r {
                    self.finish(false);
                }
                continue;
            }
            let left_exhausted = state.left_done && state.left.is_empty();
            let right_exhausted = state.right_done && state.right.is_empty();
            if left_exhausted && right_exhausted {
                drop(state);
                self.finish(true);
                return;
            }
            if left_exhausted && !state.right.is_empty() {
                drop(state);
                self.finish(false);
                return;
            }
            if right_exhausted && !state.left.is_empty() {
                drop(state);
                self.finish(false);
                return;
            }
            return;
        }
    }
}

struct EqLeft<T, E> {
    shared: Arc<EqShared<T, E>>,
}
impl<T, E> Observer<T, E> for EqLeft<T, E>
where
    T: PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T) {
        self.shared.state.lock().left.push_back(value);
        self.shared.progress();
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.state.lock().left_done = true;
        self.shared.progress();
    }
}

struct EqRight<T, E> {
    shared: Arc<EqShared<T, E>>,
}
impl<T, E> Observer<T, E> for EqRight<T, E>
where
    T: PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T) {
        self.shared.state.lock().right.push_back(value);
        self.shared.progress();
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.composite.dispose();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.state.lock().right_done = true;
        self.shared.progress();
    }
}

impl<T, E> Source<bool, E> for SequenceEqual<T, E>
where
    T: PartialEq + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<bool, E>) {
        let downstream: Arc<dyn Observer<bool, E>> = Arc::from(observer);
        let shared = Arc::new(EqShared {
            downstream,
            state: Mutex::new(PairState {
                left: VecDeque::new(),
                right: VecDeque::new(),
                left_done: false,
                right_done: false,
            }),
            latch: Latch::new(),
            composite: CompositeDisposable::new(),
        });
        shared.downstream.on_subscribe(composite_handle(&shared.composite));
        self.first.subscribe(Box::new(EqLeft { shared: shared.clone() }));
        self.second.subscribe(Box::new(EqRight { shared: shared.clone() }));
    }
}

pub fn sequence_equal<T, E>(first: Arc<dyn Source<T, E>>, second: Arc<dyn Source<T, E>>) -> SequenceEqual<T, E>
where
    T: PartialEq + Send + Sync + 'static,
{
    SequenceEqual::new(first, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::just;

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
    fn src(values: Vec<i32>) -> Arc<dyn Source<i32, TestError>> {
        Arc::new(just(values))
    }

    #[test]
    fn merge_of_empty_list_completes_immediately() {
        let (log, obs) = recorder::<i32>();
        Source::<i32, TestError>::subscribe(&merge(vec![]), obs);
        assert_eq!(*log.lock(), vec!["complete"]);
    }

    #[test]
    fn merge_waits_for_every_branch_to_complete() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&merge(vec![src(vec![1, 2]), src(vec![3])]), obs);
        let values = log.lock();
        assert_eq!(values.len(), 4);
        assert_eq!(values.last().unwrap(), "complete");
    }

    #[test]
    fn concat_runs_sources_strictly_in_order() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&concat(vec![src(vec![1, 2]), src(vec![3, 4])]), obs);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "next:3", "next:4", "complete"]);
    }

    #[test]
    fn start_with_prepends_values_before_upstream() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&start_with(vec![0, -1], src(vec![1, 2])), obs);
        assert_eq!(*log.lock(), vec!["next:0", "next:-1", "next:1", "next:2", "complete"]);
    }

    #[test]
    fn zip_pairs_by_position_and_completes_with_shorter_side() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(
            &zip(src(vec![1, 2, 3]), src(vec![10, 20]), |a, b| a + b),
            obs,
        );
        assert_eq!(*log.lock(), vec!["next:11", "next:22", "complete"]);
    }

    #[test]
    fn combine_latest_emits_once_both_sides_have_a_value() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(
            &combine_latest(src(vec![1, 2]), src(vec![10]), |a, b| a + b),
            obs,
        );
        let values = log.lock();
        assert!(values.contains(&"complete".to_string()));
    }

    #[test]
    fn sequence_equal_true_for_identical_streams() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&sequence_equal(src(vec![1, 2, 3]), src(vec![1, 2, 3])), obs);
        assert_eq!(*log.lock(), vec!["next:true", "complete"]);
    }

    #[test]
    fn sequence_equal_false_on_mismatch() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&sequence_equal(src(vec![1, 2, 3]), src(vec![1, 9, 3])), obs);
        assert_eq!(*log.lock(), vec!["next:false", "complete"]);
    }

    #[test]
    fn sequence_equal_false_on_length_mismatch() {
        let (log, obs) = recorder();
        Source::<bool, TestError>::subscribe(&sequence_equal(src(vec![1, 2]), src(vec![1, 2, 3])), obs);
        assert_eq!(*log.lock(), vec!["next:false", "complete"]);
    }
}
