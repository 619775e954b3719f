//! `flatMap`/`concatMap`/`switchMap`: operators whose mapper produces a new
//! inner [`Source`] per upstream item and whose job is to manage the
//! resulting fan-out.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use reactor_core::{
    BoxObserver, CompositeDisposable, Disposable, GenerationToken, Observer, ReactorError,
    SerialDisposable, SerializingObserver, Source, guard_call,
};

use crate::support::{Latch, composite_handle};

/// `flatMap(mapper, max_concurrency)`: subscribes to the inner source
/// produced by `mapper` for each upstream item, running up to
/// `max_concurrency` inner sources at once (excess items queue); outer items
/// are interleaved as inners produce them, so output order across different
/// inners is not preserved. `max_concurrency == 1` gives ordered
/// [`ConcatMap`]-style behavior since only one inner runs at a time and the
/// queue drains strictly in arrival order.
pub struct FlatMap<T, U, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    mapper: Arc<F>,
    max_concurrency: usize,
    _marker: std::marker::PhantomData<U>,
}

impl<T, U, E, F> FlatMap<T, U, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, mapper: F, max_concurrency: usize) -> Self {
        Self {
            upstream,
            mapper: Arc::new(mapper),
            max_concurrency: max_concurrency.max(1),
            _marker: std::marker::PhantomData,
        }
    }
}

struct FlatMapShared<U, E> {
    downstream: Arc<SerializingObserver<U, E>>,
    composite: CompositeDisposable,
    latch: Latch,
    active: AtomicUsize,
    max_concurrency: usize,
    outer_done: AtomicBool,
    pending: Mutex<VecDeque<Box<dyn FnOnce(Arc<FlatMapShared<U, E>>) + Send>>>,
}

impl<U, E> FlatMapShared<U, E>
where
    U: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn inner_completed(self: &Arc<Self>) {
        let next = self.pending.lock().pop_front();
        match next {
            Some(start) => start(self.clone()),
            None => {
                self.active.fetch_sub(1, Ordering::AcqRel);
                self.maybe_complete();
            }
        }
    }

    fn maybe_complete(&self) {
        let done = self.outer_done.load(Ordering::Acquire)
            && self.active.load(Ordering::Acquire) == 0
            && self.pending.lock().is_empty();
        if done && self.latch.try_close() {
            self.composite.dispose();
            self.downstream.on_complete();
        }
    }

    fn fail(&self, error: E) {
        if self.latch.try_close() {
            self.composite.dispose();
            self.downstream.on_error(error);
        }
    }
}

struct InnerObserver<U, E> {
    shared: Arc<FlatMapShared<U, E>>,
}

impl<U, E> Observer<U, E> for InnerObserver<U, E>
where
    U: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: U) {
        if self.shared.latch.is_closed() {
            return;
        }
        self.shared.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.shared.fail(error);
    }
    fn on_complete(&self) {
        if self.shared.latch.is_closed() {
            return;
        }
        self.shared.inner_completed();
    }
}

struct OuterObserver<T, U, E, F> {
    shared: Arc<FlatMapShared<U, E>>,
    mapper: Arc<F>,
    _marker: std::marker::PhantomData<T>,
}

fn start_inner<U, E>(shared: Arc<FlatMapShared<U, E>>, source: Arc<dyn Source<U, E>>)
where
    U: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    source.subscribe(Box::new(InnerObserver { shared }));
}

impl<T, U, E, F> Observer<T, E> for OuterObserver<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.composite.add(d);
    }
    fn on_next(&self, value: T) {
        if self.shared.latch.is_closed() {
            return;
        }
        let mapper = &self.mapper;
        let inner_source = match guard_call("flatMap.mapper_panicked", move || mapper(value)) {
            Ok(source) => source,
            Err(e) => {
                self.shared.fail(e.into());
                return;
            }
        };
        let active = self.shared.active.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            if n < self.shared.max_concurrency { Some(n + 1) } else { None }
        });
        if active.is_ok() {
            start_inner(self.shared.clone(), inner_source);
        } else {
            self.shared.pending.lock().push_back(Box::new(move |shared| {
                start_inner(shared, inner_source);
            }));
        }
    }
    fn on_error(&self, error: E) {
        self.shared.fail(error);
    }
    fn on_complete(&self) {
        self.shared.outer_done.store(true, Ordering::Release);
        self.shared.maybe_complete();
    }
}

impl<T, U, E, F> Source<U, E> for FlatMap<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        let downstream: Arc<dyn Observer<U, E>> = Arc::from(observer);
        let shared = Arc::new(FlatMapShared {
            downstream: SerializingObserver::new(downstream),
            composite: CompositeDisposable::new(),
            latch: Latch::new(),
            active: AtomicUsize::new(0),
            max_concurrency: self.max_concurrency,
            outer_done: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
        });
        shared.downstream.on_subscribe(composite_handle(&shared.composite));
        self.upstream.subscribe(Box::new(OuterObserver {
            shared,
            mapper: self.mapper.clone(),
            _marker: std::marker::PhantomData,
        }));
    }
}

pub fn flat_map<T, U, E, F>(upstream: Arc<dyn Source<T, E>>, mapper: F, max_concurrency: usize) -> FlatMap<T, U, E, F>
where
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    FlatMap::new(upstream, mapper, max_concurrency)
}

/// `concatMap(mapper)`: `flatMap` with a concurrency cap of 1, preserving
/// the outer item order in the output.
pub fn concat_map<T, U, E, F>(upstream: Arc<dyn Source<T, E>>, mapper: F) -> FlatMap<T, U, E, F>
where
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    FlatMap::new(upstream, mapper, 1)
}

/// `switchMap(mapper)`: subscribes to the inner source produced by the
/// latest upstream item, disposing whichever inner was previously active.
/// Completes once the outer has completed and the current (last) inner has
/// completed.
pub struct SwitchMap<T, U, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    mapper: Arc<F>,
    _marker: std::marker::PhantomData<U>,
}

impl<T, U, E, F> SwitchMap<T, U, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, mapper: F) -> Self {
        Self { upstream, mapper: Arc::new(mapper), _marker: std::marker::PhantomData }
    }
}

struct SwitchShared<U, E> {
    downstream: Arc<SerializingObserver<U, E>>,
    generation: GenerationToken,
    inner_slot: SerialDisposable,
    outer_composite: CompositeDisposable,
    inner_active: AtomicBool,
    outer_done: AtomicBool,
    latch: Latch,
}

impl<U, E> SwitchShared<U, E>
where
    U: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn finish_complete(&self) {
        if self.latch.try_close() {
            self.inner_slot.dispose();
            self.outer_composite.dispose();
            self.downstream.on_complete();
        }
    }
    fn finish_error(&self, error: E) {
        if self.latch.try_close() {
            self.inner_slot.dispose();
            self.outer_composite.dispose();
            self.downstream.on_error(error);
        }
    }
}

struct SwitchInner<U, E> {
    shared: Arc<SwitchShared<U, E>>,
    generation: u64,
}

impl<U, E> Observer<U, E> for SwitchInner<U, E>
where
    U: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        if self.shared.generation.is_current(self.generation) {
            self.shared.inner_slot.replace(d);
        } else {
            d.dispose();
        }
    }
    fn on_next(&self, value: U) {
        if self.shared.generation.is_current(self.generation) {
            self.shared.downstream.on_next(value);
        }
    }
    fn on_error(&self, error: E) {
        if self.shared.generation.is_current(self.generation) {
            self.shared.finish_error(error);
        }
    }
    fn on_complete(&self) {
        if self.shared.generation.is_current(self.generation) {
            self.shared.inner_active.store(false, Ordering::Release);
            if self.shared.outer_done.load(Ordering::Acquire) {
                self.shared.finish_complete();
            }
        }
    }
}

struct SwitchOuter<T, U, E, F> {
    shared: Arc<SwitchShared<U, E>>,
    mapper: Arc<F>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, U, E, F> Observer<T, E> for SwitchOuter<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.outer_composite.add(d);
    }
    fn on_next(&self, value: T) {
        if self.shared.latch.is_closed() {
            return;
        }
        let mapper = &self.mapper;
        let inner_source = match guard_call("switchMap.mapper_panicked", move || mapper(value)) {
            Ok(source) => source,
            Err(e) => {
                self.shared.finish_error(e.into());
                return;
            }
        };
        let generation = self.shared.generation.advance();
        self.shared.inner_active.store(true, Ordering::Release);
        inner_source.subscribe(Box::new(SwitchInner { shared: self.shared.clone(), generation }));
    }
    fn on_error(&self, error: E) {
        self.shared.finish_error(error);
    }
    fn on_complete(&self) {
        self.shared.outer_done.store(true, Ordering::Release);
        if !self.shared.inner_active.load(Ordering::Acquire) {
            self.shared.finish_complete();
        }
    }
}

impl<T, U, E, F> Source<U, E> for SwitchMap<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        let downstream: Arc<dyn Observer<U, E>> = Arc::from(observer);
        let shared = Arc::new(SwitchShared {
            downstream: SerializingObserver::new(downstream),
            generation: GenerationToken::new(),
            inner_slot: SerialDisposable::new(),
            outer_composite: CompositeDisposable::new(),
            inner_active: AtomicBool::new(false),
            outer_done: AtomicBool::new(false),
            latch: Latch::new(),
        });
        let handle = {
            let inner = shared.inner_slot.clone();
            let outer = shared.outer_composite.clone();
            Disposable::new(move || {
                inner.dispose();
                outer.dispose();
            })
        };
        shared.downstream.on_subscribe(handle);
        self.upstream.subscribe(Box::new(SwitchOuter {
            shared,
            mapper: self.mapper.clone(),
            _marker: std::marker::PhantomData,
        }));
    }
}

pub fn switch_map<T, U, E, F>(upstream: Arc<dyn Source<T, E>>, mapper: F) -> SwitchMap<T, U, E, F>
where
    F: Fn(T) -> Arc<dyn Source<U, E>> + Send + Sync + 'static,
{
    SwitchMap::new(upstream, mapper)
}
