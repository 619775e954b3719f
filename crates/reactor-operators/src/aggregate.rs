//! `(supplemented)` terminal collectors named in the external surface
//! (`toList`/`toSet`/`toMap`/`collect`) but not separately detailed as their
//! own stage in the original component design — grounded in the same
//! fold-to-terminal shape as [`crate::windowing::reduce`], generalized to a
//! mutating accumulator (`Fn(&mut C, T)`) instead of `reduce`'s
//! clone-and-replace one, since the containers involved (`Vec`/`HashSet`/
//! `HashMap`) are naturally built by mutation rather than by value.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer, ReactorError, Source, guard_call};

use crate::support::Latch;

/// `collect(seed_fn, accumulator)`: the general form every other aggregator
/// here is built from. `seed_fn` is invoked once per subscription (keeping
/// the stage cold, like every other operator); `accumulator` mutates the
/// running container for each upstream item. Emits the finished container
/// once, on upstream `Complete`.
pub struct Collect<T, C, E, F, S> {
    upstream: Arc<dyn Source<T, E>>,
    seed_fn: Arc<S>,
    accumulator: Arc<F>,
    _marker: std::marker::PhantomData<fn() -> (T, C, E)>,
}

impl<T, C, E, F, S> Collect<T, C, E, F, S> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, seed_fn: S, accumulator: F) -> Self {
        Self {
            upstream,
            seed_fn: Arc::new(seed_fn),
            accumulator: Arc::new(accumulator),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, C, E, F, S> Source<C, E> for Collect<T, C, E, F, S>
where
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(&mut C, T) + Send + Sync + 'static,
    S: Fn() -> C + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<C, E>) {
        self.upstream.subscribe(Box::new(CollectObserver {
            downstream: observer,
            accumulator: self.accumulator.clone(),
            state: Mutex::new(Some((self.seed_fn)())),
            latch: Latch::new(),
        }));
    }
}

struct CollectObserver<T, C, E, F> {
    downstream: BoxObserver<C, E>,
    accumulator: Arc<F>,
    state: Mutex<Option<C>>,
    latch: Latch,
}

impl<T, C, E, F> Observer<T, E> for CollectObserver<T, C, E, F>
where
    C: Send + Sync + 'static,
    F: Fn(&mut C, T) + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }

    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let mut guard = self.state.lock();
        let container = guard.as_mut().expect("container only taken on terminal");
        let accumulator = &self.accumulator;
        let result = guard_call("collect.accumulator_panicked", move || {
            accumulator(container, value)
        });
        if let Err(e) = result {
            drop(guard);
            if self.latch.try_close() {
                self.downstream.on_error(e.into());
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
            let container = self.state.lock().take().expect("seed_fn always populates state");
            self.downstream.on_next(container);
            self.downstream.on_complete();
        }
    }
}

pub fn collect<T, C, E, F, S>(
    upstream: Arc<dyn Source<T, E>>,
    seed_fn: S,
    accumulator: F,
) -> Collect<T, C, E, F, S>
where
    F: Fn(&mut C, T) + Send + Sync + 'static,
    S: Fn() -> C + Send + Sync + 'static,
{
    Collect::new(upstream, seed_fn, accumulator)
}

/// `toList()`: accumulates every upstream item into a `Vec<T>`, emitted once
/// on `Complete`.
pub fn to_list<T, E>(
    upstream: Arc<dyn Source<T, E>>,
) -> Collect<T, Vec<T>, E, impl Fn(&mut Vec<T>, T) + Send + Sync + 'static, impl Fn() -> Vec<T> + Send + Sync + 'static>
where
    T: Send + Sync + 'static,
{
    collect(upstream, Vec::new, |acc: &mut Vec<T>, value: T| acc.push(value))
}

/// `toSet()`: accumulates into a `HashSet<T>`; duplicate items collapse.
pub fn to_set<T, E>(
    upstream: Arc<dyn Source<T, E>>,
) -> Collect<
    T,
    HashSet<T>,
    E,
    impl Fn(&mut HashSet<T>, T) + Send + Sync + 'static,
    impl Fn() -> HashSet<T> + Send + Sync + 'static,
>
where
    T: Eq + Hash + Send + Sync + 'static,
{
    collect(upstream, HashSet::new, |acc: &mut HashSet<T>, value: T| {
        acc.insert(value);
    })
}

/// `toMap(key_fn, value_fn)`: accumulates into a `HashMap<K, V>` keyed by
/// `key_fn`. spec.md leaves the collision policy for `groupBy`/keyed
/// aggregation unspecified; this operator documents its own choice: the
/// last item for a given key wins, matching `HashMap::insert`'s own
/// overwrite-on-collision semantics rather than silently dropping either
/// side.
pub fn to_map<T, K, V, E, KF, VF>(
    upstream: Arc<dyn Source<T, E>>,
    key_fn: KF,
    value_fn: VF,
) -> Collect<
    T,
    HashMap<K, V>,
    E,
    impl Fn(&mut HashMap<K, V>, T) + Send + Sync + 'static,
    impl Fn() -> HashMap<K, V> + Send + Sync + 'static,
>
where
    T: Send + Sync + 'static,
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    KF: Fn(&T) -> K + Send + Sync + 'static,
    VF: Fn(&T) -> V + Send + Sync + 'static,
{
    collect(upstream, HashMap::new, move |acc: &mut HashMap<K, V>, value: T| {
        let key = key_fn(&value);
        let val = value_fn(&value);
        acc.insert(key, val);
    })
}
