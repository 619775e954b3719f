//! End-to-end scenarios from spec.md §8, driven entirely through the public
//! facade (`reactor::prelude` + `reactor_testkit`) rather than any single
//! sub-crate's internals — the integration-style coverage this crate's
//! dev-dependencies on `reactor-testkit`/`thiserror` exist for.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reactor::prelude::*;
use reactor_testkit::TestObserver;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

impl From<ReactorError> for TestError {
    fn from(e: ReactorError) -> Self {
        TestError(e.to_string())
    }
}

/// Scenario 1: `range(1,10) -> filter(even) -> map(x*10) -> take(3)`.
#[test]
fn filter_map_take_chain() {
    let observer = TestObserver::new();
    Stream::<i64, TestError>::range(1, 10)
        .filter(|x| x % 2 == 0)
        .map(|x| x * 10)
        .take(3)
        .subscribe(ObserverFromBox(observer.as_observer()));
    observer.assert_values(&[20, 40, 60]);
    observer.assert_complete();
}

/// Scenario 2: `groupBy(first_char)` over a fixed word list yields groups
/// keyed `a` (3 items), `b` (2 items), `c` (1 item), and each group's own
/// stream completes when the parent does.
#[test]
fn group_by_partitions_by_key_and_completes_each_group() {
    let words = vec!["apple", "apricot", "banana", "berry", "cherry", "avocado"];
    let groups = TestObserver::new();
    Stream::<&str, TestError>::just(words)
        .group_by(|w: &&str| w.chars().next().unwrap())
        .subscribe(ObserverFromBox(groups.as_observer()));
    groups.assert_complete();
    let seen = groups.values();
    assert_eq!(seen.len(), 3);

    let mut by_key = std::collections::HashMap::new();
    for grouped in &seen {
        let key = grouped.key();
        let inner = TestObserver::new();
        let group_source: Arc<dyn Source<&str, TestError>> = grouped.clone();
        Stream::from_source(group_source).subscribe(ObserverFromBox(inner.as_observer()));
        inner.assert_complete();
        by_key.insert(key, inner.value_count());
    }
    assert_eq!(by_key.get(&'a'), Some(&3));
    assert_eq!(by_key.get(&'b'), Some(&2));
    assert_eq!(by_key.get(&'c'), Some(&1));
}

/// Scenario 3: `range(1,10) -> buffer(3, skip=2)`.
#[test]
fn buffer_with_skip_overlaps_as_specified() {
    let observer = TestObserver::new();
    Stream::<i64, TestError>::range(1, 10)
        .buffer(3, 2)
        .subscribe(ObserverFromBox(observer.as_observer()));
    observer.assert_complete();
    observer.assert_values(&[
        vec![1, 2, 3],
        vec![3, 4, 5],
        vec![5, 6, 7],
        vec![7, 8, 9],
        vec![9, 10],
    ]);
}

/// Scenario 5: `refCount` connects on the first subscriber, stays connected
/// while a second is attached, disconnects once both release, and connects
/// afresh for a later subscriber.
#[test]
fn ref_count_connects_once_and_reconnects_after_drain() {
    let subscribe_count = Arc::new(AtomicUsize::new(0));
    let counted = subscribe_count.clone();
    let shared = Stream::<u64, TestError>::defer(move || {
        counted.fetch_add(1, Ordering::SeqCst);
        Arc::new(never()) as Arc<dyn Source<u64, TestError>>
    })
    .publish()
    .ref_count();

    let x = TestObserver::new();
    let dx = ObserverFromBox(x.as_observer());
    shared.clone().subscribe(dx);
    assert_eq!(subscribe_count.load(Ordering::SeqCst), 1);

    let y = TestObserver::new();
    shared.clone().subscribe(ObserverFromBox(y.as_observer()));
    assert_eq!(subscribe_count.load(Ordering::SeqCst), 1);

    x.dispose();
    assert_eq!(subscribe_count.load(Ordering::SeqCst), 1);
    y.dispose();

    let z = TestObserver::new();
    shared.subscribe(ObserverFromBox(z.as_observer()));
    assert_eq!(subscribe_count.load(Ordering::SeqCst), 2);
}

/// Scenario 4: debounce=200ms over A@0, B@50, C@100, idle until D@450,
/// complete@700 yields `[C, D]`.
#[test]
fn debounce_worked_example_via_virtual_clock() {
    let scheduler = TestScheduler::new();
    let scheduler_handle = Arc::new(scheduler.clone()) as Arc<dyn Scheduler>;
    let upstream = PublishSubject::<&str, TestError>::new();
    let observer = TestObserver::new();

    Stream::from_source(Arc::new(upstream.clone()))
        .debounce(Duration::from_millis(200), scheduler_handle)
        .subscribe(ObserverFromBox(observer.as_observer()));

    upstream.on_next("A");
    scheduler.advance_time_by(Duration::from_millis(50));
    upstream.on_next("B");
    scheduler.advance_time_by(Duration::from_millis(50));
    upstream.on_next("C");
    scheduler.advance_time_by(Duration::from_millis(300));
    upstream.on_next("D");
    scheduler.advance_time_by(Duration::from_millis(250));
    upstream.on_complete();

    observer.assert_values(&["C", "D"]);
    observer.assert_complete();
}

/// Scenario 7: a source failing on attempts 1 and 2, succeeding with `42` on
/// attempt 3, and `retry(3)`.
#[test]
fn retry_recovers_after_transient_failures() {
    struct Flaky {
        attempts: Arc<AtomicUsize>,
    }
    impl Source<i32, TestError> for Flaky {
        fn subscribe(&self, observer: BoxObserver<i32, TestError>) {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                error(TestError(format!("attempt {n} failed"))).subscribe(observer);
            } else {
                just(vec![42]).subscribe(observer);
            }
        }
    }

    let attempts = Arc::new(AtomicUsize::new(0));
    let source = Stream::from_source(Arc::new(Flaky { attempts: attempts.clone() }) as Arc<dyn Source<i32, TestError>>);
    let observer = TestObserver::new();
    source.retry(3).subscribe(ObserverFromBox(observer.as_observer()));

    observer.assert_values(&[42]);
    observer.assert_complete();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// Scenario 8: `zip([1..5], [a,b], pair)` yields `[(1,a),(2,b)]` then
/// `Complete`.
#[test]
fn zip_truncates_to_the_shorter_source() {
    let observer = TestObserver::new();
    Stream::<i64, TestError>::just(vec![1, 2, 3, 4, 5])
        .zip_with(Stream::<&str, TestError>::just(vec!["a", "b"]), |n, s| (n, s))
        .subscribe(ObserverFromBox(observer.as_observer()));
    observer.assert_values(&[(1, "a"), (2, "b")]);
    observer.assert_complete();
}

/// A thin `Observer` wrapper so `TestObserver::as_observer`'s `BoxObserver`
/// can be handed to `Stream::subscribe`, which takes `impl Observer<T, E>`
/// rather than an already-boxed one.
struct ObserverFromBox<T, E>(BoxObserver<T, E>);

impl<T, E> Observer<T, E> for ObserverFromBox<T, E> {
    fn on_subscribe(&self, d: Disposable) {
        self.0.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        self.0.on_next(value);
    }
    fn on_error(&self, error: E) {
        self.0.on_error(error);
    }
    fn on_complete(&self) {
        self.0.on_complete();
    }
}
