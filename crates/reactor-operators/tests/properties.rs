//! Property-based tests for the round-trip laws and quantified invariants
//! named in spec section 8 ("Testable Properties"). Mirrors the teacher's
//! own use of `proptest` for state-machine/contract properties in
//! `spark-core/tests/state_machine_properties.rs`, applied here to the
//! reactive-stream contract instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use reactor_core::ReactorError;
use reactor_operators::Stream;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

impl From<ReactorError> for TestError {
    fn from(e: ReactorError) -> Self {
        TestError(e.to_string())
    }
}

fn collect<T: Clone + Send + Sync + 'static>(stream: Stream<T, TestError>) -> Vec<T> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let l = log.clone();
    stream.subscribe_with(move |v| l.lock().push(v), |_| {}, || {});
    log.lock().clone()
}

proptest! {
    /// `map(f).map(g) ≡ map(g∘f)` (spec.md §8, round-trip laws).
    #[test]
    fn map_fusion_matches_composed_map(values in prop::collection::vec(-1000i64..1000, 0..50)) {
        let f = |x: i64| x.wrapping_mul(3).wrapping_add(1);
        let g = |x: i64| x.wrapping_sub(7);

        let chained = collect(
            Stream::<i64, TestError>::just(values.clone()).map(f).map(g),
        );
        let fused = collect(Stream::<i64, TestError>::just(values).map(move |x| g(f(x))));

        prop_assert_eq!(chained, fused);
    }

    /// `take(n).take(m) ≡ take(min(n,m))` (spec.md §8, round-trip laws).
    #[test]
    fn take_take_matches_take_min(
        values in prop::collection::vec(0i64..100, 0..30),
        n in 0u64..15,
        m in 0u64..15,
    ) {
        let chained = collect(Stream::<i64, TestError>::just(values.clone()).take(n).take(m));
        let minimal = collect(Stream::<i64, TestError>::just(values).take(n.min(m)));

        prop_assert_eq!(chained, minimal);
    }

    /// `zip(s1, s2)`'s k-th emission is `zipper(s1.nth(k), s2.nth(k))`;
    /// length equals `min(|s1|, |s2|)` at terminal (spec.md §8, item 7).
    #[test]
    fn zip_pairs_by_position_and_truncates_to_shorter(
        left in prop::collection::vec(0i64..50, 0..20),
        right in prop::collection::vec(0i64..50, 0..20),
    ) {
        let expected: Vec<(i64, i64)> = left.iter().copied().zip(right.iter().copied()).collect();

        let zipped = collect(
            Stream::<i64, TestError>::just(left)
                .zip_with(Stream::<i64, TestError>::just(right), |a, b| (a, b)),
        );

        prop_assert_eq!(zipped, expected);
    }

    /// `skip(n)` on a source shorter than `n` emits only `Complete`
    /// (spec.md §8, boundary behaviors).
    #[test]
    fn skip_past_end_of_short_source_emits_nothing(
        values in prop::collection::vec(0i64..20, 0..10),
        extra in 1u64..10,
    ) {
        let n = values.len() as u64 + extra;
        let remaining = collect(Stream::<i64, TestError>::just(values).skip(n));
        prop_assert!(remaining.is_empty());
    }

    /// `filter` never forwards a value the predicate rejects, and forwards
    /// every value it accepts, in upstream order.
    #[test]
    fn filter_matches_iterator_filter(
        values in prop::collection::vec(-50i64..50, 0..40),
    ) {
        let predicate = |x: &i64| *x % 3 == 0;
        let filtered = collect(Stream::<i64, TestError>::just(values.clone()).filter(predicate));
        let expected: Vec<i64> = values.into_iter().filter(predicate).collect();
        prop_assert_eq!(filtered, expected);
    }
}

/// `subject → subscribe A, B; onNext(x); observed_A ≡ observed_B` for a
/// `Publish` subject, restricted to values emitted after both subscribed
/// (spec.md §8, round-trip laws).
#[test]
fn publish_subject_broadcasts_identically_to_concurrent_subscribers() {
    use reactor_subjects::PublishSubject;

    let subject: PublishSubject<i64, TestError> = PublishSubject::new();
    let a = Arc::new(Mutex::new(Vec::new()));
    let b = Arc::new(Mutex::new(Vec::new()));
    let (a1, b1) = (a.clone(), b.clone());

    Stream::from_source(Arc::new(subject.clone())).subscribe_with(
        move |v| a1.lock().push(v),
        |_| {},
        || {},
    );
    Stream::from_source(Arc::new(subject.clone())).subscribe_with(
        move |v| b1.lock().push(v),
        |_| {},
        || {},
    );

    for x in [1, 2, 3] {
        subject.on_next(x);
    }
    subject.on_complete();

    assert_eq!(*a.lock(), vec![1, 2, 3]);
    assert_eq!(*b.lock(), vec![1, 2, 3]);
}

/// `count` over an empty source is `0`; `isEmpty`/`any`/`contains` boundary
/// values (spec.md §8, boundary behaviors).
#[test]
fn empty_source_boundary_aggregates() {
    let count = collect(Stream::<i64, TestError>::empty().count());
    assert_eq!(count, vec![0]);

    let is_empty = collect(Stream::<i64, TestError>::empty().is_empty());
    assert_eq!(is_empty, vec![true]);

    let any = collect(Stream::<i64, TestError>::empty().any(|_| true));
    assert_eq!(any, vec![false]);

    let all = collect(Stream::<i64, TestError>::empty().all(|_| false));
    assert_eq!(all, vec![true]);
}

/// `take(0)` emits only `Complete` (spec.md §8, boundary behaviors).
#[test]
fn take_zero_emits_only_complete() {
    let completed = Arc::new(AtomicU64::new(0));
    let c = completed.clone();
    let values = Arc::new(Mutex::new(Vec::new()));
    let v = values.clone();
    Stream::<i64, TestError>::just(vec![1, 2, 3]).take(0).subscribe_with(
        move |x| v.lock().push(x),
        |_| {},
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
    );
    assert!(values.lock().is_empty());
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}
