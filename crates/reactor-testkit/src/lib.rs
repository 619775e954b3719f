//! Test-only `Observer` that records every signal delivered to it, plus
//! assertion helpers over the recorded log — the `TestObserver` named in
//! the testing-support surface — and a re-export of
//! [`reactor_scheduler::TestScheduler`] so a test only needs to depend on
//! this one crate for deterministic virtual-time scheduling too.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer};

pub use reactor_scheduler::TestScheduler;

struct State<T, E> {
    values: Vec<T>,
    error: Option<E>,
    completed: bool,
    disposable: Option<Disposable>,
}

/// Subscribe via [`TestObserver::as_observer`], then assert over the
/// recorded log with `assert_values`/`assert_complete`/`assert_error`/
/// `assert_no_errors`, or tear the subscription down early with
/// [`TestObserver::dispose`].
pub struct TestObserver<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> TestObserver<T, E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                values: Vec::new(),
                error: None,
                completed: false,
                disposable: None,
            }),
        })
    }

    /// Boxes an `Observer` that forwards every signal into this recorder.
    /// Kept separate from subscribing directly so the same `TestObserver`
    /// can be inspected from the test after `subscribe` returns.
    pub fn as_observer(self: &Arc<Self>) -> BoxObserver<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        Box::new(Forwarding { target: self.clone() })
    }

    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.state.lock().values.clone()
    }

    pub fn value_count(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().completed
    }

    pub fn error(&self) -> Option<E>
    where
        E: Clone,
    {
        self.state.lock().error.clone()
    }

    /// Disposes the subscription this observer is attached to, if any
    /// (set the first time `on_subscribe` runs).
    pub fn dispose(&self) {
        if let Some(d) = self.state.lock().disposable.take() {
            d.dispose();
        }
    }

    pub fn assert_values(&self, expected: &[T])
    where
        T: Clone + fmt::Debug + PartialEq,
    {
        let actual = self.state.lock().values.clone();
        assert_eq!(actual, expected, "observed values did not match expectation");
    }

    pub fn assert_value_count(&self, expected: usize) {
        let actual = self.state.lock().values.len();
        assert_eq!(actual, expected, "observed value count did not match expectation");
    }

    pub fn assert_complete(&self) {
        assert!(self.state.lock().completed, "observer did not receive Complete");
    }

    pub fn assert_not_complete(&self) {
        assert!(!self.state.lock().completed, "observer unexpectedly received Complete");
    }

    pub fn assert_no_errors(&self) {
        assert!(self.state.lock().error.is_none(), "observer unexpectedly received an Error");
    }

    /// Matches the external surface's `assertError(class|predicate)`: a
    /// predicate over the recorded error rather than a separate
    /// class-matching overload, since Rust has no runtime `Class` to match
    /// against — `assert_error(|e| matches!(e, MyError::Timeout))` covers
    /// the same ground as a type check would.
    pub fn assert_error(&self, predicate: impl FnOnce(&E) -> bool)
    where
        E: fmt::Debug,
    {
        let guard = self.state.lock();
        match &guard.error {
            Some(e) => assert!(predicate(e), "observed error {e:?} did not match predicate"),
            None => panic!("observer did not receive an Error"),
        }
    }
}

struct Forwarding<T, E> {
    target: Arc<TestObserver<T, E>>,
}

impl<T, E> Observer<T, E> for Forwarding<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.target.state.lock().disposable = Some(d);
    }

    fn on_next(&self, value: T) {
        self.target.state.lock().values.push(value);
    }

    fn on_error(&self, error: E) {
        self.target.state.lock().error = Some(error);
    }

    fn on_complete(&self) {
        self.target.state.lock().completed = true;
    }
}

pub mod prelude {
    pub use crate::{TestObserver, TestScheduler};
}

#[cfg(test)]
mod tests {
    use super::*;
    use reactor_core::Source;
    use reactor_operators::{filter, just, map};
    use std::sync::Arc as StdArc;

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);
    impl From<reactor_core::ReactorError> for TestError {
        fn from(e: reactor_core::ReactorError) -> Self {
            TestError(e.to_string())
        }
    }

    #[test]
    fn records_values_and_completion() {
        let upstream: StdArc<dyn Source<i32, TestError>> = StdArc::new(just(vec![1, 2, 3]));
        let chain = map(filter(upstream, |v: &i32| *v % 2 == 1), |v: i32| v * 10);
        let observer = TestObserver::new();
        chain.subscribe(observer.as_observer());
        observer.assert_values(&[10, 30]);
        observer.assert_complete();
        observer.assert_no_errors();
    }

    #[test]
    fn records_error_and_matches_predicate() {
        let upstream: StdArc<dyn Source<i32, TestError>> =
            StdArc::new(reactor_operators::error(TestError("boom".into())));
        let observer = TestObserver::new();
        upstream.subscribe(observer.as_observer());
        observer.assert_not_complete();
        observer.assert_error(|e| e.0 == "boom");
    }

    #[test]
    fn dispose_tears_down_the_subscription() {
        let scheduler = StdArc::new(TestScheduler::new()) as StdArc<dyn reactor_scheduler::Scheduler>;
        let upstream: StdArc<dyn Source<u64, TestError>> =
            StdArc::new(reactor_operators::interval(std::time::Duration::from_millis(10), scheduler));
        let observer = TestObserver::new();
        upstream.subscribe(observer.as_observer());
        observer.dispose();
        observer.assert_value_count(0);
    }
}
