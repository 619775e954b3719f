//! `retry(n)` / `retryWhen(handler)`: re-subscribing to a failed source.

use std::sync::Arc;

use reactor_core::{BoxObserver, CompositeDisposable, Disposable, Observer, ReactorError, SerialDisposable, Source, guard_call};
use reactor_subjects::PublishSubject;

use crate::support::{Latch, composite_handle};

/// `retry(n)`: on error, re-subscribes the upstream up to `n` total attempts
/// (the first subscription counts as attempt 1). Downstream sees `Complete`
/// or the error from the final attempt.
pub struct Retry<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    max_attempts: u64,
}

impl<T, E> Retry<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, max_attempts: u64) -> Self {
        Self { upstream, max_attempts: max_attempts.max(1) }
    }
}

impl<T, E> Source<T, E> for Retry<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let shared = Arc::new(RetryShared {
            upstream: self.upstream.clone(),
            downstream,
            max_attempts: self.max_attempts,
            serial: SerialDisposable::new(),
        });
        shared.downstream.on_subscribe(shared.serial.as_disposable());
        shared.attempt(1);
    }
}

struct RetryShared<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    downstream: Arc<dyn Observer<T, E>>,
    max_attempts: u64,
    serial: SerialDisposable,
}

impl<T, E> RetryShared<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn attempt(self: &Arc<Self>, attempt_no: u64) {
        self.upstream.subscribe(Box::new(RetryObserver { shared: self.clone(), attempt_no }));
    }
}

struct RetryObserver<T, E> {
    shared: Arc<RetryShared<T, E>>,
    attempt_no: u64,
}

impl<T, E> Observer<T, E> for RetryObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.serial.replace(d);
    }
    fn on_next(&self, value: T) {
        self.shared.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        if self.attempt_no < self.shared.max_attempts {
            self.shared.attempt(self.attempt_no + 1);
        } else {
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        self.shared.downstream.on_complete();
    }
}

pub fn retry<T, E>(upstream: Arc<dyn Source<T, E>>, max_attempts: u64) -> Retry<T, E> {
    Retry::new(upstream, max_attempts)
}

/// `retryWhen(handler)`: errors are pushed into a dedicated error-notifier
/// subject; `handler` is invoked once (at subscribe time) with that subject
/// and must return a notifier source. Each value the notifier emits triggers
/// a fresh upstream subscription; the notifier completing completes
/// downstream; the notifier erroring surfaces that error downstream. A
/// panicking handler surfaces as an error.
pub struct RetryWhen<T, E, N, F> {
    upstream: Arc<dyn Source<T, E>>,
    handler: Arc<F>,
    _marker: std::marker::PhantomData<N>,
}

impl<T, E, N, F> RetryWhen<T, E, N, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, handler: F) -> Self {
        Self { upstream, handler: Arc::new(handler), _marker: std::marker::PhantomData }
    }
}

impl<T, E, N, F> Source<T, E> for RetryWhen<T, E, N, F>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
    N: Send + Sync + 'static,
    F: Fn(Arc<dyn Source<E, E>>) -> Arc<dyn Source<N, E>> + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let error_subject: PublishSubject<E, E> = PublishSubject::new();
        let handler = &self.handler;
        let notifier_subject = error_subject.clone();
        let notifier = match guard_call("retryWhen.handler_panicked", move || {
            handler(Arc::new(notifier_subject) as Arc<dyn Source<E, E>>)
        }) {
            Ok(notifier) => notifier,
            Err(e) => {
                downstream.on_subscribe(Disposable::disposed());
                downstream.on_error(e.into());
                return;
            }
        };

        let shared = Arc::new(RetryWhenShared {
            upstream: self.upstream.clone(),
            downstream,
            error_subject,
            serial: SerialDisposable::new(),
            notifier_disposable: SerialDisposable::new(),
            latch: Latch::new(),
        });

        let composite = CompositeDisposable::new();
        composite.add(shared.serial.as_disposable());
        composite.add(shared.notifier_disposable.as_disposable());
        shared.downstream.on_subscribe(composite_handle(&composite));

        notifier.subscribe(Box::new(NotifierObserver { shared: shared.clone(), _marker: std::marker::PhantomData }));
        shared.attempt();
    }
}

struct RetryWhenShared<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    downstream: Arc<dyn Observer<T, E>>,
    error_subject: PublishSubject<E, E>,
    serial: SerialDisposable,
    notifier_disposable: SerialDisposable,
    latch: Latch,
}

impl<T, E> RetryWhenShared<T, E>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn attempt(self: &Arc<Self>) {
        self.upstream.subscribe(Box::new(RetryWhenObserver { shared: self.clone() }));
    }

    fn finish_complete(&self) {
        if self.latch.try_close() {
            self.notifier_disposable.dispose();
            self.serial.dispose();
            self.downstream.on_complete();
        }
    }

    fn finish_error(&self, error: E) {
        if self.latch.try_close() {
            self.notifier_disposable.dispose();
            self.serial.dispose();
            self.downstream.on_error(error);
        }
    }
}

struct RetryWhenObserver<T, E> {
    shared: Arc<RetryWhenShared<T, E>>,
}

impl<T, E> Observer<T, E> for RetryWhenObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.serial.replace(d);
    }
    fn on_next(&self, value: T) {
        if self.shared.latch.is_closed() {
            return;
        }
        self.shared.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.is_closed() {
            return;
        }
        self.shared.error_subject.on_next(error);
    }
    fn on_complete(&self) {
        self.shared.finish_complete();
    }
}

struct NotifierObserver<T, E, N> {
    shared: Arc<RetryWhenShared<T, E>>,
    _marker: std::marker::PhantomData<N>,
}

impl<T, E, N> Observer<N, E> for NotifierObserver<T, E, N>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    N: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.notifier_disposable.replace(d);
    }
    fn on_next(&self, _value: N) {
        if self.shared.latch.is_closed() {
            return;
        }
        self.shared.attempt();
    }
    fn on_error(&self, error: E) {
        self.shared.finish_error(error);
    }
    fn on_complete(&self) {
        self.shared.finish_complete();
    }
}

pub fn retry_when<T, E, N, F>(upstream: Arc<dyn Source<T, E>>, handler: F) -> RetryWhen<T, E, N, F>
where
    F: Fn(Arc<dyn Source<E, E>>) -> Arc<dyn Source<N, E>> + Send + Sync + 'static,
{
    RetryWhen::new(upstream, handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::{error, just};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    /// A source that fails on its first two subscriptions, then succeeds
    /// with `42` on the third — the scenario named in the testable-properties
    /// boundary list.
    struct FlakySource {
        attempts: Arc<AtomicUsize>,
    }
    impl Source<i32, TestError> for FlakySource {
        fn subscribe(&self, observer: BoxObserver<i32, TestError>) {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                error(TestError(format!("attempt {n} failed"))).subscribe(observer);
            } else {
                just(vec![42]).subscribe(observer);
            }
        }
    }

    #[test]
    fn retry_succeeds_on_third_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn Source<i32, TestError>> = Arc::new(FlakySource { attempts: attempts.clone() });
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&retry(source, 3), obs);
        assert_eq!(*log.lock(), vec!["next:42", "complete"]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_surfaces_final_error_after_exhausting_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn Source<i32, TestError>> = Arc::new(FlakySource { attempts: attempts.clone() });
        let (log, obs) = recorder::<i32>();
        Source::<i32, TestError>::subscribe(&retry(source, 2), obs);
        assert_eq!(*log.lock(), vec!["error:attempt 2 failed"]);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_when_resubscribes_on_notifier_next_and_completes_on_notifier_complete() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn Source<i32, TestError>> = Arc::new(FlakySource { attempts: attempts.clone() });
        let (log, obs) = recorder();
        let op = retry_when(source, |errors: Arc<dyn Source<TestError, TestError>>| {
            Arc::new(crate::stateless::map(errors, |_cause| ())) as Arc<dyn Source<(), TestError>>
        });
        Source::<i32, TestError>::subscribe(&op, obs);
        assert_eq!(*log.lock(), vec!["next:42", "complete"]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
