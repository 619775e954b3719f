//! `onErrorReturn(fn)` / `onErrorResumeNext(fn)`: recovering from an upstream
//! error instead of letting it reach the subscriber.

use std::sync::Arc;

use reactor_core::{BoxObserver, Disposable, Observer, ReactorError, SerialDisposable, Source, guard_call};

use crate::support::Latch;

/// `onErrorReturn(fn)`: on error, emits `fn(cause)` then completes, instead
/// of surfacing the error.
pub struct OnErrorReturn<T, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    fallback: Arc<F>,
}

impl<T, E, F> OnErrorReturn<T, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, fallback: F) -> Self {
        Self { upstream, fallback: Arc::new(fallback) }
    }
}

impl<T, E, F> Source<T, E> for OnErrorReturn<T, E, F>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(&E) -> T + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.upstream.subscribe(Box::new(OnErrorReturnObserver {
            downstream: observer,
            fallback: self.fallback.clone(),
            latch: Latch::new(),
        }));
    }
}

struct OnErrorReturnObserver<T, E, F> {
    downstream: BoxObserver<T, E>,
    fallback: Arc<F>,
    latch: Latch,
}

impl<T, E, F> Observer<T, E> for OnErrorReturnObserver<T, E, F>
where
    F: Fn(&E) -> T + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        if !self.latch.try_close() {
            return;
        }
        let fallback = &self.fallback;
        match guard_call("onErrorReturn.fallback_panicked", || fallback(&error)) {
            Ok(value) => {
                self.downstream.on_next(value);
                self.downstream.on_complete();
            }
            Err(e) => self.downstream.on_error(e.into()),
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_complete();
        }
    }
}

pub fn on_error_return<T, E, F>(upstream: Arc<dyn Source<T, E>>, fallback: F) -> OnErrorReturn<T, E, F>
where
    F: Fn(&E) -> T + Send + Sync + 'static,
{
    OnErrorReturn::new(upstream, fallback)
}

/// `onErrorResumeNext(fn)`: on error, subscribes `fn(cause)` in place of the
/// failed source instead of surfacing the error.
pub struct OnErrorResumeNext<T, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    resume: Arc<F>,
}

impl<T, E, F> OnErrorResumeNext<T, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, resume: F) -> Self {
        Self { upstream, resume: Arc::new(resume) }
    }
}

impl<T, E, F> Source<T, E> for OnErrorResumeNext<T, E, F>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(&E) -> Arc<dyn Source<T, E>> + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let serial = SerialDisposable::new();
        downstream.on_subscribe(serial.as_disposable());
        self.upstream.subscribe(Box::new(OnErrorResumeNextObserver {
            downstream,
            resume: self.resume.clone(),
            serial,
            latch: Arc::new(Latch::new()),
        }));
    }
}

struct OnErrorResumeNextObserver<T, E, F> {
    downstream: Arc<dyn Observer<T, E>>,
    resume: Arc<F>,
    serial: SerialDisposable,
    latch: Arc<Latch>,
}

impl<T, E, F> Observer<T, E> for OnErrorResumeNextObserver<T, E, F>
where
    T: Send + Sync + 'static,
    F: Fn(&E) -> Arc<dyn Source<T, E>> + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.serial.replace(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        self.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        if self.latch.is_closed() {
            return;
        }
        let resume = &self.resume;
        match guard_call("onErrorResumeNext.resume_panicked", || resume(&error)) {
            Ok(fallback) => fallback.subscribe(Box::new(ResumeObserver {
                downstream: self.downstream.clone(),
                serial: self.serial.clone(),
                latch: self.latch.clone(),
            })),
            Err(e) => {
                if self.latch.try_close() {
                    self.downstream.on_error(e.into());
                }
            }
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.downstream.on_complete();
        }
    }
}

struct ResumeObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
    latch: Arc<Latch>,
}

impl<T, E> Observer<T, E> for ResumeObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.serial.replace(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        self.downstream.on_next(value);
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

pub fn on_error_resume_next<T, E, F>(upstream: Arc<dyn Source<T, E>>, resume: F) -> OnErrorResumeNext<T, E, F>
where
    F: Fn(&E) -> Arc<dyn Source<T, E>> + Send + Sync + 'static,
{
    OnErrorResumeNext::new(upstream, resume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::{error, just};
    use parking_lot::Mutex;

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

    #[test]
    fn on_error_return_substitutes_a_value_then_completes() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(error(TestError("boom".into())));
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&on_error_return(upstream, |_cause: &TestError| -1), obs);
        assert_eq!(*log.lock(), vec!["next:-1", "complete"]);
    }

    #[test]
    fn on_error_return_passes_through_a_successful_stream() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(just(vec![1, 2]));
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&on_error_return(upstream, |_cause: &TestError| -1), obs);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "complete"]);
    }

    #[test]
    fn on_error_resume_next_switches_to_fallback_source() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(error(TestError("boom".into())));
        let (log, obs) = recorder();
        let op = on_error_resume_next(upstream, |_cause: &TestError| Arc::new(just(vec![9, 8])) as Arc<dyn Source<i32, TestError>>);
        Source::<i32, TestError>::subscribe(&op, obs);
        assert_eq!(*log.lock(), vec!["next:9", "next:8", "complete"]);
    }
}
