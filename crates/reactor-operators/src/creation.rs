//! Creation primitives: sources with no upstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use reactor_core::{BoxObserver, Disposable, Observer, ReactorError, SerialDisposable, Source};
use reactor_scheduler::Scheduler;

use crate::support::Latch;

/// `just(v...)`: emits each value in order, synchronously, then completes.
pub struct Just<T> {
    values: Arc<Vec<T>>,
}

impl<T: Clone + Send + Sync + 'static> Just<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values: Arc::new(values) }
    }
}

impl<T, E> Source<T, E> for Just<T>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        observer.on_subscribe(Disposable::disposed());
        for v in self.values.iter() {
            observer.on_next(v.clone());
        }
        observer.on_complete();
    }
}

pub fn just<T: Clone + Send + Sync + 'static>(values: impl Into<Vec<T>>) -> Just<T> {
    Just::new(values.into())
}

/// `range(start, count)`: emits `start..start+count-1`, then completes.
pub struct Range {
    start: i64,
    count: u64,
}

impl Range {
    pub fn new(start: i64, count: u64) -> Self {
        Self { start, count }
    }
}

impl<E: Send + Sync + 'static> Source<i64, E> for Range {
    fn subscribe(&self, observer: BoxObserver<i64, E>) {
        observer.on_subscribe(Disposable::disposed());
        for i in 0..self.count {
            observer.on_next(self.start + i as i64);
        }
        observer.on_complete();
    }
}

pub fn range(start: i64, count: u64) -> Range {
    Range::new(start, count)
}

/// `from_sequence(seq)`: iterates a finite, possibly-fallible sequence built
/// fresh per subscription (cold) via `factory`; on iteration failure emits
/// the carried error instead of completing.
pub struct FromSequence<T, E> {
    factory: Arc<dyn Fn() -> Box<dyn Iterator<Item = Result<T, E>> + Send> + Send + Sync>,
}

impl<T, E> FromSequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(
        factory: impl Fn() -> Box<dyn Iterator<Item = Result<T, E>> + Send> + Send + Sync + 'static,
    ) -> Self {
        Self { factory: Arc::new(factory) }
    }
}

impl<T, E> Source<T, E> for FromSequence<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        observer.on_subscribe(Disposable::disposed());
        for item in (self.factory)() {
            match item {
                Ok(value) => observer.on_next(value),
                Err(error) => {
                    observer.on_error(error);
                    return;
                }
            }
        }
        observer.on_complete();
    }
}

pub fn from_sequence<T, E>(
    factory: impl Fn() -> Box<dyn Iterator<Item = Result<T, E>> + Send> + Send + Sync + 'static,
) -> FromSequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    FromSequence::new(factory)
}

/// Convenience over [`from_sequence`] for an infallible iterable.
pub fn from_iter<T, E, I>(factory: impl Fn() -> I + Send + Sync + 'static) -> FromSequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    I: IntoIterator<Item = T> + 'static,
    I::IntoIter: Send,
{
    FromSequence::new(move || Box::new(factory().into_iter().map(Ok)) as Box<dyn Iterator<Item = Result<T, E>> + Send>)
}

/// `empty()`: emits only `Complete`.
pub struct Empty;

impl<T, E> Source<T, E> for Empty
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        observer.on_subscribe(Disposable::disposed());
        observer.on_complete();
    }
}

pub fn empty() -> Empty {
    Empty
}

/// `error(e)`: emits only `Error(e)`.
pub struct ErrorSource<E> {
    error: E,
}

impl<E: Clone + Send + Sync + 'static> ErrorSource<E> {
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<T, E> Source<T, E> for ErrorSource<E>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        observer.on_subscribe(Disposable::disposed());
        observer.on_error(self.error.clone());
    }
}

pub fn error<E: Clone + Send + Sync + 'static>(e: E) -> ErrorSource<E> {
    ErrorSource::new(e)
}

/// `never()`: emits nothing and never completes.
pub struct Never;

impl<T, E> Source<T, E> for Never
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        observer.on_subscribe(Disposable::empty());
    }
}

pub fn never() -> Never {
    Never
}

/// Handed to a [`create`] producer closure; the producer calls `on_next`/
/// `on_error`/`on_complete` (from any thread, any number of times — a
/// terminal-after-terminal call is reported to the process-wide sink rather
/// than forwarded) and may register a resource via `set_disposable` so
/// downstream disposal tears it down.
pub struct Emitter<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    terminal: Arc<Latch>,
    disposed: Arc<AtomicBool>,
    resource: SerialDisposable,
}

impl<T, E> Emitter<T, E> {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.terminal.is_closed()
    }

    pub fn set_disposable(&self, resource: Disposable) {
        self.resource.replace(resource);
    }

    pub fn on_next(&self, value: T) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if self.terminal.is_closed() {
            crate::support::report_undeliverable("onNext delivered to create() emitter after terminal");
            return;
        }
        self.downstream.on_next(value);
    }

    pub fn on_error(&self, error: E) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if self.terminal.try_close() {
            self.downstream.on_error(error);
        } else {
            crate::support::report_undeliverable("onError delivered to create() emitter after terminal");
        }
    }

    pub fn on_complete(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if self.terminal.try_close() {
            self.downstream.on_complete();
        }
    }
}

/// `create(emitter_fn)`: user code drives an [`Emitter`]. Runs fresh per
/// subscription, matching the cold contract every other creation primitive
/// here upholds.
pub struct Create<T, E> {
    producer: Arc<dyn Fn(Emitter<T, E>) + Send + Sync>,
}

impl<T, E> Create<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(producer: impl Fn(Emitter<T, E>) + Send + Sync + 'static) -> Self {
        Self { producer: Arc::new(producer) }
    }
}

impl<T, E> Source<T, E> for Create<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let disposed = Arc::new(AtomicBool::new(false));
        let resource = SerialDisposable::new();
        let terminal = Arc::new(Latch::new());

        let disposed_for_handle = disposed.clone();
        let resource_for_handle = resource.clone();
        downstream.on_subscribe(Disposable::new(move || {
            disposed_for_handle.store(true, Ordering::Release);
            resource_for_handle.dispose();
        }));

        let emitter = Emitter { downstream, terminal, disposed, resource };
        (self.producer)(emitter);
    }
}

pub fn create<T, E>(producer: impl Fn(Emitter<T, E>) + Send + Sync + 'static) -> Create<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Create::new(producer)
}

/// `defer(factory)`: re-invokes `factory` for every subscription, giving
/// each observer an independent upstream source.
pub struct Defer<T, E> {
    factory: Arc<dyn Fn() -> Arc<dyn Source<T, E>> + Send + Sync>,
}

impl<T, E> Defer<T, E> {
    pub fn new(factory: impl Fn() -> Arc<dyn Source<T, E>> + Send + Sync + 'static) -> Self {
        Self { factory: Arc::new(factory) }
    }
}

impl<T, E> Source<T, E> for Defer<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        (self.factory)().subscribe(observer);
    }
}

pub fn defer<T, E>(factory: impl Fn() -> Arc<dyn Source<T, E>> + Send + Sync + 'static) -> Defer<T, E> {
    Defer::new(factory)
}

/// `interval(period, scheduler)`: an increasing tick counter on a worker;
/// disposing cancels the periodic task.
pub struct Interval {
    period: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl Interval {
    pub fn new(period: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { period, scheduler }
    }
}

impl<E> Source<u64, E> for Interval
where
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<u64, E>) {
        let observer: Arc<dyn Observer<u64, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let counter = Arc::new(AtomicU64::new(0));
        let obs = observer.clone();
        match worker.schedule_periodic(
            Arc::new(move || {
                let tick = counter.fetch_add(1, Ordering::AcqRel);
                obs.on_next(tick);
            }),
            self.period,
            self.period,
        ) {
            Ok(disposable) => observer.on_subscribe(disposable),
            Err(err) => {
                observer.on_subscribe(Disposable::disposed());
                observer.on_error(err.into());
            }
        }
    }
}

pub fn interval(period: Duration, scheduler: Arc<dyn Scheduler>) -> Interval {
    Interval::new(period, scheduler)
}

/// `timer(delay, scheduler)`: emits a single tick after `delay`, then completes.
pub struct Timer {
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl Timer {
    pub fn new(delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { delay, scheduler }
    }
}

impl<E> Source<u64, E> for Timer
where
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<u64, E>) {
        let observer: Arc<dyn Observer<u64, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let obs = observer.clone();
        match worker.schedule_after(
            Box::new(move || {
                obs.on_next(0);
                obs.on_complete();
            }),
            self.delay,
        ) {
            Ok(disposable) => observer.on_subscribe(disposable),
            Err(err) => {
                observer.on_subscribe(Disposable::disposed());
                observer.on_error(err.into());
            }
        }
    }
}

pub fn timer(delay: Duration, scheduler: Arc<dyn Scheduler>) -> Timer {
    Timer::new(delay, scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use reactor_scheduler::TestScheduler;

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
    fn just_emits_in_order_then_completes() {
        let (log, obs) = recorder();
        just(vec![1, 2, 3]).subscribe(obs as BoxObserver<i32, TestError>);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "next:3", "complete"]);
    }

    #[test]
    fn range_emits_start_through_start_plus_count_minus_one() {
        let (log, obs) = recorder();
        Source::<i64, TestError>::subscribe(&range(5, 3), obs);
        assert_eq!(*log.lock(), vec!["next:5", "next:6", "next:7", "complete"]);
    }

    #[test]
    fn empty_emits_only_complete() {
        let (log, obs) = recorder::<i32>();
        Source::<i32, TestError>::subscribe(&empty(), obs);
        assert_eq!(*log.lock(), vec!["complete"]);
    }

    #[test]
    fn error_emits_only_error() {
        let (log, obs) = recorder::<i32>();
        Source::<i32, TestError>::subscribe(&error(TestError("boom".into())), obs);
        assert_eq!(*log.lock(), vec!["error:boom"]);
    }

    #[test]
    fn from_sequence_surfaces_mid_iteration_failure() {
        let source = from_sequence::<i32, TestError>(|| {
            Box::new(vec![Ok(1), Ok(2), Err(TestError("bad".into()))].into_iter())
        });
        let (log, obs) = recorder();
        source.subscribe(obs as BoxObserver<i32, TestError>);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "error:bad"]);
    }

    #[test]
    fn create_forwards_signals_and_honors_dispose() {
        let (log, obs) = recorder();
        let source = create::<i32, TestError>(|emitter| {
            emitter.on_next(1);
            emitter.on_next(2);
            emitter.on_complete();
            emitter.on_complete();
        });
        source.subscribe(obs as BoxObserver<i32, TestError>);
        assert_eq!(*log.lock(), vec!["next:1", "next:2", "complete"]);
    }

    #[test]
    fn defer_invokes_factory_once_per_subscription() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        let source = defer::<i32, TestError>(move || {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Arc::new(just(vec![1])) as Arc<dyn Source<i32, TestError>>
        });
        let (log1, obs1) = recorder();
        source.subscribe(obs1 as BoxObserver<i32, TestError>);
        let (log2, obs2) = recorder();
        source.subscribe(obs2 as BoxObserver<i32, TestError>);
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(*log1.lock(), vec!["next:1", "complete"]);
        assert_eq!(*log2.lock(), vec!["next:1", "complete"]);
    }

    #[test]
    fn interval_ticks_on_virtual_clock_and_stops_on_dispose() {
        let scheduler = TestScheduler::new();
        let (log, obs) = recorder::<u64>();
        let source = interval(Duration::from_millis(10), Arc::new(scheduler.clone()) as Arc<dyn Scheduler>);
        struct Capture(Box<Recorder<u64>>, Arc<Mutex<Option<Disposable>>>);
        impl Observer<u64, TestError> for Capture {
            fn on_subscribe(&self, d: Disposable) {
                *self.1.lock() = Some(d.clone());
                self.0.on_subscribe(d);
            }
            fn on_next(&self, value: u64) {
                self.0.on_next(value);
            }
            fn on_error(&self, error: TestError) {
                self.0.on_error(error);
            }
            fn on_complete(&self) {
                self.0.on_complete();
            }
        }
        let handle_slot = Arc::new(Mutex::new(None));
        source.subscribe(Box::new(Capture(obs, handle_slot.clone())));
        scheduler.advance_time_by(Duration::from_millis(35));
        assert_eq!(*log.lock(), vec!["next:0", "next:1", "next:2"]);
        handle_slot.lock().as_ref().unwrap().dispose();
        scheduler.advance_time_by(Duration::from_millis(50));
        assert_eq!(*log.lock(), vec!["next:0", "next:1", "next:2"]);
    }

    #[test]
    fn timer_emits_a_single_tick_then_completes() {
        let scheduler = TestScheduler::new();
        let (log, obs) = recorder::<u64>();
        let source = timer(Duration::from_millis(10), Arc::new(scheduler.clone()) as Arc<dyn Scheduler>);
        source.subscribe(obs as BoxObserver<u64, TestError>);
        scheduler.advance_time_by(Duration::from_millis(10));
        assert_eq!(*log.lock(), vec!["next:0", "complete"]);
    }
}
