//! Stateful accumulation and chunking: `scan`, `reduce`, `buffer`, `window`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reactor_core::{BoxObserver, Disposable, Observer, ReactorError, Source, guard_call};
use reactor_scheduler::Scheduler;
use reactor_subjects::PublishSubject;

use crate::support::Latch;

/// `scan(seed, accumulator)`: emits the running accumulation after every item
/// (unlike `reduce`, which emits only the final value).
pub struct Scan<T, U, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    seed: U,
    accumulator: Arc<F>,
}

impl<T, U: Clone, E, F> Scan<T, U, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, seed: U, accumulator: F) -> Self {
        Self { upstream, seed, accumulator: Arc::new(accumulator) }
    }
}

impl<T, U, E, F> Source<U, E> for Scan<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        self.upstream.subscribe(Box::new(ScanObserver {
            downstream: observer,
            accumulator: self.accumulator.clone(),
            state: Mutex::new(self.seed.clone()),
            latch: Latch::new(),
        }));
    }
}

struct ScanObserver<T, U, E, F> {
    downstream: BoxObserver<U, E>,
    accumulator: Arc<F>,
    state: Mutex<U>,
    latch: Latch,
}

impl<T, U, E, F> Observer<T, E> for ScanObserver<T, U, E, F>
where
    U: Clone + Send + Sync + 'static,
    F: Fn(U, T) -> U + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let mut state = self.state.lock();
        let current = state.clone();
        let accumulator = &self.accumulator;
        match guard_call("scan.accumulator_panicked", move || accumulator(current, value)) {
            Ok(next) => {
                *state = next.clone();
                drop(state);
                self.downstream.on_next(next);
            }
            Err(e) => {
                drop(state);
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

pub fn scan<T, U, E, F>(upstream: Arc<dyn Source<T, E>>, seed: U, accumulator: F) -> Scan<T, U, E, F>
where
    U: Clone,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    Scan::new(upstream, seed, accumulator)
}

/// `reduce(seed, accumulator)`: emits only the final accumulation, on complete.
pub struct Reduce<T, U, E, F> {
    upstream: Arc<dyn Source<T, E>>,
    seed: U,
    accumulator: Arc<F>,
}

impl<T, U: Clone, E, F> Reduce<T, U, E, F> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, seed: U, accumulator: F) -> Self {
        Self { upstream, seed, accumulator: Arc::new(accumulator) }
    }
}

impl<T, U, E, F> Source<U, E> for Reduce<T, U, E, F>
where
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<U, E>) {
        self.upstream.subscribe(Box::new(ReduceObserver {
            downstream: observer,
            accumulator: self.accumulator.clone(),
            state: Mutex::new(self.seed.clone()),
            latch: Latch::new(),
        }));
    }
}

struct ReduceObserver<T, U, E, F> {
    downstream: BoxObserver<U, E>,
    accumulator: Arc<F>,
    state: Mutex<U>,
    latch: Latch,
}

impl<T, U, E, F> Observer<T, E> for ReduceObserver<T, U, E, F>
where
    U: Clone + Send + Sync + 'static,
    F: Fn(U, T) -> U + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let mut state = self.state.lock();
        let current = state.clone();
        let accumulator = &self.accumulator;
        match guard_call("reduce.accumulator_panicked", move || accumulator(current, value)) {
            Ok(next) => *state = next,
            Err(e) => {
                drop(state);
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
            self.downstream.on_next(self.state.lock().clone());
            self.downstream.on_complete();
        }
    }
}

pub fn reduce<T, U, E, F>(upstream: Arc<dyn Source<T, E>>, seed: U, accumulator: F) -> Reduce<T, U, E, F>
where
    U: Clone,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    Reduce::new(upstream, seed, accumulator)
}

/// `buffer(count, skip)`: collects items into `Vec`s of up to `count`
/// elements, opening a new buffer every `skip` items (`skip == count` gives
/// non-overlapping chunks, `skip < count` overlapping windows, `skip > count`
/// drops the items between chunks). The final partial buffer, if non-empty,
/// is emitted before completion.
pub struct Buffer<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    count: usize,
    skip: usize,
}

impl<T, E> Buffer<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, count: usize, skip: usize) -> Self {
        Self { upstream, count: count.max(1), skip: skip.max(1) }
    }
}

impl<T, E> Source<Vec<T>, E> for Buffer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<Vec<T>, E>) {
        self.upstream.subscribe(Box::new(BufferObserver {
            downstream: observer,
            count: self.count,
            skip: self.skip,
            state: Mutex::new(BufferState { active: VecDeque::new(), index: 0 }),
        }));
    }
}

struct BufferState<T> {
    active: VecDeque<Vec<T>>,
    index: u64,
}

struct BufferObserver<T, E> {
    downstream: BoxObserver<Vec<T>, E>,
    count: usize,
    skip: usize,
    state: Mutex<BufferState<T>>,
}

impl<T, E> Observer<T, E> for BufferObserver<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        let full = {
            let mut state = self.state.lock();
            if state.index % self.skip as u64 == 0 {
                state.active.push_back(Vec::with_capacity(self.count));
            }
            state.index += 1;
            for buf in state.active.iter_mut() {
                buf.push(value.clone());
            }
            let mut full = Vec::new();
            while let Some(front) = state.active.front() {
                if front.len() >= self.count {
                    full.push(state.active.pop_front().unwrap());
                } else {
                    break;
                }
            }
            full
        };
        for buf in full {
            self.downstream.on_next(buf);
        }
    }
    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        let remaining: Vec<Vec<T>> = std::mem::take(&mut self.state.lock().active).into_iter().filter(|b| !b.is_empty()).collect();
        for buf in remaining {
            self.downstream.on_next(buf);
        }
        self.downstream.on_complete();
    }
}

pub fn buffer<T, E>(upstream: Arc<dyn Source<T, E>>, count: usize, skip: usize) -> Buffer<T, E> {
    Buffer::new(upstream, count, skip)
}

/// `buffer(timespan, scheduler)`: emits (possibly empty) buffers on a fixed
/// period, regardless of how many items arrived in that window.
pub struct BufferTime<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    timespan: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> BufferTime<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, timespan: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, timespan, scheduler }
    }
}

impl<T, E> Source<Vec<T>, E> for BufferTime<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<Vec<T>, E>) {
        let downstream: Arc<dyn Observer<Vec<T>, E>> = Arc::from(observer);
        let current = Arc::new(Mutex::new(Vec::new()));
        let latch = Arc::new(Latch::new());
        let worker = self.scheduler.create_worker();

        let tick_current = current.clone();
        let tick_downstream = downstream.clone();
        let tick_latch = latch.clone();
        let periodic = worker.schedule_periodic(
            Arc::new(move || {
                if tick_latch.is_closed() {
                    return;
                }
                let flushed = std::mem::take(&mut *tick_current.lock());
                tick_downstream.on_next(flushed);
            }),
            self.timespan,
            self.timespan,
        );
        let worker_disposable = match periodic {
            Ok(d) => d,
            Err(e) => {
                downstream.on_subscribe(Disposable::disposed());
                downstream.on_error(e.into());
                return;
            }
        };
        downstream.on_subscribe(worker_disposable.clone());
        self.upstream.subscribe(Box::new(BufferTimeObserver {
            downstream,
            current,
            latch,
            worker_disposable,
        }));
    }
}

struct BufferTimeObserver<T, E> {
    downstream: Arc<dyn Observer<Vec<T>, E>>,
    current: Arc<Mutex<Vec<T>>>,
    latch: Arc<Latch>,
    worker_disposable: Disposable,
}

impl<T, E> Observer<T, E> for BufferTimeObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, _d: Disposable) {
        // The disposable handed downstream already covers the periodic
        // flush worker; upstream cancellation rides along with it via
        // `worker_disposable` being disposed from outside.
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        self.current.lock().push(value);
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.worker_disposable.dispose();
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.worker_disposable.dispose();
            let flushed = std::mem::take(&mut *self.current.lock());
            self.downstream.on_next(flushed);
            self.downstream.on_complete();
        }
    }
}

pub fn buffer_time<T, E>(upstream: Arc<dyn Source<T, E>>, timespan: Duration, scheduler: Arc<dyn Scheduler>) -> BufferTime<T, E> {
    BufferTime::new(upstream, timespan, scheduler)
}

/// `window(count, skip)`: like [`buffer`] but each chunk is handed downstream
/// as a live [`Source`] (a per-window [`PublishSubject`]) rather than a
/// materialized `Vec`, so consumers can start draining a window before it's
/// finished filling.
pub struct Window<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    count: usize,
    skip: usize,
}

impl<T, E> Window<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, count: usize, skip: usize) -> Self {
        Self { upstream, count: count.max(1), skip: skip.max(1) }
    }
}

impl<T, E> Source<Arc<dyn Source<T, E>>, E> for Window<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<Arc<dyn Source<T, E>>, E>) {
        self.upstream.subscribe(Box::new(WindowObserver {
            downstream: observer,
            count: self.count,
            skip: self.skip,
            state: Mutex::new(WindowState { active: VecDeque::new(), index: 0 }),
        }));
    }
}

struct OpenWindow<T, E> {
    subject: PublishSubject<T, E>,
    len: usize,
}

struct WindowState<T, E> {
    active: VecDeque<OpenWindow<T, E>>,
    index: u64,
}

struct WindowObserver<T, E> {
    downstream: BoxObserver<Arc<dyn Source<T, E>>, E>,
    count: usize,
    skip: usize,
    state: Mutex<WindowState<T, E>>,
}

impl<T, E> Observer<T, E> for WindowObserver<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.downstream.on_subscribe(d);
    }
    fn on_next(&self, value: T) {
        let mut newly_opened = None;
        let mut completed = Vec::new();
        {
            let mut state = self.state.lock();
            if state.index % self.skip as u64 == 0 {
                let subject = PublishSubject::new();
                newly_opened = Some(subject.clone());
                state.active.push_back(OpenWindow { subject, len: 0 });
            }
            state.index += 1;
            for window in state.active.iter_mut() {
                window.subject.on_next(value.clone());
                window.len += 1;
            }
            while let Some(front) = state.active.front() {
                if front.len >= self.count {
                    completed.push(state.active.pop_front().unwrap());
                } else {
                    break;
                }
            }
        }
        if let Some(subject) = newly_opened {
            self.downstream.on_next(Arc::new(subject) as Arc<dyn Source<T, E>>);
        }
        for window in completed {
            window.subject.on_complete();
        }
    }
    fn on_error(&self, error: E) {
        let remaining = std::mem::take(&mut self.state.lock().active);
        for window in remaining {
            window.subject.on_error(error.clone());
        }
        self.downstream.on_error(error);
    }
    fn on_complete(&self) {
        let remaining = std::mem::take(&mut self.state.lock().active);
        for window in remaining {
            window.subject.on_complete();
        }
        self.downstream.on_complete();
    }
}

pub fn window<T, E>(upstream: Arc<dyn Source<T, E>>, count: usize, skip: usize) -> Window<T, E> {
    Window::new(upstream, count, skip)
}

/// `window(timespan, scheduler)`: like [`buffer_time`] but each period is
/// handed downstream as a live [`Source`] rather than a materialized `Vec`.
/// A new window opens every tick; the previous one is completed at the same
/// moment the next one opens.
pub struct WindowTime<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    timespan: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> WindowTime<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, timespan: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, timespan, scheduler }
    }
}

impl<T, E> Source<Arc<dyn Source<T, E>>, E> for WindowTime<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<Arc<dyn Source<T, E>>, E>) {
        let downstream: Arc<dyn Observer<Arc<dyn Source<T, E>>, E>> = Arc::from(observer);
        let current: Arc<Mutex<PublishSubject<T, E>>> = Arc::new(Mutex::new(PublishSubject::new()));
        let latch = Arc::new(Latch::new());
        let worker = self.scheduler.create_worker();

        downstream.on_next(Arc::new(current.lock().clone()) as Arc<dyn Source<T, E>>);

        let tick_current = current.clone();
        let tick_downstream = downstream.clone();
        let tick_latch = latch.clone();
        let periodic = worker.schedule_periodic(
            Arc::new(move || {
                if tick_latch.is_closed() {
                    return;
                }
                let next = PublishSubject::new();
                let previous = std::mem::replace(&mut *tick_current.lock(), next.clone());
                previous.on_complete();
                tick_downstream.on_next(Arc::new(next) as Arc<dyn Source<T, E>>);
            }),
            self.timespan,
            self.timespan,
        );
        let worker_disposable = match periodic {
            Ok(d) => d,
            Err(e) => {
                downstream.on_subscribe(Disposable::disposed());
                downstream.on_error(e.into());
                return;
            }
        };
        downstream.on_subscribe(worker_disposable.clone());
        self.upstream.subscribe(Box::new(WindowTimeObserver {
            downstream,
            current,
            latch,
            worker_disposable,
        }));
    }
}

struct WindowTimeObserver<T, E> {
    downstream: Arc<dyn Observer<Arc<dyn Source<T, E>>, E>>,
    current: Arc<Mutex<PublishSubject<T, E>>>,
    latch: Arc<Latch>,
    worker_disposable: Disposable,
}

impl<T, E> Observer<T, E> for WindowTimeObserver<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, _d: Disposable) {
        // Covered by `worker_disposable`, already handed downstream.
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        self.current.lock().on_next(value);
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.worker_disposable.dispose();
            self.current.lock().on_error(error.clone());
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.worker_disposable.dispose();
            self.current.lock().on_complete();
            self.downstream.on_complete();
        }
    }
}

pub fn window_time<T, E>(upstream: Arc<dyn Source<T, E>>, timespan: Duration, scheduler: Arc<dyn Scheduler>) -> WindowTime<T, E> {
    WindowTime::new(upstream, timespan, scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::just;
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
    fn src(values: Vec<i32>) -> Arc<dyn Source<i32, TestError>> {
        Arc::new(just(values))
    }

    #[test]
    fn scan_emits_running_total() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&scan(src(vec![1, 2, 3]), 0, |acc, v| acc + v), obs);
        assert_eq!(*log.lock(), vec!["next:1", "next:3", "next:6", "complete"]);
    }

    #[test]
    fn reduce_emits_only_the_final_total() {
        let (log, obs) = recorder();
        Source::<i32, TestError>::subscribe(&reduce(src(vec![1, 2, 3]), 0, |acc, v| acc + v), obs);
        assert_eq!(*log.lock(), vec!["next:6", "complete"]);
    }

    #[test]
    fn buffer_non_overlapping_chunks() {
        let (log, obs) = recorder::<Vec<i32>>();
        Source::<Vec<i32>, TestError>::subscribe(&buffer(src(vec![1, 2, 3, 4, 5]), 2, 2), obs);
        assert_eq!(*log.lock(), vec!["next:[1, 2]", "next:[3, 4]", "next:[5]", "complete"]);
    }

    #[test]
    fn buffer_with_skip_less_than_count_overlaps() {
        let (log, obs) = recorder::<Vec<i32>>();
        Source::<Vec<i32>, TestError>::subscribe(&buffer(src(vec![1, 2, 3]), 2, 1), obs);
        assert_eq!(*log.lock(), vec!["next:[1, 2]", "next:[2, 3]", "next:[3]", "complete"]);
    }

    #[test]
    fn buffer_time_flushes_on_each_tick() {
        let scheduler = TestScheduler::new();
        let (log, obs) = recorder::<Vec<i32>>();
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(crate::creation::never());
        let op = buffer_time(upstream, Duration::from_millis(10), Arc::new(scheduler.clone()) as Arc<dyn Scheduler>);
        Source::<Vec<i32>, TestError>::subscribe(&op, obs);
        scheduler.advance_time_by(Duration::from_millis(25));
        assert_eq!(*log.lock(), vec!["next:[]", "next:[]"]);
    }

    #[test]
    fn window_emits_a_source_per_chunk() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        struct WindowRecorder {
            log: Arc<Mutex<Vec<String>>>,
        }
        impl Observer<Arc<dyn Source<i32, TestError>>, TestError> for WindowRecorder {
            fn on_subscribe(&self, _d: Disposable) {}
            fn on_next(&self, w: Arc<dyn Source<i32, TestError>>) {
                let log = self.log.clone();
                w.subscribe(Box::new(Recorder { log, _marker: std::marker::PhantomData }));
            }
            fn on_error(&self, error: TestError) {
                self.log.lock().push(format!("outer-error:{error}"));
            }
            fn on_complete(&self) {
                self.log.lock().push("outer-complete".into());
            }
        }
        Source::<Arc<dyn Source<i32, TestError>>, TestError>::subscribe(
            &window(src(vec![1, 2, 3, 4]), 2, 2),
            Box::new(WindowRecorder { log: log.clone() }),
        );
        let entries = log.lock();
        assert!(entries.contains(&"next:1".to_string()));
        assert!(entries.contains(&"next:3".to_string()));
        assert_eq!(*entries.last().unwrap(), "outer-complete");
    }

    #[test]
    fn window_time_opens_a_new_window_on_each_tick() {
        let scheduler = TestScheduler::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        struct WindowRecorder {
            log: Arc<Mutex<Vec<String>>>,
        }
        impl Observer<Arc<dyn Source<i32, TestError>>, TestError> for WindowRecorder {
            fn on_subscribe(&self, _d: Disposable) {}
            fn on_next(&self, w: Arc<dyn Source<i32, TestError>>) {
                self.log.lock().push("window-opened".into());
                let log = self.log.clone();
                w.subscribe(Box::new(Recorder { log, _marker: std::marker::PhantomData }));
            }
            fn on_error(&self, error: TestError) {
                self.log.lock().push(format!("outer-error:{error}"));
            }
            fn on_complete(&self) {
                self.log.lock().push("outer-complete".into());
            }
        }
        let upstream = reactor_subjects::PublishSubject::<i32, TestError>::new();
        let op = window_time(Arc::new(upstream.clone()) as Arc<dyn Source<i32, TestError>>, Duration::from_millis(10), Arc::new(scheduler.clone()) as Arc<dyn Scheduler>);
        Source::<Arc<dyn Source<i32, TestError>>, TestError>::subscribe(&op, Box::new(WindowRecorder { log: log.clone() }));

        upstream.on_next(1);
        scheduler.advance_time_by(Duration::from_millis(10));
        upstream.on_next(2);
        upstream.on_complete();

        assert_eq!(
            *log.lock(),
            vec!["window-opened", "next:1", "complete", "window-opened", "next:2", "complete", "outer-complete"]
        );
    }
}
