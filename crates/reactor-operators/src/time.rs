//! Time operators: `delay`, `debounce`, `throttleFirst`, `sample`,
//! `timeout`, `delaySubscription`. These are where cancellation and
//! ordering actually get stressed — each uses an explicit `Worker` plus
//! either a [`GenerationToken`] (debounce/timeout, to invalidate a
//! previously-scheduled callback without literally cancelling it) or a
//! [`SerialDisposable`]/[`CompositeDisposable`] (delay/delaySubscription, to
//! cancel outstanding scheduled work promptly on downstream dispose).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reactor_core::{
    BoxObserver, CompositeDisposable, ContractViolation, Disposable, ErrorKind, GenerationToken,
    Observer, ReactorError, SerialDisposable, Source,
};
use reactor_scheduler::{Scheduler, Worker};

use crate::support::{Latch, composite_handle};

/// `delay(d, scheduler)`: every signal — including the terminal one — is
/// rescheduled `d` later on a single [`Worker`], so relative order is
/// preserved (a single-threaded worker drains its queue FIFO).
pub struct Delay<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> Delay<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, delay, scheduler }
    }
}

impl<T, E> Source<T, E> for Delay<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let composite = CompositeDisposable::new();
        let worker_for_handle = worker.clone();
        composite.add(Disposable::new(move || worker_for_handle.dispose()));
        downstream.on_subscribe(composite_handle(&composite));

        self.upstream.subscribe(Box::new(DelayObserver {
            downstream,
            worker,
            delay: self.delay,
            composite,
            latch: Latch::new(),
        }));
    }
}

struct DelayObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    worker: Arc<dyn Worker>,
    delay: Duration,
    composite: CompositeDisposable,
    latch: Latch,
}

impl<T, E> DelayObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        match self.worker.schedule_after(task, self.delay) {
            Ok(_handle) => {}
            Err(err) => {
                if self.latch.try_close() {
                    self.downstream.on_error(err.into());
                }
            }
        }
    }
}

impl<T, E> Observer<T, E> for DelayObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.composite.add(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        let downstream = self.downstream.clone();
        self.schedule(Box::new(move || downstream.on_next(value)));
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            let downstream = self.downstream.clone();
            self.schedule(Box::new(move || downstream.on_error(error)));
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            let downstream = self.downstream.clone();
            self.schedule(Box::new(move || downstream.on_complete()));
        }
    }
}

pub fn delay<T, E>(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Delay<T, E> {
    Delay::new(upstream, delay, scheduler)
}

/// `debounce(d, scheduler)`: on every `Next`, buffer the value and (re)arm a
/// `d`-delayed emission, invalidating any previously-armed one via
/// [`GenerationToken`]. On `Complete`, emit the buffered value (if any)
/// immediately, then complete. On `Error`, drop the buffered value and
/// surface immediately.
pub struct Debounce<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> Debounce<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, delay, scheduler }
    }
}

impl<T, E> Source<T, E> for Debounce<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let composite = CompositeDisposable::new();
        let worker_for_handle = worker.clone();
        composite.add(Disposable::new(move || worker_for_handle.dispose()));
        downstream.on_subscribe(composite_handle(&composite));

        let shared = Arc::new(DebounceShared {
            downstream,
            worker,
            delay: self.delay,
            pending: Mutex::new(None),
            generation: GenerationToken::new(),
            latch: Latch::new(),
        });
        self.upstream.subscribe(Box::new(DebounceObserver { shared, composite }));
    }
}

struct DebounceShared<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    worker: Arc<dyn Worker>,
    delay: Duration,
    pending: Mutex<Option<T>>,
    generation: GenerationToken,
    latch: Latch,
}

struct DebounceObserver<T, E> {
    shared: Arc<DebounceShared<T, E>>,
    composite: CompositeDisposable,
}

impl<T, E> Observer<T, E> for DebounceObserver<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.composite.add(d);
    }
    fn on_next(&self, value: T) {
        if self.shared.latch.is_closed() {
            return;
        }
        let generation = self.shared.generation.advance();
        *self.shared.pending.lock() = Some(value);
        let shared = self.shared.clone();
        if let Err(err) = shared.worker.schedule_after(
            Box::new(move || {
                if shared.generation.is_current(generation) {
                    if let Some(v) = shared.pending.lock().take() {
                        shared.downstream.on_next(v);
                    }
                }
            }),
            self.shared.delay,
        ) {
            if self.shared.latch.try_close() {
                self.shared.downstream.on_error(err.into());
            }
        }
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.generation.advance();
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.shared.latch.try_close() {
            self.shared.generation.advance();
            if let Some(v) = self.shared.pending.lock().take() {
                self.shared.downstream.on_next(v);
            }
            self.shared.downstream.on_complete();
        }
    }
}

pub fn debounce<T, E>(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Debounce<T, E> {
    Debounce::new(upstream, delay, scheduler)
}

/// `throttleFirst(d, scheduler)`: the first item in each `d`-wide window is
/// forwarded; every later item until the window closes is dropped.
pub struct ThrottleFirst<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> ThrottleFirst<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, duration, scheduler }
    }
}

impl<T, E> Source<T, E> for ThrottleFirst<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let composite = CompositeDisposable::new();
        let worker_for_handle = worker.clone();
        composite.add(Disposable::new(move || worker_for_handle.dispose()));
        downstream.on_subscribe(composite_handle(&composite));

        let shared = Arc::new(ThrottleShared {
            downstream,
            worker,
            duration: self.duration,
            open: AtomicBool::new(true),
            latch: Latch::new(),
        });
        self.upstream.subscribe(Box::new(ThrottleObserver { shared, composite }));
    }
}

struct ThrottleShared<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    worker: Arc<dyn Worker>,
    duration: Duration,
    open: AtomicBool,
    latch: Latch,
}

struct ThrottleObserver<T, E> {
    shared: Arc<ThrottleShared<T, E>>,
    composite: CompositeDisposable,
}

impl<T, E> Observer<T, E> for ThrottleObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.composite.add(d);
    }
    fn on_next(&self, value: T) {
        if self.shared.latch.is_closed() {
            return;
        }
        if self
            .shared
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.shared.downstream.on_next(value);
            let shared = self.shared.clone();
            if let Err(err) = shared.worker.schedule_after(
                Box::new(move || shared.open.store(true, Ordering::Release)),
                self.shared.duration,
            ) {
                if self.shared.latch.try_close() {
                    self.shared.downstream.on_error(err.into());
                }
            }
        }
    }
    fn on_error(&self, error: E) {
        if self.shared.latch.try_close() {
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.shared.latch.try_close() {
            self.shared.downstream.on_complete();
        }
    }
}

pub fn throttle_first<T, E>(upstream: Arc<dyn Source<T, E>>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> ThrottleFirst<T, E> {
    ThrottleFirst::new(upstream, duration, scheduler)
}

/// `sample(d, scheduler)`: a periodic worker fires every `d`; if a value has
/// arrived since the last tick it is emitted and the cell cleared, otherwise
/// the tick is silent. On `Complete`, the pending value (if any) is emitted
/// before completion — the same "emit pending on complete" semantics this
/// spec standardizes for [`debounce`].
pub struct Sample<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    period: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> Sample<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, period: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, period, scheduler }
    }
}

impl<T, E> Source<T, E> for Sample<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let state: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
        let latch = Arc::new(Latch::new());

        let tick_state = state.clone();
        let tick_downstream = downstream.clone();
        let tick_latch = latch.clone();
        let periodic = worker.schedule_periodic(
            Arc::new(move || {
                if tick_latch.is_closed() {
                    return;
                }
                if let Some(v) = tick_state.lock().take() {
                    tick_downstream.on_next(v);
                }
            }),
            self.period,
            self.period,
        );
        let periodic_disposable = match periodic {
            Ok(d) => d,
            Err(err) => {
                downstream.on_subscribe(Disposable::disposed());
                downstream.on_error(err.into());
                return;
            }
        };
        let composite = CompositeDisposable::new();
        composite.add(periodic_disposable.clone());
        downstream.on_subscribe(composite_handle(&composite));

        self.upstream.subscribe(Box::new(SampleObserver {
            downstream,
            state,
            latch,
            periodic_disposable,
            composite,
        }));
    }
}

struct SampleObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Arc<Mutex<Option<T>>>,
    latch: Arc<Latch>,
    periodic_disposable: Disposable,
    composite: CompositeDisposable,
}

impl<T, E> Observer<T, E> for SampleObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        self.composite.add(d);
    }
    fn on_next(&self, value: T) {
        if self.latch.is_closed() {
            return;
        }
        *self.state.lock() = Some(value);
    }
    fn on_error(&self, error: E) {
        if self.latch.try_close() {
            self.periodic_disposable.dispose();
            self.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.latch.try_close() {
            self.periodic_disposable.dispose();
            if let Some(v) = self.state.lock().take() {
                self.downstream.on_next(v);
            }
            self.downstream.on_complete();
        }
    }
}

pub fn sample<T, E>(upstream: Arc<dyn Source<T, E>>, period: Duration, scheduler: Arc<dyn Scheduler>) -> Sample<T, E> {
    Sample::new(upstream, period, scheduler)
}

/// `timeout(d, scheduler[, fallback])`: a timer is armed at subscription and
/// rearmed on every `Next`. If it ever expires: switches to `fallback` if
/// one was given, otherwise surfaces a `Timeout` error. Disposal cancels the
/// timer.
pub struct Timeout<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
    fallback: Option<Arc<dyn Source<T, E>>>,
}

impl<T, E> Timeout<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, delay, scheduler, fallback: None }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn Source<T, E>>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl<T, E> Source<T, E> for Timeout<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let serial = SerialDisposable::new();
        let composite = CompositeDisposable::new();
        let worker_for_handle = worker.clone();
        composite.add(Disposable::new(move || worker_for_handle.dispose()));
        composite.add(serial.as_disposable());
        downstream.on_subscribe(composite_handle(&composite));

        let shared = Arc::new(TimeoutShared {
            downstream,
            worker,
            delay: self.delay,
            fallback: self.fallback.clone(),
            generation: GenerationToken::new(),
            latch: Latch::new(),
            switched: AtomicBool::new(false),
            serial,
        });
        shared.arm();
        self.upstream.subscribe(Box::new(TimeoutObserver { shared }));
    }
}

struct TimeoutShared<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    worker: Arc<dyn Worker>,
    delay: Duration,
    fallback: Option<Arc<dyn Source<T, E>>>,
    generation: GenerationToken,
    latch: Latch,
    switched: AtomicBool,
    serial: SerialDisposable,
}

impl<T, E> TimeoutShared<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn arm(self: &Arc<Self>) {
        let generation = self.generation.advance();
        let shared = self.clone();
        if let Err(err) = self.worker.schedule_after(
            Box::new(move || {
                if shared.generation.is_current(generation) {
                    shared.expire();
                }
            }),
            self.delay,
        ) {
            if self.latch.try_close() {
                self.downstream.on_error(err.into());
            }
        }
    }

    fn expire(self: &Arc<Self>) {
        if self.latch.is_closed() {
            return;
        }
        match &self.fallback {
            Some(fallback) => {
                self.switched.store(true, Ordering::Release);
                let downstream = self.downstream.clone();
                fallback.subscribe(Box::new(FallbackForward { downstream, serial: self.serial.clone() }));
            }
            None => {
                if self.latch.try_close() {
                    let err = ReactorError::new("timeout.elapsed", "no value arrived before the timeout elapsed", ErrorKind::Timeout)
                        .with_cause(ContractViolation::TimeoutElapsed(self.delay));
                    self.downstream.on_error(err.into());
                }
            }
        }
    }
}

struct FallbackForward<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
}

impl<T, E> Observer<T, E> for FallbackForward<T, E>
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

struct TimeoutObserver<T, E> {
    shared: Arc<TimeoutShared<T, E>>,
}

impl<T, E> Observer<T, E> for TimeoutObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn on_subscribe(&self, d: Disposable) {
        self.shared.serial.replace(d);
    }
    fn on_next(&self, value: T) {
        if self.shared.switched.load(Ordering::Acquire) || self.shared.latch.is_closed() {
            return;
        }
        self.shared.arm();
        self.shared.downstream.on_next(value);
    }
    fn on_error(&self, error: E) {
        if self.shared.switched.load(Ordering::Acquire) {
            return;
        }
        if self.shared.latch.try_close() {
            self.shared.downstream.on_error(error);
        }
    }
    fn on_complete(&self) {
        if self.shared.switched.load(Ordering::Acquire) {
            return;
        }
        if self.shared.latch.try_close() {
            self.shared.downstream.on_complete();
        }
    }
}

pub fn timeout<T, E>(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Timeout<T, E> {
    Timeout::new(upstream, delay, scheduler)
}

/// `delaySubscription(d, scheduler)`: postpones calling `upstream.subscribe`
/// until `d` has elapsed. No signal can arrive before then; disposing before
/// the delay elapses cancels the scheduled subscribe outright.
pub struct DelaySubscription<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> DelaySubscription<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, delay, scheduler }
    }
}

impl<T, E> Source<T, E> for DelaySubscription<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static + From<ReactorError>,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let worker = self.scheduler.create_worker();
        let serial = SerialDisposable::new();
        downstream.on_subscribe(serial.as_disposable());

        let upstream = self.upstream.clone();
        let serial_for_task = serial.clone();
        let downstream_for_task = downstream.clone();
        match worker.schedule_after(
            Box::new(move || {
                upstream.subscribe(Box::new(SubscribeForward {
                    downstream: downstream_for_task,
                    serial: serial_for_task,
                }));
            }),
            self.delay,
        ) {
            Ok(task_handle) => serial.replace(task_handle),
            Err(err) => downstream.on_error(err.into()),
        }
    }
}

struct SubscribeForward<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
}

impl<T, E> Observer<T, E> for SubscribeForward<T, E>
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

pub fn delay_subscription<T, E>(upstream: Arc<dyn Source<T, E>>, delay: Duration, scheduler: Arc<dyn Scheduler>) -> DelaySubscription<T, E> {
    DelaySubscription::new(upstream, delay, scheduler)
}
