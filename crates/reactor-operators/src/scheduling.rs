//! `subscribeOn`/`observeOn`: relocating where a chain's setup and delivery
//! execute.
//!
//! These are the only two operators that talk to a [`Scheduler`] without
//! also being a time operator: `subscribeOn` moves the *subscription act*
//! (the call into `upstream.subscribe`) onto a worker, while `observeOn`
//! moves subsequent signal *delivery* onto one, via a bounded queue the
//! worker drains in order.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use reactor_core::{
    BoxObserver, CompositeDisposable, Disposable, Observer, SerialDisposable, Signal, Source,
};
use reactor_scheduler::{Scheduler, Worker};

use crate::support::{composite_handle, report_undeliverable};

/// `subscribeOn(scheduler)`: runs `upstream.subscribe` on a worker drawn
/// from `scheduler` rather than the calling thread. The contract still
/// requires `on_subscribe` to reach the downstream synchronously from this
/// call, so a [`SerialDisposable`] is handed out immediately and later
/// replaced with the real upstream disposable once the scheduled
/// subscription actually runs. Stacking `subscribeOn` only moves the
/// *innermost* subscribe call each operator performs; per spec, only the
/// outermost one in a chain determines where the initial subscription act
/// for the whole chain runs, since each inner `subscribeOn` is itself
/// subscribed synchronously by the one above it.
pub struct SubscribeOn<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> SubscribeOn<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { upstream, scheduler }
    }
}

impl<T, E> Source<T, E> for SubscribeOn<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let downstream: Arc<dyn Observer<T, E>> = Arc::from(observer);
        let serial = SerialDisposable::new();
        downstream.on_subscribe(serial.as_disposable());

        let upstream = self.upstream.clone();
        let worker = self.scheduler.create_worker();
        let serial_for_task = serial.clone();
        let downstream_for_task = downstream.clone();
        let handle = worker.schedule(Box::new(move || {
            upstream.subscribe(Box::new(SubscribeOnBridge {
                downstream: downstream_for_task,
                serial: serial_for_task,
            }));
        }));
        serial.replace(handle);
    }
}

struct SubscribeOnBridge<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    serial: SerialDisposable,
}

impl<T, E> Observer<T, E> for SubscribeOnBridge<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, disposable: Disposable) {
        self.serial.replace(disposable);
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

pub fn subscribe_on<T, E>(
    upstream: Arc<dyn Source<T, E>>,
    scheduler: Arc<dyn Scheduler>,
) -> SubscribeOn<T, E> {
    SubscribeOn::new(upstream, scheduler)
}

/// `observeOn(scheduler, buffer_size)`: hands every subsequent signal off
/// through a bounded FIFO drained one item at a time by a worker on
/// `scheduler`, preserving arrival order. This is a push source, so a
/// saturated queue has nowhere to apply backpressure to: the newest `Next`
/// is dropped and reported to the process-wide sink rather than blocking the
/// producer (see [`reactor_backpressure`] for the pull-based alternative
/// that blocks on missing `request(n)` instead).
pub struct ObserveOn<T, E> {
    upstream: Arc<dyn Source<T, E>>,
    scheduler: Arc<dyn Scheduler>,
    buffer_size: usize,
}

impl<T, E> ObserveOn<T, E> {
    pub fn new(upstream: Arc<dyn Source<T, E>>, scheduler: Arc<dyn Scheduler>, buffer_size: usize) -> Self {
        Self { upstream, scheduler, buffer_size: buffer_size.max(1) }
    }
}

impl<T, E> Source<T, E> for ObserveOn<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        let worker = self.scheduler.create_worker();
        let shared = Arc::new(ObserveOnShared {
            downstream: Arc::from(observer),
            worker: worker.clone(),
            buffer_size: self.buffer_size,
            state: Mutex::new(ObserveOnState {
                queue: VecDeque::new(),
                dispatching: false,
                terminal_queued: false,
            }),
        });

        let composite = CompositeDisposable::new();
        composite.add(Disposable::new({
            let worker = worker.clone();
            move || worker.dispose()
        }));
        shared.downstream.on_subscribe(composite_handle(&composite));

        self.upstream.subscribe(Box::new(UpstreamBridge {
            shared,
            upstream_slot: composite,
        }));
    }
}

struct ObserveOnState<T, E> {
    queue: VecDeque<Signal<T, E>>,
    dispatching: bool,
    terminal_queued: bool,
}

struct ObserveOnShared<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    worker: Arc<dyn Worker>,
    buffer_size: usize,
    state: Mutex<ObserveOnState<T, E>>,
}

impl<T, E> ObserveOnShared<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn enqueue(self: &Arc<Self>, signal: Signal<T, E>) {
        let mut schedule = false;
        {
            let mut state = self.state.lock();
            if state.terminal_queued {
                return;
            }
            if matches!(signal, Signal::Next(_)) && state.queue.len() >= self.buffer_size {
                drop(state);
                report_undeliverable("observeOn queue saturated, dropping a Next signal");
                return;
            }
            if signal.is_terminal() {
                state.terminal_queued = true;
            }
            state.queue.push_back(signal);
            if !state.dispatching {
                state.dispatching = true;
                schedule = true;
            }
        }
        if schedule {
            self.schedule_drain();
        }
    }

    fn schedule_drain(self: &Arc<Self>) {
        let this = self.clone();
        let _ = self.worker.schedule(Box::new(move || this.drain_one()));
    }

    fn drain_one(self: &Arc<Self>) {
        let item = self.state.lock().queue.pop_front();
        match item {
            Some(Signal::Next(v)) => self.downstream.on_next(v),
            Some(Signal::Error(e)) => self.downstream.on_error(e),
            Some(Signal::Complete) => self.downstream.on_complete(),
            None => {}
        }
        let more = {
            let mut state = self.state.lock();
            let more = !state.queue.is_empty();
            state.dispatching = more;
            more
        };
        if more {
            self.schedule_drain();
        }
    }
}

struct UpstreamBridge<T, E> {
    shared: Arc<ObserveOnShared<T, E>>,
    upstream_slot: CompositeDisposable,
}

impl<T, E> Observer<T, E> for UpstreamBridge<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, disposable: Disposable) {
        self.upstream_slot.add(disposable);
    }
    fn on_next(&self, value: T) {
        self.shared.enqueue(Signal::Next(value));
    }
    fn on_error(&self, error: E) {
        self.shared.enqueue(Signal::Error(error));
    }
    fn on_complete(&self) {
        self.shared.enqueue(Signal::Complete);
    }
}

pub fn observe_on<T, E>(
    upstream: Arc<dyn Source<T, E>>,
    scheduler: Arc<dyn Scheduler>,
    buffer_size: usize,
) -> ObserveOn<T, E> {
    ObserveOn::new(upstream, scheduler, buffer_size)
}
