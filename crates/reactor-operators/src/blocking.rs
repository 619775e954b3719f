//! `(supplemented)` blocking adapters named in the external-surface list
//! (`blockingFirst`/`blockingLast`/`blockingIterable`) but not detailed as
//! their own stage: each subscribes internally and parks the calling thread
//! on a condvar until the first/last value or a terminal signal arrives,
//! then re-raises any upstream error on the calling thread. No
//! `toFuture`/async-executor bridge is provided — per spec.md's Non-goal on
//! interop shims to third-party reactive libraries, this runtime does not
//! grow a dependency on `std::future`/an async executor just to expose one.

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};

use reactor_core::{BoxObserver, Disposable, Observer, Source};

enum Outcome<T, E> {
    Value(T),
    Empty,
    Error(E),
}

struct Latch<T, E> {
    mutex: Mutex<Option<Outcome<T, E>>>,
    condvar: Condvar,
}

impl<T, E> Latch<T, E> {
    fn new() -> Self {
        Self {
            mutex: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    fn set(&self, outcome: Outcome<T, E>) {
        let mut guard = self.mutex.lock().expect("blocking adapter mutex poisoned");
        if guard.is_none() {
            *guard = Some(outcome);
            self.condvar.notify_one();
        }
    }

    fn wait(&self) -> Outcome<T, E> {
        let mut guard = self.mutex.lock().expect("blocking adapter mutex poisoned");
        while guard.is_none() {
            guard = self.condvar.wait(guard).expect("blocking adapter mutex poisoned");
        }
        guard.take().expect("checked Some above")
    }
}

struct FirstObserver<T, E> {
    latch: Arc<Latch<T, E>>,
    disposable: Mutex<Option<Disposable>>,
}

impl<T, E> Observer<T, E> for FirstObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, d: Disposable) {
        *self.disposable.lock().expect("disposable slot poisoned") = Some(d);
    }
    fn on_next(&self, value: T) {
        self.latch.set(Outcome::Value(value));
        if let Some(d) = self.disposable.lock().expect("disposable slot poisoned").take() {
            d.dispose();
        }
    }
    fn on_error(&self, error: E) {
        self.latch.set(Outcome::Error(error));
    }
    fn on_complete(&self) {
        self.latch.set(Outcome::Empty);
    }
}

/// `blockingFirst(default)`: parks the calling thread until the upstream's
/// first `Next` arrives (disposing immediately afterward), its first
/// `Error`, or `Complete` with no values (returning `default`, if given, or
/// panicking — matching the upstream library convention that
/// `blockingFirst()` on an empty source is a programmer error).
pub fn blocking_first<T, E>(upstream: Arc<dyn Source<T, E>>, default: Option<T>) -> Result<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let latch = Arc::new(Latch::new());
    let observer: BoxObserver<T, E> = Box::new(FirstObserver {
        latch: latch.clone(),
        disposable: Mutex::new(None),
    });
    upstream.subscribe(observer);
    match latch.wait() {
        Outcome::Value(v) => Ok(v),
        Outcome::Error(e) => Err(e),
        Outcome::Empty => match default {
            Some(v) => Ok(v),
            None => panic!("blockingFirst called on a source that completed with no values"),
        },
    }
}

struct LastObserver<T, E> {
    latch: Arc<Latch<T, E>>,
    pending: Mutex<Option<T>>,
}

impl<T, E> Observer<T, E> for LastObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, _d: Disposable) {}
    fn on_next(&self, value: T) {
        *self.pending.lock().expect("pending slot poisoned") = Some(value);
    }
    fn on_error(&self, error: E) {
        self.latch.set(Outcome::Error(error));
    }
    fn on_complete(&self) {
        match self.pending.lock().expect("pending slot poisoned").take() {
            Some(v) => self.latch.set(Outcome::Value(v)),
            None => self.latch.set(Outcome::Empty),
        }
    }
}

/// `blockingLast(default)`: parks until the upstream terminates, then
/// returns the final `Next` value seen (or `default`/panics on an empty
/// source, matching [`blocking_first`]'s convention).
pub fn blocking_last<T, E>(upstream: Arc<dyn Source<T, E>>, default: Option<T>) -> Result<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let latch = Arc::new(Latch::new());
    let observer: BoxObserver<T, E> = Box::new(LastObserver {
        latch: latch.clone(),
        pending: Mutex::new(None),
    });
    upstream.subscribe(observer);
    match latch.wait() {
        Outcome::Value(v) => Ok(v),
        Outcome::Error(e) => Err(e),
        Outcome::Empty => match default {
            Some(v) => Ok(v),
            None => panic!("blockingLast called on a source that completed with no values"),
        },
    }
}

enum IterItem<T, E> {
    Value(T),
    Error(E),
}

struct IterableObserver<T, E> {
    sender: mpsc::Sender<IterItem<T, E>>,
}

impl<T, E> Observer<T, E> for IterableObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn on_subscribe(&self, _d: Disposable) {}
    fn on_next(&self, value: T) {
        let _ = self.sender.send(IterItem::Value(value));
    }
    fn on_error(&self, error: E) {
        let _ = self.sender.send(IterItem::Error(error));
    }
    fn on_complete(&self) {}
}

/// A blocking `Iterator` bridge for [`blocking_iterable`]: each call to
/// `next()` blocks the calling thread until the upstream produces another
/// item, surfaces an upstream error as `Some(Err(..))` and then stops, or
/// the channel closes on `Complete` (yielding `None`).
pub struct BlockingIter<T, E> {
    receiver: mpsc::Receiver<IterItem<T, E>>,
    done: bool,
}

impl<T, E> Iterator for BlockingIter<T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.receiver.recv() {
            Ok(IterItem::Value(v)) => Some(Ok(v)),
            Ok(IterItem::Error(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// `blockingIterable()`: subscribes immediately and returns a blocking
/// `Iterator` over the resulting `Next`/`Error` signals, bridged through an
/// `mpsc` channel rather than any `Future`/async-executor type.
pub fn blocking_iterable<T, E>(upstream: Arc<dyn Source<T, E>>) -> BlockingIter<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let (sender, receiver) = mpsc::channel();
    upstream.subscribe(Box::new(IterableObserver { sender }));
    BlockingIter { receiver, done: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::{empty, error, just};

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    #[test]
    fn blocking_first_returns_the_first_value() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(just(vec![1, 2, 3]));
        assert_eq!(blocking_first(upstream, None).unwrap(), 1);
    }

    #[test]
    fn blocking_first_on_empty_uses_default() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(empty());
        assert_eq!(blocking_first(upstream, Some(42)).unwrap(), 42);
    }

    #[test]
    fn blocking_first_surfaces_error() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(error(TestError("boom".into())));
        assert_eq!(blocking_first(upstream, None).unwrap_err(), TestError("boom".into()));
    }

    #[test]
    fn blocking_last_returns_final_value() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(just(vec![1, 2, 3]));
        assert_eq!(blocking_last(upstream, None).unwrap(), 3);
    }

    #[test]
    fn blocking_iterable_yields_values_then_stops_at_complete() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(just(vec![1, 2, 3]));
        let collected: Vec<i32> = blocking_iterable(upstream).map(|r| r.unwrap()).collect();
        assert_eq!(collected, vec![1, 2, 3]);
    }

    #[test]
    fn blocking_iterable_surfaces_error_then_stops() {
        let upstream: Arc<dyn Source<i32, TestError>> = Arc::new(error(TestError("boom".into())));
        let collected: Vec<Result<i32, TestError>> = blocking_iterable(upstream).collect();
        assert_eq!(collected, vec![Err(TestError("boom".into()))]);
    }
}
