//! Cancellation tokens for the reactive contract.
//!
//! A [`Disposable`] is handed to every [`crate::Observer`] in `on_subscribe`
//! and represents the downstream's handle on the upstream production. Disposal
//! is idempotent and, once it returns, no further signals should reach the
//! disposed observer (stages are responsible for checking
//! [`Disposable::is_disposed`] before forwarding).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// An idempotent, cooperatively-cancellable handle.
///
/// Cloning a `Disposable` shares the same underlying state: disposing any
/// clone disposes all of them.
#[derive(Clone)]
pub struct Disposable {
    inner: Arc<Inner>,
}

struct Inner {
    disposed: AtomicBool,
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Disposable {
    /// Build a disposable whose first `dispose()` call runs `action` exactly once.
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                disposed: AtomicBool::new(false),
                action: Mutex::new(Some(Box::new(action))),
            }),
        }
    }

    /// A disposable with no associated action; `dispose()` only flips the flag.
    pub fn empty() -> Self {
        Self::new(|| {})
    }

    /// A disposable that is already in the disposed state (used by sources
    /// that terminate synchronously before handing out a real token).
    pub fn disposed() -> Self {
        let d = Self::empty();
        d.dispose();
        d
    }

    /// Runs the bound action at most once. Returns `true` the first time it
    /// actually disposes, `false` on every subsequent call.
    pub fn dispose(&self) -> bool {
        if self
            .inner
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Some(action) = self.inner.action.lock().take() {
                action();
            }
            true
        } else {
            false
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Default for Disposable {
    fn default() -> Self {
        Self::empty()
    }
}

/// A disposable slot whose contents can be swapped; disposing the container
/// disposes whatever is currently held and any future occupant set
/// afterwards disposes immediately. Used by `switchMap`/`debounce` to retire
/// a previous inner subscription when a new one supersedes it.
#[derive(Clone)]
pub struct SerialDisposable {
    inner: Arc<Mutex<SerialState>>,
}

struct SerialState {
    current: Option<Disposable>,
    disposed: bool,
}

impl SerialDisposable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SerialState {
                current: None,
                disposed: false,
            })),
        }
    }

    /// Replace the held disposable, disposing the previous occupant. If this
    /// container has already been disposed, `next` is disposed immediately.
    pub fn replace(&self, next: Disposable) {
        let previous = {
            let mut state = self.inner.lock();
            if state.disposed {
                drop(state);
                next.dispose();
                return;
            }
            let previous = state.current.replace(next);
            previous
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    pub fn dispose(&self) {
        let previous = {
            let mut state = self.inner.lock();
            state.disposed = true;
            state.current.take()
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    pub fn as_disposable(&self) -> Disposable {
        let this = self.clone();
        Disposable::new(move || this.dispose())
    }
}

impl Default for SerialDisposable {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregates many independent disposables (e.g. the set of in-flight inner
/// subscriptions of `flatMap`/`merge`). Disposing the set disposes every
/// member currently held and any added afterwards.
#[derive(Clone)]
pub struct CompositeDisposable {
    inner: Arc<Mutex<CompositeState>>,
}

struct CompositeState {
    members: Vec<(u64, Disposable)>,
    next_id: u64,
    disposed: bool,
}

/// Handle returned by [`CompositeDisposable::add`] allowing targeted removal
/// (e.g. when a single inner source completes on its own, ahead of the rest).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberId(u64);

impl CompositeDisposable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CompositeState {
                members: Vec::new(),
                next_id: 0,
                disposed: false,
            })),
        }
    }

    /// Add a member; disposes it immediately (and returns a dummy id) if the
    /// set is already disposed.
    pub fn add(&self, d: Disposable) -> MemberId {
        let mut state = self.inner.lock();
        if state.disposed {
            drop(state);
            d.dispose();
            return MemberId(0);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.members.push((id, d));
        MemberId(id)
    }

    /// Remove a member without disposing it (it has already completed on its own).
    pub fn remove(&self, id: MemberId) {
        let mut state = self.inner.lock();
        state.members.retain(|(mid, _)| *mid != id.0);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispose(&self) {
        let members = {
            let mut state = self.inner.lock();
            state.disposed = true;
            std::mem::take(&mut state.members)
        };
        for (_, d) in members {
            d.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

/// A monotonically-increasing generation counter used by time operators
/// (`debounce`, `throttleFirst`, `sample`, `timeout`) to invalidate
/// previously-scheduled timer callbacks without an explicit dispose call per
/// tick. Each `schedule()`-bound closure captures the generation it was
/// issued for and becomes a no-op once a newer generation has been minted.
#[derive(Clone, Default)]
pub struct GenerationToken {
    inner: Arc<AtomicU64>,
}

impl GenerationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new generation, superseding any previously issued one.
    pub fn advance(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Acquire)
    }

    /// True if `gen` is still the most recently minted generation.
    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dispose_runs_action_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let d = Disposable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!d.is_disposed());
        assert!(d.dispose());
        assert!(d.is_disposed());
        assert!(!d.dispose());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn serial_disposable_disposes_previous_on_replace() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let serial = SerialDisposable::new();
        let l1 = log.clone();
        serial.replace(Disposable::new(move || l1.lock().push(1)));
        let l2 = log.clone();
        serial.replace(Disposable::new(move || l2.lock().push(2)));
        assert_eq!(*log.lock(), vec![1]);
        serial.dispose();
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn serial_disposable_disposes_future_occupant_after_dispose() {
        let serial = SerialDisposable::new();
        serial.dispose();
        let d = Disposable::empty();
        serial.replace(d.clone());
        assert!(d.is_disposed());
    }

    #[test]
    fn composite_disposable_disposes_all_members() {
        let composite = CompositeDisposable::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let l = log.clone();
            composite.add(Disposable::new(move || l.lock().push(i)));
        }
        assert_eq!(composite.len(), 3);
        composite.dispose();
        let mut values = log.lock().clone();
        values.sort();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[test]
    fn composite_disposable_remove_without_dispose() {
        let composite = CompositeDisposable::new();
        let disposed = Arc::new(AtomicBool::new(false));
        let flag = disposed.clone();
        let id = composite.add(Disposable::new(move || flag.store(true, Ordering::SeqCst)));
        composite.remove(id);
        composite.dispose();
        assert!(!disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn generation_token_invalidates_stale_generations() {
        let token = GenerationToken::new();
        let g1 = token.advance();
        let g2 = token.advance();
        assert!(!token.is_current(g1));
        assert!(token.is_current(g2));
    }
}
