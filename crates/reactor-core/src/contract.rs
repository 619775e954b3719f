//! The reactive contract itself: the Observer/Source protocol and the
//! invariants every stage must uphold.
//!
//! * `on_subscribe` is called exactly once, before any other signal.
//! * After `on_error` or `on_complete`, no further signal is delivered.
//! * For a single `Observer` instance, signals are serialized — a stage that
//!   may receive concurrent upstream `Next` (merge, flatMap, a Subject fed by
//!   several threads) must serialize its own downstream dispatch; see
//!   [`crate::serialize::SerializingObserver`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::disposable::Disposable;
use crate::error::{ErrorKind, ReactorError};

/// The atomic output of a [`Source`]: `Next` any number of times, then at
/// most one of `Error`/`Complete`.
#[derive(Debug, Clone)]
pub enum Signal<T, E> {
    Next(T),
    Error(E),
    Complete,
}

impl<T, E> Signal<T, E> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Next(_))
    }
}

/// A consumer with the four contract entry points. Implementations are
/// expected to handle their own interior mutability: the trait takes `&self`
/// so a single `Arc<dyn Observer<T, E>>` can be shared across a Subject's
/// subscriber set or a merge operator's fan-in, with each stage responsible
/// for whatever locking its own fan-in pattern requires.
pub trait Observer<T, E>: Send + Sync {
    fn on_subscribe(&self, disposable: Disposable);
    fn on_next(&self, value: T);
    fn on_error(&self, error: E);
    fn on_complete(&self);
}

/// Type-erased observer handle, used at subject/backpressure boundaries and
/// anywhere operators must hold a downstream without naming its concrete type.
pub type BoxObserver<T, E> = Box<dyn Observer<T, E>>;

/// A polymorphic producer. `subscribe` must synchronously hand a
/// [`Disposable`] to the observer (via `on_subscribe`) before returning;
/// value delivery itself may be synchronous or asynchronous.
///
/// Sources are `&self`-subscribed so the same `Source` value (usually held
/// behind `Arc`) can be subscribed to repeatedly — each call re-runs the
/// production logic, which is what makes a source "cold".
pub trait Source<T, E>: Send + Sync {
    fn subscribe(&self, observer: BoxObserver<T, E>);
}

/// Blanket impl so a boxed/Arc'd dyn Source is itself a Source, letting
/// operators hold `Arc<dyn Source<T, E>>` as their upstream uniformly.
impl<T, E> Source<T, E> for std::sync::Arc<dyn Source<T, E>> {
    fn subscribe(&self, observer: BoxObserver<T, E>) {
        self.as_ref().subscribe(observer);
    }
}

/// Invoke a user-supplied callback, converting a panic into an
/// `ErrorKind::OperatorError`. Operator closures keep the natural
/// `Fn(T) -> U` shape; a stage converts any panic raised inside one into a
/// proper `Error` signal rather than unwinding through the reactive runtime.
pub fn guard_call<R>(code: &'static str, f: impl FnOnce() -> R) -> Result<R, ReactorError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        ReactorError::new(code, panic_message(payload), ErrorKind::OperatorError)
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operator callback panicked".to_string()
    }
}
