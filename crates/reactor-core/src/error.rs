//! Error taxonomy for the reactive contract.
//!
//! `ReactorError` is the envelope that flows downstream as the payload of an
//! `Error` signal. It carries a stable `code`, a human message, an optional
//! boxed cause, and a [`ErrorKind`] classifying which of the four taxonomy
//! buckets produced it. Contract-violation kinds that never reach an
//! `Observer` (because there is nowhere left to deliver them) are modeled as
//! dedicated `thiserror` leaf enums and routed to the process-wide error sink
//! instead (see [`crate::hooks`]).

use std::error::Error as StdError;
use std::fmt;

/// Classifies a [`ReactorError`] by which error-taxonomy bucket produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Raised by the producer itself (user code inside `create`, I/O failure).
    SourceError,
    /// Raised by a user callback (mapper, predicate, accumulator, ...).
    OperatorError,
    /// A signal arrived after a terminal, or similarly disallowed by the contract.
    ContractViolation,
    /// Produced by the `timeout` operator when no value arrives in time.
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::SourceError => "source_error",
            ErrorKind::OperatorError => "operator_error",
            ErrorKind::ContractViolation => "contract_violation",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// The error type that flows through `Observer::on_error`.
///
/// Builder-style, in the vein of a stable-code-plus-cause envelope: construct
/// with [`ReactorError::new`], then layer on [`ReactorError::with_cause`] /
/// [`ReactorError::with_kind`].
#[derive(Debug)]
pub struct ReactorError {
    code: &'static str,
    message: String,
    kind: ErrorKind,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ReactorError {
    pub fn new(code: &'static str, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            code,
            message: message.into(),
            kind,
            cause: None,
        }
    }

    /// Shorthand for the common case of wrapping a user callback panic/error
    /// as an `OperatorError`.
    pub fn operator(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::OperatorError)
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.code, self.message)
    }
}

impl StdError for ReactorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

/// Contract violations that have no downstream observer left to receive them
/// (signal-after-terminal, second subscription to a single-shot source,
/// ERROR-strategy backpressure overflow, ...). These are routed to the
/// process-wide [`crate::hooks::ErrorSink`] rather than surfaced as a Signal.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ContractViolation {
    #[error("onNext/onError/onComplete delivered to an observer that had no error callback and nowhere to route the error")]
    OnErrorNotImplemented,

    #[error("producer emitted without an outstanding request under the ERROR overflow strategy")]
    MissingBackpressure,

    #[error("signal could not be delivered to its destination (terminal already reached, or destination disposed): {reason}")]
    Undeliverable { reason: String },

    #[error("operation timed out after {0:?}")]
    TimeoutElapsed(std::time::Duration),

    #[error("scheduler does not support this operation: {0}")]
    UnsupportedOperation(&'static str),
}
