//! Overflow strategies a [`crate::BackpressureChannel`] applies when a
//! producer emits with no outstanding request.

/// What to do when a producer emits past the downstream's requested count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OverflowStrategy {
    /// Enqueue in an unbounded FIFO. Unbounded growth is the caller's risk.
    #[default]
    Buffer,
    /// Discard the item that just arrived ("DROP_NEWEST").
    Drop,
    /// Drop the oldest buffered item to make room, then enqueue the new one.
    DropOldest,
    /// Replace the most recently buffered item with the new one.
    DropLatest,
    /// Terminate with a `MissingBackpressure` contract violation.
    Error,
}
