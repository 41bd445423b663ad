//! Caller-facing errors for misuse of the thunk handle.
//!
//! Settlement failures travel inside [`Settlement`](crate::Settlement); this
//! module only covers operations that are invalid for the handle's current
//! state or input.

use thiserror::Error;

/// Errors returned by thunk handle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThunkError {
    /// `cancel` was called on a thunk constructed without a cancel hook.
    ///
    /// Reported even when the thunk has already settled: cancellability is a
    /// construction-time capability, and asking an uncancellable thunk to
    /// cancel is a caller bug regardless of phase.
    #[error("this thunk is uncancellable")]
    NotCancellable,

    /// A listener was attached after cancellation.
    ///
    /// A cancelled thunk has discarded its registry and will never deliver,
    /// so the listener would silently leak. Attaching after settlement is
    /// fine and delivers inline.
    #[error("cannot listen after cancellation")]
    AfterCancellation,

    /// A string command was not recognized.
    #[error(
        "`{0}` is not a valid command (isDone, isCancelled, isCancellable, \
         getValue, getError, cancel)"
    )]
    InvalidCommand(String),

    /// A table invocation named a method that was never registered.
    #[error("no such method: `{0}`")]
    UnknownMethod(String),
}

impl ThunkError {
    /// Returns true if this error indicates a rejected attach.
    #[must_use]
    pub const fn is_after_cancellation(&self) -> bool {
        matches!(self, Self::AfterCancellation)
    }
}
