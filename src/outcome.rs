//! Settlement types for the deferred primitive.
//!
//! A thunk settles exactly once with a [`Settlement`]: either a success value
//! or a [`SettleError`]. The error side distinguishes:
//!
//! - `Err(E)`: an application error handed to the settle handle
//! - `Panicked(PanicPayload)`: an initializer or adapter panic converted
//!   into a settlement
//!
//! Cancellation is not a settlement; a cancelled thunk never stores an
//! outcome.

use core::fmt;

/// Payload from a caught panic.
///
/// This wraps the panic value for safe transport to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a new panic payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a message from a raw panic payload.
    ///
    /// String and `&str` payloads are preserved; anything else becomes a
    /// placeholder message.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

/// The failure side of a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleError<E> {
    /// Application-level error.
    Err(E),
    /// An initializer or adapter panicked.
    Panicked(PanicPayload),
}

impl<E> SettleError<E> {
    /// Returns true if this is an application error.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Returns true if this records a converted panic.
    #[must_use]
    pub const fn is_panicked(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Returns the application error, if that is what this carries.
    #[must_use]
    pub const fn error(&self) -> Option<&E> {
        match self {
            Self::Err(e) => Some(e),
            Self::Panicked(_) => None,
        }
    }

    /// Maps the application error using the provided function.
    pub fn map<F, G: FnOnce(E) -> F>(self, g: G) -> SettleError<F> {
        match self {
            Self::Err(e) => SettleError::Err(g(e)),
            Self::Panicked(p) => SettleError::Panicked(p),
        }
    }
}

impl<E: fmt::Display> fmt::Display for SettleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Err(e) => write!(f, "{e}"),
            Self::Panicked(p) => write!(f, "{p}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for SettleError<E> {}

/// The memoized terminal outcome of a thunk.
///
/// Multi-value successes use tuples for `T`. All listeners of one thunk
/// observe the same settlement allocation.
pub type Settlement<T, E> = Result<T, SettleError<E>>;
