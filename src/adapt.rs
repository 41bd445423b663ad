//! Adapters lifting foreign asynchronous sources into thunks.
//!
//! The input universe is the closed [`Source`] set: an existing thunk, a
//! promise-like subscription, a callback-style initializer, or a described
//! invalid input. [`to_thunk`] is total over it; nothing sniffs shapes at
//! run time.

use crate::outcome::{PanicPayload, SettleError};
use crate::thunk::{Settle, Thunk, ThunkBuilder};
use std::fmt;
use tracing::debug;

/// Minimal promise contract: one subscription, two continuations.
///
/// Exactly one continuation should eventually run; a source that fires both
/// (or fires one twice) is tolerated, with everything after the first fire
/// discarded by the thunk's first-write-wins rule.
///
/// # Example
///
/// ```
/// use thunklet::{from_promise, PromiseLike};
///
/// struct Ready(i32);
///
/// impl PromiseLike<i32, String> for Ready {
///     fn subscribe(
///         self: Box<Self>,
///         on_ok: Box<dyn FnOnce(i32) + Send>,
///         on_err: Box<dyn FnOnce(String) + Send>,
///     ) {
///         let _ = on_err;
///         on_ok(self.0);
///     }
/// }
///
/// let thunk = from_promise(Ready(2));
/// assert_eq!(thunk.value(), Some(2));
/// ```
pub trait PromiseLike<T, E> {
    /// Registers the continuations.
    fn subscribe(
        self: Box<Self>,
        on_ok: Box<dyn FnOnce(T) + Send>,
        on_err: Box<dyn FnOnce(E) + Send>,
    );
}

/// A settled or settling thunk is itself promise-like; its rejection type
/// widens to [`SettleError`] so panic settlements survive the round trip.
///
/// A cancelled thunk fires neither continuation.
impl<T, E> PromiseLike<T, SettleError<E>> for Thunk<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn subscribe(
        self: Box<Self>,
        on_ok: Box<dyn FnOnce(T) + Send>,
        on_err: Box<dyn FnOnce(SettleError<E>) + Send>,
    ) {
        let attached = self.observe(move |settlement| match settlement {
            Ok(value) => on_ok(value.clone()),
            Err(error) => on_err(error.clone()),
        });
        if attached.is_err() {
            debug!("subscribed to a cancelled thunk; continuations dropped");
        }
    }
}

/// The closed set of inputs [`to_thunk`] accepts.
pub enum Source<T, E> {
    /// An existing thunk; passes through unchanged.
    Thunk(Thunk<T, E>),
    /// A promise-like source.
    Promise(Box<dyn PromiseLike<T, E> + Send>),
    /// A callback-style initializer for a fresh thunk.
    Callback(Box<dyn FnOnce(Settle<T, E>) + Send>),
    /// A rejected input, described for the error settlement.
    Invalid(String),
}

impl<T, E> fmt::Debug for Source<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thunk(_) => f.write_str("Source::Thunk"),
            Self::Promise(_) => f.write_str("Source::Promise"),
            Self::Callback(_) => f.write_str("Source::Callback"),
            Self::Invalid(description) => write!(f, "Source::Invalid({description:?})"),
        }
    }
}

impl<T, E> Source<T, E> {
    /// Wraps a promise-like source.
    pub fn promise(promise: impl PromiseLike<T, E> + Send + 'static) -> Self {
        Self::Promise(Box::new(promise))
    }

    /// Wraps a callback-style initializer.
    pub fn callback(init: impl FnOnce(Settle<T, E>) + Send + 'static) -> Self {
        Self::Callback(Box::new(init))
    }

    /// Describes an input outside the accepted set.
    pub fn invalid(description: impl Into<String>) -> Self {
        Self::Invalid(description.into())
    }
}

impl<T, E> From<Thunk<T, E>> for Source<T, E> {
    fn from(thunk: Thunk<T, E>) -> Self {
        Self::Thunk(thunk)
    }
}

impl ThunkBuilder {
    /// Lifts a source into a thunk built with this builder's configuration.
    ///
    /// An existing [`Source::Thunk`] passes through untouched and keeps its
    /// own construction-time configuration.
    pub fn adopt<T, E>(self, source: Source<T, E>) -> Thunk<T, E>
    where
        T: Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
    {
        match source {
            Source::Thunk(thunk) => thunk,
            Source::Promise(promise) => self.spawn(move |settle| {
                let accept = settle.clone();
                promise.subscribe(
                    Box::new(move |value| {
                        accept.ok(value);
                    }),
                    Box::new(move |error| {
                        settle.err(error);
                    }),
                );
            }),
            Source::Callback(init) => self.spawn(init),
            Source::Invalid(description) => self.spawn(move |settle| {
                settle.settle(Err(SettleError::Panicked(PanicPayload::new(format!(
                    "{description} is not a thunk, callback, or promise"
                )))));
            }),
        }
    }
}

/// Lifts any accepted source into a thunk. Total: invalid inputs become a
/// thunk already settled with a diagnostic error.
pub fn to_thunk<T, E>(source: Source<T, E>) -> Thunk<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    ThunkBuilder::new().adopt(source)
}

/// Creates a thunk that settles from the promise's first continuation fire.
pub fn from_promise<T, E, P>(promise: P) -> Thunk<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
    P: PromiseLike<T, E> + Send + 'static,
{
    to_thunk(Source::promise(promise))
}
