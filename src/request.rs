//! Typed request dispatch over the thunk surface.
//!
//! Every operation a handle supports is a [`Request`] variant; dispatch is
//! one exhaustive match instead of argument-shape sniffing. The historical
//! string command surface survives as a thin parse layer in front of
//! [`Query`].

use crate::error::ThunkError;
use crate::outcome::{SettleError, Settlement};
use crate::thunk::Thunk;
use std::fmt;
use std::str::FromStr;

/// A read-only query against a thunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Has the thunk settled? Cancellation does not count.
    IsSettled,
    /// Was the thunk cancelled?
    IsCancelled,
    /// Was a cancel hook installed at construction?
    IsCancellable,
    /// The settled success value, if any.
    Value,
    /// The settled application error, if any.
    Error,
}

/// Parses the historical command strings.
///
/// `"isDone"` maps to [`Query::IsSettled`]. `"cancel"` is not a query; use
/// [`Thunk::command`] for the full string surface.
impl FromStr for Query {
    type Err = ThunkError;

    fn from_str(command: &str) -> Result<Self, Self::Err> {
        match command {
            "isDone" => Ok(Self::IsSettled),
            "isCancelled" => Ok(Self::IsCancelled),
            "isCancellable" => Ok(Self::IsCancellable),
            "getValue" => Ok(Self::Value),
            "getError" => Ok(Self::Error),
            other => Err(ThunkError::InvalidCommand(other.to_string())),
        }
    }
}

/// A request against a thunk.
pub enum Request<T, E> {
    /// Attach a settlement listener.
    Attach(Box<dyn FnOnce(&Settlement<T, E>) + Send>),
    /// Attach a success/failure listener pair.
    AttachPair {
        /// Runs for a success settlement.
        on_ok: Box<dyn FnOnce(&T) + Send>,
        /// Runs for any failure settlement.
        on_err: Box<dyn FnOnce(&SettleError<E>) + Send>,
    },
    /// Cancel the thunk.
    Cancel,
    /// Read-only query.
    Query(Query),
}

impl<T, E> fmt::Debug for Request<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attach(_) => f.write_str("Request::Attach"),
            Self::AttachPair { .. } => f.write_str("Request::AttachPair"),
            Self::Cancel => f.write_str("Request::Cancel"),
            Self::Query(query) => write!(f, "Request::Query({query:?})"),
        }
    }
}

/// Reply to a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T, E> {
    /// The listener was attached, or delivered inline if already settled.
    Attached,
    /// Whether the cancel request performed the cancellation.
    Cancelled(bool),
    /// Boolean query result.
    Flag(bool),
    /// Success value query result.
    Value(Option<T>),
    /// Application error query result.
    Error(Option<E>),
}

impl<T, E> Thunk<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Dispatches one request.
    ///
    /// # Errors
    ///
    /// Attach requests fail with [`ThunkError::AfterCancellation`] on a
    /// cancelled thunk; [`Request::Cancel`] fails with
    /// [`ThunkError::NotCancellable`] on a thunk without a hook.
    pub fn dispatch(&self, request: Request<T, E>) -> Result<Reply<T, E>, ThunkError> {
        match request {
            Request::Attach(listener) => {
                self.observe(listener)?;
                Ok(Reply::Attached)
            }
            Request::AttachPair { on_ok, on_err } => {
                self.subscribe(on_ok, on_err)?;
                Ok(Reply::Attached)
            }
            Request::Cancel => Ok(Reply::Cancelled(self.cancel()?)),
            Request::Query(query) => Ok(match query {
                Query::IsSettled => Reply::Flag(self.is_settled()),
                Query::IsCancelled => Reply::Flag(self.is_cancelled()),
                Query::IsCancellable => Reply::Flag(self.is_cancellable()),
                Query::Value => Reply::Value(self.value()),
                Query::Error => Reply::Error(self.error()),
            }),
        }
    }

    /// Dispatches a string command: `"cancel"` or any [`Query`] string.
    ///
    /// # Errors
    ///
    /// [`ThunkError::InvalidCommand`] for an unrecognized string, plus the
    /// dispatch errors of the resolved request.
    pub fn command(&self, command: &str) -> Result<Reply<T, E>, ThunkError> {
        if command == "cancel" {
            return self.dispatch(Request::Cancel);
        }
        let query = command.parse::<Query>()?;
        self.dispatch(Request::Query(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // =========================================================================
    // Command Parsing Tests
    // =========================================================================

    #[test]
    fn all_command_strings_parse() {
        assert_eq!("isDone".parse::<Query>(), Ok(Query::IsSettled));
        assert_eq!("isCancelled".parse::<Query>(), Ok(Query::IsCancelled));
        assert_eq!("isCancellable".parse::<Query>(), Ok(Query::IsCancellable));
        assert_eq!("getValue".parse::<Query>(), Ok(Query::Value));
        assert_eq!("getError".parse::<Query>(), Ok(Query::Error));
    }

    #[test]
    fn unknown_command_is_rejected_with_the_input() {
        let result = "isBusy".parse::<Query>();
        assert_eq!(result, Err(ThunkError::InvalidCommand("isBusy".into())));
    }

    #[test]
    fn casing_matters() {
        assert!("isdone".parse::<Query>().is_err());
        assert!("IsDone".parse::<Query>().is_err());
    }

    // =========================================================================
    // Dispatch Tests
    // =========================================================================

    #[test]
    fn queries_reflect_a_settled_thunk() {
        let thunk: Thunk<i32, String> = Thunk::new(|settle| {
            settle.ok(5);
        });
        assert_eq!(
            thunk.dispatch(Request::Query(Query::IsSettled)),
            Ok(Reply::Flag(true))
        );
        assert_eq!(
            thunk.dispatch(Request::Query(Query::IsCancelled)),
            Ok(Reply::Flag(false))
        );
        assert_eq!(
            thunk.dispatch(Request::Query(Query::IsCancellable)),
            Ok(Reply::Flag(false))
        );
        assert_eq!(
            thunk.dispatch(Request::Query(Query::Value)),
            Ok(Reply::Value(Some(5)))
        );
        assert_eq!(
            thunk.dispatch(Request::Query(Query::Error)),
            Ok(Reply::Error(None))
        );
    }

    #[test]
    fn attach_request_delivers_inline_when_settled() {
        let thunk: Thunk<i32, String> = Thunk::new(|settle| {
            settle.ok(11);
        });
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let reply = thunk.dispatch(Request::Attach(Box::new(move |settlement| {
            if settlement.as_ref().ok() == Some(&11) {
                s.fetch_add(1, Ordering::SeqCst);
            }
        })));
        assert_eq!(reply, Ok(Reply::Attached));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attach_pair_routes_by_arm() {
        let queue = Arc::new(crate::turn::TurnQueue::new());
        let ok_thunk: Thunk<i32, String> = Thunk::new(|settle| {
            settle.ok(1);
        });
        let err_thunk: Thunk<i32, String> = Thunk::<i32, String>::builder()
            .queue(Arc::clone(&queue))
            .spawn(|settle| {
                settle.err("bad".into());
            });

        let log = Arc::new(PlMutex::new(Vec::new()));
        let l1 = Arc::clone(&log);
        let l2 = Arc::clone(&log);
        ok_thunk
            .dispatch(Request::AttachPair {
                on_ok: Box::new(move |v| l1.lock().push(format!("ok:{v}"))),
                on_err: Box::new(|_| panic!("wrong arm")),
            })
            .unwrap();
        err_thunk
            .dispatch(Request::AttachPair {
                on_ok: Box::new(|_| panic!("wrong arm")),
                on_err: Box::new(move |e| l2.lock().push(format!("err:{e}"))),
            })
            .unwrap();
        assert_eq!(*log.lock(), vec!["ok:1", "err:bad"]);
    }

    #[test]
    fn cancel_request_and_command() {
        let cancellable: Thunk<i32, String> = Thunk::cancellable(|_| {}, || {});
        assert_eq!(
            cancellable.dispatch(Request::Cancel),
            Ok(Reply::Cancelled(true))
        );
        assert_eq!(cancellable.command("cancel"), Ok(Reply::Cancelled(false)));

        let plain: Thunk<i32, String> = Thunk::new(|_| {});
        assert_eq!(plain.command("cancel"), Err(ThunkError::NotCancellable));
    }

    #[test]
    fn command_surface_round_trip() {
        let queue = Arc::new(crate::turn::TurnQueue::new());
        let thunk: Thunk<i32, String> = Thunk::<i32, String>::builder()
            .queue(Arc::clone(&queue))
            .spawn(|settle| {
                settle.err("broken".into());
            });
        thunk.observe(|_| {}).unwrap();

        assert_eq!(thunk.command("isDone"), Ok(Reply::Flag(true)));
        assert_eq!(thunk.command("isCancelled"), Ok(Reply::Flag(false)));
        assert_eq!(thunk.command("getValue"), Ok(Reply::Value(None)));
        assert_eq!(
            thunk.command("getError"),
            Ok(Reply::Error(Some("broken".into())))
        );
        assert_eq!(
            thunk.command("explode"),
            Err(ThunkError::InvalidCommand("explode".into()))
        );
    }
}
