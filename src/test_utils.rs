//! Test utilities for thunklet.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Pending thunk constructors that expose the settle handle
//! - Settlement assertion macros
//!
//! # Example
//! ```
//! use thunklet::test_utils::{init_test_logging, pending_pair};
//!
//! init_test_logging();
//! let (thunk, settle) = pending_pair::<i32, String>();
//! settle.ok(1);
//! assert_eq!(thunk.value(), Some(1));
//! ```

use crate::thunk::{Settle, Thunk, ThunkBuilder};
use crate::turn::TurnQueue;
use std::fmt;
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests.
pub const DEFAULT_TEST_SEED: u64 = 0xDEAD_BEEF;

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Creates a fresh manual turn queue.
#[must_use]
pub fn test_queue() -> Arc<TurnQueue> {
    Arc::new(TurnQueue::new())
}

/// Creates a pending thunk together with its settle handle.
///
/// The initializer stashes the handle instead of settling, which is the
/// setup nearly every asynchronous-settlement test starts from.
#[must_use]
pub fn pending_pair<T, E>() -> (Thunk<T, E>, Settle<T, E>)
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    pending_pair_with(ThunkBuilder::new())
}

/// [`pending_pair`] on an explicit manual queue.
#[must_use]
pub fn pending_pair_on<T, E>(queue: &Arc<TurnQueue>) -> (Thunk<T, E>, Settle<T, E>)
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    pending_pair_with(ThunkBuilder::new().queue(Arc::clone(queue)))
}

/// [`pending_pair`] built from an explicit builder.
#[must_use]
pub fn pending_pair_with<T, E>(builder: ThunkBuilder) -> (Thunk<T, E>, Settle<T, E>)
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    let slot = Arc::new(parking_lot::Mutex::new(None));
    let stash = Arc::clone(&slot);
    let thunk = builder.spawn(move |settle| {
        *stash.lock() = Some(settle);
    });
    let settle = slot
        .lock()
        .take()
        .expect("initializer always stashes the settle handle");
    (thunk, settle)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that a thunk settled successfully with a specific value.
#[macro_export]
macro_rules! assert_settled_ok {
    ($thunk:expr, $expected:expr) => {
        match $thunk.outcome() {
            Some(outcome) => match outcome.as_ref() {
                Ok(value) => assert_eq!(*value, $expected),
                other => unreachable!("expected Ok({:?}), got {:?}", $expected, other),
            },
            None => unreachable!("expected a settled thunk, got {:?}", $thunk),
        }
    };
}

/// Assert that a thunk settled with an application error.
#[macro_export]
macro_rules! assert_settled_err {
    ($thunk:expr) => {
        match $thunk.outcome() {
            Some(outcome) => match outcome.as_ref() {
                Err($crate::SettleError::Err(_)) => {}
                other => unreachable!("expected an error settlement, got {:?}", other),
            },
            None => unreachable!("expected a settled thunk, got {:?}", $thunk),
        }
    };
    ($thunk:expr, $expected:expr) => {
        match $thunk.outcome() {
            Some(outcome) => match outcome.as_ref() {
                Err($crate::SettleError::Err(error)) => assert_eq!(*error, $expected),
                other => unreachable!("expected Err({:?}), got {:?}", $expected, other),
            },
            None => unreachable!("expected a settled thunk, got {:?}", $thunk),
        }
    };
}

/// Assert that a thunk settled from a converted panic.
#[macro_export]
macro_rules! assert_settled_panicked {
    ($thunk:expr) => {
        match $thunk.outcome() {
            Some(outcome) => match outcome.as_ref() {
                Err($crate::SettleError::Panicked(_)) => {}
                other => unreachable!("expected a panic settlement, got {:?}", other),
            },
            None => unreachable!("expected a settled thunk, got {:?}", $thunk),
        }
    };
}
