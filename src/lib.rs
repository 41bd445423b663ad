//! Thunklet: a single-shot deferred-result primitive with cancellation.
//!
//! # Overview
//!
//! A [`Thunk`] is a container for one eventual outcome, created before the
//! outcome exists. It is settled exactly once through a [`Settle`] handle,
//! observed by any number of listeners, and optionally cancelled before
//! settlement. Adapters lift promise-like sources and callback-style APIs
//! into the same primitive.
//!
//! # Core Guarantees
//!
//! - **First write wins**: the first settlement is memoized forever; later
//!   attempts are silently discarded
//! - **Ordered, single drain**: pre-settlement listeners run in registration
//!   order, exactly once, within the settling call
//! - **Identity delivery**: every listener observes the same memoized
//!   settlement allocation
//! - **Error isolation**: a panicking listener never disturbs the others;
//!   its panic re-raises on a later turn
//! - **Loud failures**: an error settlement nobody observes escalates on a
//!   later turn instead of vanishing
//! - **Explicit configuration**: diagnostics capture is a passed-in value,
//!   never ambient environment state
//!
//! # Module Structure
//!
//! - [`thunk`]: The deferred primitive, settle handle, and builder
//! - [`outcome`]: Settlement types (success, error, converted panic)
//! - [`turn`]: Turn queue for deferred work (escalation, panic re-raise)
//! - [`request`]: Typed request dispatch and the string command surface
//! - [`adapt`]: Promise-like sources and the closed `to_thunk` input set
//! - [`table`]: Callback-API wrapping, single functions and method tables
//! - [`config`]: Diagnostics configuration
//! - [`origin`]: Construction backtraces for escalation messages
//! - [`error`]: Handle misuse errors
//! - [`test_utils`]: Shared helpers for tests
//!
//! # Example
//!
//! ```
//! use thunklet::Thunk;
//!
//! let thunk: Thunk<String, String> = Thunk::cancellable(
//!     |settle| {
//!         settle.ok("ready".to_string());
//!     },
//!     || {},
//! );
//!
//! assert_eq!(thunk.value(), Some("ready".to_string()));
//! // Already settled: cancel reports that it changed nothing.
//! assert_eq!(thunk.cancel(), Ok(false));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]

pub mod adapt;
pub mod config;
pub mod error;
pub mod origin;
pub mod outcome;
pub mod request;
pub mod table;
pub mod test_utils;
pub mod thunk;
pub mod turn;

// Re-exports for convenient access to core types
pub use adapt::{from_promise, to_thunk, PromiseLike, Source};
pub use config::{init_trace_config, trace_config, OriginCapture, TraceConfig};
pub use error::ThunkError;
pub use origin::OriginTrace;
pub use outcome::{PanicPayload, SettleError, Settlement};
pub use request::{Query, Reply, Request};
pub use table::{thunkify, thunkify_with, CallbackTable, ThunkTable};
pub use thunk::{Settle, Thunk, ThunkBuilder};
pub use turn::TurnQueue;
