//! The single-shot deferred-result primitive.
//!
//! A [`Thunk`] is a container for one eventual [`Settlement`], created before
//! the outcome exists and settled exactly once:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        THUNK LIFECYCLE                       │
//! │                                                              │
//! │                 settle.ok / settle.err                       │
//! │   Pending ───────────────────────────────► Settled (final)   │
//! │      │                                                       │
//! │      │  cancel()                                             │
//! │      └───────────────────────────────────► Cancelled (final) │
//! │                                                              │
//! │   Later settles: silently discarded.                         │
//! │   Listeners: drained once, in order, at settlement;          │
//! │   attached-after-settlement runs inline; cleared on cancel.  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Listeners, cancel hooks, and initializers always run with the internal
//! lock released, so re-entrant calls from inside a listener are legal.
//!
//! # Example
//!
//! ```
//! use thunklet::Thunk;
//!
//! let thunk: Thunk<i32, String> = Thunk::new(|settle| {
//!     settle.ok(41 + 1);
//! });
//! assert!(thunk.is_settled());
//! assert_eq!(thunk.value(), Some(42));
//! ```

use crate::config::{self, OriginCapture};
use crate::error::ThunkError;
use crate::origin::OriginTrace;
use crate::outcome::{PanicPayload, SettleError, Settlement};
use crate::turn::{self, TurnQueue};
use smallvec::SmallVec;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

type Listener<T, E> = Box<dyn FnOnce(&Settlement<T, E>) + Send + 'static>;
type CancelHook = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle phase. `Settled` owns the memoized outcome so a settled thunk
/// without an outcome is unrepresentable.
enum Phase<T, E> {
    Pending,
    Settled(Arc<Settlement<T, E>>),
    Cancelled,
}

impl<T, E> Phase<T, E> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settled(_) => "settled",
            Self::Cancelled => "cancelled",
        }
    }
}

struct State<T, E> {
    phase: Phase<T, E>,
    listeners: SmallVec<[Listener<T, E>; 2]>,
    cancel_hook: Option<CancelHook>,
    /// Construction-time capability; survives hook consumption.
    cancellable: bool,
    /// True once any listener has ever attached; gates escalation.
    observed: bool,
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    queue: Arc<TurnQueue>,
    origin: Option<OriginTrace>,
}

impl<T, E> Shared<T, E> {
    fn lock_state(&self) -> MutexGuard<'_, State<T, E>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T, E> Shared<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    /// Runs one listener outside the lock, isolating its panics.
    ///
    /// A panicking listener never disturbs later listeners or the thunk;
    /// its payload re-raises on a later turn instead.
    fn deliver(&self, listener: Listener<T, E>, outcome: &Settlement<T, E>) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(outcome))) {
            warn!("listener panicked; re-raising on a later turn");
            self.queue.defer(move || resume_unwind(payload));
        }
    }
}

/// Writes the first settlement, drains listeners, and schedules escalation
/// for unobserved errors. Returns whether this call won the write.
fn settle_shared<T, E>(shared: &Arc<Shared<T, E>>, settlement: Settlement<T, E>) -> bool
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    let outcome = Arc::new(settlement);
    let (listeners, escalate) = {
        let mut state = shared.lock_state();
        match state.phase {
            Phase::Pending => {}
            Phase::Settled(_) => {
                trace!("settlement discarded: already settled");
                return false;
            }
            Phase::Cancelled => {
                warn!("settlement discarded: thunk cancelled");
                return false;
            }
        }
        state.phase = Phase::Settled(Arc::clone(&outcome));
        let listeners = std::mem::take(&mut state.listeners);
        (listeners, outcome.is_err() && !state.observed)
    };

    debug!(
        listeners = listeners.len(),
        ok = outcome.is_ok(),
        "thunk settled"
    );
    for listener in listeners {
        shared.deliver(listener, &outcome);
    }
    if escalate {
        let target = Arc::clone(shared);
        shared
            .queue
            .defer(move || escalate_if_unobserved(&target));
    }
    true
}

/// Deferred job: re-raise an error settlement that nobody ever observed.
///
/// Runs one turn after settlement; a listener attached in between clears
/// the condition and the job does nothing.
fn escalate_if_unobserved<T, E>(shared: &Shared<T, E>)
where
    E: fmt::Debug,
{
    let outcome = {
        let state = shared.lock_state();
        if state.observed {
            return;
        }
        match &state.phase {
            Phase::Settled(outcome) if outcome.is_err() => Arc::clone(outcome),
            _ => return,
        }
    };
    let Err(error) = outcome.as_ref() else {
        return;
    };
    let mut message = format!("unobserved thunk error: {error:?}");
    if let Some(origin) = &shared.origin {
        message.push_str("\norigin:\n");
        message.push_str(&origin.render());
    }
    tracing::error!("{message}");
    panic!("{message}");
}

/// Handle to a single-shot deferred result.
///
/// Clones share the same underlying state; any clone may attach listeners,
/// query, or cancel.
pub struct Thunk<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Thunk<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for Thunk<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Thunk")
            .field("phase", &state.phase.name())
            .field("listeners", &state.listeners.len())
            .field("cancellable", &state.cancellable)
            .finish_non_exhaustive()
    }
}

impl<T, E> Thunk<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    /// Creates an uncancellable thunk and runs `init` with its settle handle
    /// before returning.
    ///
    /// A panic inside `init` is caught and becomes an error settlement,
    /// unless `init` already settled the thunk; the first settlement always
    /// stands.
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce(Settle<T, E>),
    {
        ThunkBuilder::new().spawn(init)
    }

    /// Creates a cancellable thunk: `hook` runs if the thunk is cancelled
    /// before settlement.
    pub fn cancellable<F, H>(init: F, hook: H) -> Self
    where
        F: FnOnce(Settle<T, E>),
        H: FnOnce() + Send + 'static,
    {
        ThunkBuilder::new().spawn_cancellable(init, hook)
    }

    /// Creates a thunk already settled with `settlement`.
    ///
    /// An error settlement still escalates if nothing observes it.
    pub fn settled(settlement: Settlement<T, E>) -> Self {
        ThunkBuilder::new().spawn(move |settle| {
            settle.settle(settlement);
        })
    }

    /// Returns a builder for explicit queue or diagnostics configuration.
    #[must_use]
    pub fn builder() -> ThunkBuilder {
        ThunkBuilder::new()
    }

    /// Attaches a listener for the settlement.
    ///
    /// Pending: the listener joins the registry and runs, in registration
    /// order, when the thunk settles. Settled: the listener runs inline
    /// before this call returns, with the memoized outcome.
    ///
    /// # Errors
    ///
    /// [`ThunkError::AfterCancellation`] if the thunk was cancelled; the
    /// listener is dropped uninvoked.
    pub fn observe<F>(&self, listener: F) -> Result<(), ThunkError>
    where
        F: FnOnce(&Settlement<T, E>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.shared.lock_state();
            match &state.phase {
                Phase::Cancelled => return Err(ThunkError::AfterCancellation),
                Phase::Pending => {
                    state.observed = true;
                    state.listeners.push(Box::new(listener));
                    trace!(pending = state.listeners.len(), "listener attached");
                    return Ok(());
                }
                Phase::Settled(outcome) => {
                    let outcome = Arc::clone(outcome);
                    state.observed = true;
                    outcome
                }
            }
        };
        trace!("late listener delivered inline");
        self.shared.deliver(Box::new(listener), &outcome);
        Ok(())
    }

    /// Attaches a success/failure listener pair.
    ///
    /// Exactly one of the two runs, under the same rules as [`observe`].
    ///
    /// # Errors
    ///
    /// [`ThunkError::AfterCancellation`] if the thunk was cancelled.
    ///
    /// [`observe`]: Thunk::observe
    pub fn subscribe<OkF, ErrF>(&self, on_ok: OkF, on_err: ErrF) -> Result<(), ThunkError>
    where
        OkF: FnOnce(&T) + Send + 'static,
        ErrF: FnOnce(&SettleError<E>) + Send + 'static,
    {
        self.observe(move |settlement| match settlement {
            Ok(value) => on_ok(value),
            Err(error) => on_err(error),
        })
    }

    /// Cancels a pending thunk.
    ///
    /// Returns `Ok(true)` if this call performed the cancellation: the
    /// registry is discarded and the cancel hook runs (a hook panic
    /// propagates to this caller; the thunk stays cancelled). Returns
    /// `Ok(false)` if the thunk had already settled or been cancelled.
    /// Settlement attempts after cancellation are silently discarded.
    ///
    /// # Errors
    ///
    /// [`ThunkError::NotCancellable`] if no hook was installed at
    /// construction, regardless of phase.
    pub fn cancel(&self) -> Result<bool, ThunkError> {
        let hook = {
            let mut state = self.shared.lock_state();
            if !state.cancellable {
                return Err(ThunkError::NotCancellable);
            }
            match state.phase {
                Phase::Settled(_) | Phase::Cancelled => return Ok(false),
                Phase::Pending => {}
            }
            state.phase = Phase::Cancelled;
            state.listeners.clear();
            state.cancel_hook.take()
        };
        debug!("thunk cancelled");
        if let Some(hook) = hook {
            hook();
        }
        Ok(true)
    }

    /// Returns true if the thunk has settled (not cancelled).
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self.shared.lock_state().phase, Phase::Settled(_))
    }

    /// Returns true if the thunk was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.shared.lock_state().phase, Phase::Cancelled)
    }

    /// Returns true if a cancel hook was installed at construction.
    ///
    /// This reports the capability, not whether [`cancel`](Thunk::cancel)
    /// would currently return `Ok(true)`.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.shared.lock_state().cancellable
    }

    /// Returns the memoized settlement, shared with every listener.
    ///
    /// `None` while pending or after cancellation.
    #[must_use]
    pub fn outcome(&self) -> Option<Arc<Settlement<T, E>>> {
        match &self.shared.lock_state().phase {
            Phase::Settled(outcome) => Some(Arc::clone(outcome)),
            _ => None,
        }
    }

    /// Returns a copy of the success value, if settled successfully.
    #[must_use]
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.outcome()
            .and_then(|outcome| outcome.as_ref().as_ref().ok().cloned())
    }

    /// Returns a copy of the application error, if settled with one.
    ///
    /// `None` for success, panic settlements, pending, and cancelled.
    #[must_use]
    pub fn error(&self) -> Option<E>
    where
        E: Clone,
    {
        self.outcome().and_then(|outcome| match outcome.as_ref() {
            Err(SettleError::Err(error)) => Some(error.clone()),
            _ => None,
        })
    }

    /// Returns the origin trace captured at construction, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&OriginTrace> {
        self.shared.origin.as_ref()
    }
}

/// Settle handle passed to initializers.
///
/// Clones target the same thunk; the first settlement through any clone
/// wins and every later attempt reports `false`.
pub struct Settle<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Settle<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for Settle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("phase", &self.shared.lock_state().phase.name())
            .finish_non_exhaustive()
    }
}

impl<T, E> Settle<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    /// Settles with a success value. Returns whether this call won the
    /// write; `false` settlements are discarded.
    pub fn ok(&self, value: T) -> bool {
        settle_shared(&self.shared, Ok(value))
    }

    /// Settles with an application error. Returns whether this call won the
    /// write.
    pub fn err(&self, error: E) -> bool {
        settle_shared(&self.shared, Err(SettleError::Err(error)))
    }

    /// Settles with an explicit settlement. Returns whether this call won
    /// the write.
    pub fn settle(&self, settlement: Settlement<T, E>) -> bool {
        settle_shared(&self.shared, settlement)
    }

    /// Returns a thunk handle to the same underlying state.
    ///
    /// Lets initializers wire self-cancellation or inspect phase without
    /// holding a second handle from the caller.
    #[must_use]
    pub fn handle(&self) -> Thunk<T, E> {
        Thunk {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Builder for thunks with an explicit queue or diagnostics override.
///
/// Defaults: the process-wide turn queue and the process-wide
/// [`TraceConfig`](crate::TraceConfig) capture mode. Clones share the queue
/// handle, so one builder can serve as a template.
#[derive(Default, Clone)]
pub struct ThunkBuilder {
    queue: Option<Arc<TurnQueue>>,
    origin_capture: Option<OriginCapture>,
}

impl fmt::Debug for ThunkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThunkBuilder")
            .field("queue", &self.queue.is_some())
            .field("origin_capture", &self.origin_capture)
            .finish()
    }
}

impl ThunkBuilder {
    /// Creates a builder with process-wide defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defers this thunk's scheduled work to `queue` instead of the
    /// process-wide queue.
    #[must_use]
    pub fn queue(mut self, queue: Arc<TurnQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Overrides the origin-capture mode for this thunk.
    #[must_use]
    pub fn origin_capture(mut self, mode: OriginCapture) -> Self {
        self.origin_capture = Some(mode);
        self
    }

    /// Builds an uncancellable thunk and runs `init`.
    pub fn spawn<T, E, F>(self, init: F) -> Thunk<T, E>
    where
        T: Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
        F: FnOnce(Settle<T, E>),
    {
        let thunk = self.construct::<T, E>(None);
        run_init(&thunk, init);
        thunk
    }

    /// Builds a cancellable thunk and runs `init`.
    pub fn spawn_cancellable<T, E, F, H>(self, init: F, hook: H) -> Thunk<T, E>
    where
        T: Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
        F: FnOnce(Settle<T, E>),
        H: FnOnce() + Send + 'static,
    {
        let thunk = self.construct::<T, E>(Some(Box::new(hook)));
        run_init(&thunk, init);
        thunk
    }

    fn construct<T, E>(self, hook: Option<CancelHook>) -> Thunk<T, E> {
        let mode = self
            .origin_capture
            .unwrap_or_else(|| config::trace_config().origin_capture);
        let cancellable = hook.is_some();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                phase: Phase::Pending,
                listeners: SmallVec::new(),
                cancel_hook: hook,
                cancellable,
                observed: false,
            }),
            queue: self.queue.unwrap_or_else(turn::shared),
            origin: OriginTrace::capture(mode),
        });
        debug!(cancellable, origin = ?mode, "thunk created");
        Thunk { shared }
    }
}

/// Runs the initializer, converting a panic into an error settlement.
fn run_init<T, E, F>(thunk: &Thunk<T, E>, init: F)
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
    F: FnOnce(Settle<T, E>),
{
    let settle = Settle {
        shared: Arc::clone(&thunk.shared),
    };
    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || init(settle))) {
        let panic = PanicPayload::from_panic(payload.as_ref());
        let converted = settle_shared(&thunk.shared, Err(SettleError::Panicked(panic.clone())));
        if converted {
            debug!(%panic, "initializer panic converted to settlement");
        } else {
            warn!(%panic, "initializer panicked after settlement; payload dropped");
        }
    }
}
