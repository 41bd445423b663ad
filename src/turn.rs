//! Turn-based deferred execution.
//!
//! Deferred work (unobserved-error escalation, listener panic re-raise) runs
//! on a [`TurnQueue`]: a FIFO queue drained in turns. One turn runs exactly
//! the jobs that were queued when it started; jobs deferred during a turn
//! wait for the next one. This mirrors the queue-per-tick discipline of
//! cooperative schedulers and keeps "a later turn" testable.
//!
//! The process-wide [`shared`] queue drains continuously on a dedicated pump
//! thread. Tests use private queues and call [`TurnQueue::run_turn`]
//! themselves.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// FIFO queue of deferred jobs, drained in turns.
pub struct TurnQueue {
    state: Mutex<QueueState>,
    work: Condvar,
}

struct QueueState {
    jobs: VecDeque<Job>,
}

impl std::fmt::Debug for TurnQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnQueue")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl TurnQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
            }),
            work: Condvar::new(),
        }
    }

    /// Queues a job for a later turn.
    pub fn defer(&self, job: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        state.jobs.push_back(Box::new(job));
        trace!(pending = state.jobs.len(), "job deferred");
        drop(state);
        self.work.notify_one();
    }

    /// Runs one turn: exactly the jobs queued when the turn started.
    ///
    /// Jobs run outside the queue lock, so they may defer further work; that
    /// work lands in the next turn. Returns the number of jobs run.
    ///
    /// # Panics
    ///
    /// Propagates the first panicking job's panic; jobs not yet started stay
    /// queued for a later turn.
    pub fn run_turn(&self) -> usize {
        let budget = self.state.lock().jobs.len();
        let mut ran = 0;
        for _ in 0..budget {
            let Some(job) = self.state.lock().jobs.pop_front() else {
                break;
            };
            job();
            ran += 1;
        }
        if ran > 0 {
            debug!(ran, "turn complete");
        }
        ran
    }

    /// Runs turns until no jobs remain. Returns the total number run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_turn();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Number of jobs currently queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Returns true if no jobs are queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Blocks until a job is available, then takes it.
    fn wait_pop(&self) -> Job {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return job;
            }
            self.work.wait(&mut state);
        }
    }
}

impl Default for TurnQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the process-wide queue, starting its pump thread on first use.
///
/// Thunks constructed without an explicit queue defer here. The pump runs
/// each job under `catch_unwind`: a panicking job (escalation is one by
/// design of that job, see the thunk module) is reported through the process
/// panic hook at the panic site, and the pump keeps draining afterwards.
pub fn shared() -> Arc<TurnQueue> {
    static SHARED: OnceLock<Arc<TurnQueue>> = OnceLock::new();
    Arc::clone(SHARED.get_or_init(|| {
        let queue = Arc::new(TurnQueue::new());
        let pump = Arc::clone(&queue);
        let spawned = std::thread::Builder::new()
            .name("thunklet-turns".into())
            .spawn(move || pump_loop(&pump));
        if let Err(error) = spawned {
            // Jobs will sit queued until a manual drain; nothing else to do.
            tracing::error!(%error, "failed to spawn turn pump thread");
        }
        queue
    }))
}

fn pump_loop(queue: &TurnQueue) {
    loop {
        let job = queue.wait_pop();
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            // The panic hook already reported it.
            debug!("deferred job panicked");
        }
    }
}
