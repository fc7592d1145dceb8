//! # Per-race bookkeeping and the decision point.
//!
//! [`RaceState`] is owned by the coordinator for the duration of one race and
//! mutated only from its receive loop, which makes [`RaceState::apply`] the
//! single serialization point of the algorithm.
//!
//! ## Transitions
//! ```text
//! apply(delivery)
//!   ├─ decided already          → Discarded (late outcome, no effect)
//!   ├─ Success(r)               → decided = true, winner = pid, Won(r)
//!   └─ Failure(e) / Crashed(x)  → pending -= pid, finished += 1, Counted(fault)
//! ```
//!
//! ## Invariants
//! - `finished <= total`, `pending.len() + finished (+ winner) == total`
//! - `decided` flips false → true exactly once
//! - a winner, once set, is never replaced
//!
//! A delivery for a process that is not pending before the decision means the
//! bookkeeping is broken; that is a programming error and panics.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::core::channel::Delivery;
use crate::core::link::{ExitReason, ProcessId};
use crate::error::{RaceError, WorkerFault};
use crate::workers::Outcome;

/// Coordinator-owned handle to a running worker.
pub struct WorkerHandle {
    pid: ProcessId,
    name: Arc<str>,
    token: CancellationToken,
    abort: Option<AbortHandle>,
}

impl WorkerHandle {
    pub(crate) fn new(
        pid: ProcessId,
        name: Arc<str>,
        token: CancellationToken,
        abort: Option<AbortHandle>,
    ) -> Self {
        Self {
            pid,
            name,
            token,
            abort,
        }
    }

    /// Process id of the worker.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Worker name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Requests cancellation; never waits for the worker to stop.
    ///
    /// With `abort` the worker's task is also aborted at its next await point.
    pub fn cancel(&self, abort: bool) {
        self.token.cancel();
        if abort {
            if let Some(handle) = &self.abort {
                handle.abort();
            }
        }
    }
}

/// Result of folding one delivery into the state.
pub enum Step<R> {
    /// First success: the race is decided in favour of `handle`.
    Won {
        /// Winning response.
        response: R,
        /// Handle of the winning worker, no longer pending.
        handle: WorkerHandle,
    },
    /// A failure or crash was accounted for.
    Counted {
        /// What went wrong.
        fault: WorkerFault,
        /// Handle of the worker, no longer pending.
        handle: WorkerHandle,
    },
    /// The race was already decided; the outcome has no effect.
    Discarded,
}

/// Mutable state of one race.
pub struct RaceState {
    decided: bool,
    finished: usize,
    total: usize,
    winner: Option<ProcessId>,
    pending: HashMap<ProcessId, WorkerHandle>,
    last_fault: Option<WorkerFault>,
}

impl RaceState {
    /// Creates the state for a race over `total` workers.
    pub fn new(total: usize) -> Self {
        Self {
            decided: false,
            finished: 0,
            total,
            winner: None,
            pending: HashMap::with_capacity(total),
            last_fault: None,
        }
    }

    /// Adds a freshly spawned worker to the pending set.
    pub fn track(&mut self, handle: WorkerHandle) {
        assert!(
            self.pending.len() + self.finished < self.total,
            "more workers tracked than the race was sized for"
        );
        self.pending.insert(handle.pid, handle);
    }

    /// The decision point: folds one delivery into the state.
    pub fn apply<R>(&mut self, delivery: Delivery<R>) -> Step<R> {
        if self.decided {
            return Step::Discarded;
        }
        let Delivery { from, outcome } = delivery;
        let handle = match self.pending.remove(&from) {
            Some(handle) => handle,
            None => panic!("delivery from untracked worker {from}"),
        };

        let fault = match outcome {
            Outcome::Success(response) => {
                self.decided = true;
                self.winner = Some(from);
                return Step::Won { response, handle };
            }
            Outcome::Failure(error) => WorkerFault::Failure {
                worker: handle.name.to_string(),
                error,
            },
            Outcome::Crashed(reason) => WorkerFault::Crash {
                worker: handle.name.to_string(),
                reason,
            },
        };

        self.finished += 1;
        assert!(self.finished <= self.total, "finished count overflow");
        self.last_fault = Some(fault.clone());
        Step::Counted { fault, handle }
    }

    /// Accounts every pending worker as killed.
    ///
    /// Used when the result channel closes while workers are still pending,
    /// which only happens when their watcher tasks were torn down.
    pub fn orphan_pending(&mut self) -> Vec<(WorkerFault, WorkerHandle)> {
        let mut out = Vec::with_capacity(self.pending.len());
        for (_, handle) in self.pending.drain() {
            let fault = WorkerFault::Crash {
                worker: handle.name.to_string(),
                reason: ExitReason::Killed,
            };
            self.finished += 1;
            self.last_fault = Some(fault.clone());
            out.push((fault, handle));
        }
        out
    }

    /// Marks the race decided without a winner (timeout).
    pub fn close(&mut self) {
        self.decided = true;
    }

    /// Removes and returns every still-pending handle.
    pub fn take_pending(&mut self) -> Vec<WorkerHandle> {
        self.pending.drain().map(|(_, h)| h).collect()
    }

    /// Returns true when no worker is left to wait for.
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether a decision has been made.
    pub fn is_decided(&self) -> bool {
        self.decided
    }

    /// Winner's process id, once decided by a success.
    pub fn winner(&self) -> Option<ProcessId> {
        self.winner
    }

    /// Number of workers accounted as failed or crashed.
    pub fn finished(&self) -> usize {
        self.finished
    }

    /// Number of workers still pending.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Final error when every worker failed. Marks the race decided.
    pub fn all_failed(&mut self) -> RaceError {
        self.decided = true;
        RaceError::AllWorkersFailed {
            workers: self.total,
            last: self.last_fault.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::link::LinkTable;
    use crate::error::WorkerError;

    fn handles(n: usize) -> (LinkTable, Vec<WorkerHandle>) {
        let table = LinkTable::new();
        let hs = (0..n)
            .map(|i| {
                let token = CancellationToken::new();
                let pid = table.register(token.clone());
                WorkerHandle::new(pid, format!("w{i}").into(), token, None)
            })
            .collect();
        (table, hs)
    }

    fn delivery<R>(pid: ProcessId, outcome: Outcome<R>) -> Delivery<R> {
        Delivery { from: pid, outcome }
    }

    #[test]
    fn first_success_wins_and_later_ones_are_discarded() {
        let (_t, hs) = handles(3);
        let pids: Vec<_> = hs.iter().map(WorkerHandle::pid).collect();
        let mut st = RaceState::new(3);
        hs.into_iter().for_each(|h| st.track(h));

        assert!(matches!(
            st.apply(delivery(pids[0], Outcome::<&str>::Failure(WorkerError::fail("x")))),
            Step::Counted { .. }
        ));
        match st.apply(delivery(pids[1], Outcome::Success("X"))) {
            Step::Won { response, handle } => {
                assert_eq!(response, "X");
                assert_eq!(handle.pid(), pids[1]);
            }
            _ => panic!("expected a winner"),
        }
        assert!(matches!(
            st.apply(delivery(pids[2], Outcome::Success("Y"))),
            Step::Discarded
        ));
        assert_eq!(st.winner(), Some(pids[1]));
        assert_eq!(st.finished(), 1);
        // the late success is still pending bookkeeping-wise; cancellation drains it
        assert_eq!(st.take_pending().len(), 1);
    }

    #[test]
    fn all_failures_keep_last_fault() {
        let (_t, hs) = handles(2);
        let pids: Vec<_> = hs.iter().map(WorkerHandle::pid).collect();
        let mut st = RaceState::new(2);
        hs.into_iter().for_each(|h| st.track(h));

        st.apply(delivery(pids[1], Outcome::<()>::Failure(WorkerError::fail("first"))));
        assert!(!st.is_exhausted());
        st.apply(delivery(
            pids[0],
            Outcome::<()>::Crashed(ExitReason::Panicked("second".into())),
        ));
        assert!(st.is_exhausted());

        match st.all_failed() {
            RaceError::AllWorkersFailed { workers, last } => {
                assert_eq!(workers, 2);
                let last = last.unwrap();
                assert!(last.is_crash());
                assert_eq!(last.worker(), "w0");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(st.is_decided());
    }

    #[test]
    fn orphaned_workers_count_as_crashes() {
        let (_t, hs) = handles(2);
        let mut st = RaceState::new(2);
        hs.into_iter().for_each(|h| st.track(h));
        let orphans = st.orphan_pending();
        assert_eq!(orphans.len(), 2);
        assert!(st.is_exhausted());
        assert_eq!(st.finished(), 2);
    }

    #[test]
    fn cancel_only_touches_token_without_abort() {
        let (_t, hs) = handles(1);
        let h = &hs[0];
        h.cancel(false);
        assert!(h.token.is_cancelled());
    }

    #[test]
    #[should_panic(expected = "untracked worker")]
    fn unknown_delivery_before_decision_is_fatal() {
        let (_t, hs) = handles(1);
        let stranger = hs[0].pid();
        let mut st = RaceState::new(1);
        st.apply(delivery(stranger, Outcome::Success(())));
    }
}
