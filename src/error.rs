//! Error types used by the race coordinator and its workers.
//!
//! This module defines three enums:
//!
//! - [`RaceError`]: the only errors a caller of `race` ever sees.
//! - [`WorkerError`]: logical failures reported by an individual worker.
//! - [`WorkerFault`]: a failure *or* a crash, as kept for diagnostics.
//!
//! Individual worker errors are never surfaced as the race result. They are
//! folded into accounting, and at most one of them survives as the
//! `last` field of [`RaceError::AllWorkersFailed`].

use std::time::Duration;
use thiserror::Error;

use crate::core::ExitReason;

/// # Errors produced by a race.
///
/// A caller sees either the winning response or exactly one of these variants,
/// regardless of how many workers took part.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RaceError {
    /// The caller supplied an empty worker list; nothing was spawned.
    #[error("no workers to race")]
    NoWorkers,

    /// Every worker failed or crashed and none succeeded.
    ///
    /// Only the most recently observed fault is kept. Callers may rely on
    /// *some* reason being present when at least one worker ran, never on
    /// the full list.
    #[error("all {workers} workers failed (last: {})", fmt_last(.last))]
    AllWorkersFailed {
        /// Number of workers that took part in the race.
        workers: usize,
        /// Last fault observed before the race gave up.
        last: Option<WorkerFault>,
    },

    /// No worker succeeded before the race deadline.
    #[error("race timed out after {timeout:?}")]
    TimedOut {
        /// The deadline that elapsed.
        timeout: Duration,
    },
}

fn fmt_last(last: &Option<WorkerFault>) -> String {
    match last {
        Some(fault) => fault.to_string(),
        None => "none".to_string(),
    }
}

impl RaceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use racevisor::RaceError;
    ///
    /// assert_eq!(RaceError::NoWorkers.as_label(), "race_no_workers");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RaceError::NoWorkers => "race_no_workers",
            RaceError::AllWorkersFailed { .. } => "race_all_failed",
            RaceError::TimedOut { .. } => "race_timed_out",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RaceError::NoWorkers => "no workers".to_string(),
            RaceError::AllWorkersFailed { workers, last } => {
                format!("all failed: workers={workers} last={}", fmt_last(last))
            }
            RaceError::TimedOut { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// Returns the last worker fault carried by [`RaceError::AllWorkersFailed`].
    pub fn last_fault(&self) -> Option<&WorkerFault> {
        match self {
            RaceError::AllWorkersFailed { last, .. } => last.as_ref(),
            _ => None,
        }
    }
}

/// # Errors reported by a worker.
///
/// Returned from a worker future. A panic is not a `WorkerError`: it is a crash
/// and is observed through the supervision link instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker could not produce a response.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The worker observed cancellation and stopped.
    #[error("context cancelled")]
    Canceled,
}

impl WorkerError {
    /// Shorthand for [`WorkerError::Fail`].
    ///
    /// # Example
    /// ```
    /// use racevisor::WorkerError;
    ///
    /// let err = WorkerError::fail("upstream refused");
    /// assert_eq!(err.to_string(), "execution failed: upstream refused");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        WorkerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Fail { .. } => "worker_failed",
            WorkerError::Canceled => "worker_canceled",
        }
    }
}

/// # A worker that did not succeed.
///
/// Failures and crashes are accounted identically; the tag is kept only so that
/// diagnostics can tell "answered with an error" from "died before answering".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerFault {
    /// The worker answered with a logical error.
    #[error("worker `{worker}` failed: {error}")]
    Failure {
        /// Name of the worker.
        worker: String,
        /// The reported error.
        error: WorkerError,
    },

    /// The worker terminated abnormally.
    #[error("worker `{worker}` crashed: {reason}")]
    Crash {
        /// Name of the worker.
        worker: String,
        /// Termination reason delivered by the supervision link.
        reason: ExitReason,
    },
}

impl WorkerFault {
    /// Name of the worker this fault belongs to.
    pub fn worker(&self) -> &str {
        match self {
            WorkerFault::Failure { worker, .. } | WorkerFault::Crash { worker, .. } => worker,
        }
    }

    /// Returns `true` for [`WorkerFault::Crash`].
    pub fn is_crash(&self) -> bool {
        matches!(self, WorkerFault::Crash { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerFault::Failure { .. } => "worker_failure",
            WorkerFault::Crash { .. } => "worker_crash",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_failed_message_mentions_last_fault() {
        let err = RaceError::AllWorkersFailed {
            workers: 3,
            last: Some(WorkerFault::Crash {
                worker: "w2".into(),
                reason: ExitReason::Panicked("boom".into()),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("all 3 workers failed"), "{msg}");
        assert!(msg.contains("w2"), "{msg}");
        assert!(err.last_fault().is_some_and(WorkerFault::is_crash));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            RaceError::TimedOut {
                timeout: Duration::from_secs(1)
            }
            .as_label(),
            "race_timed_out"
        );
        assert_eq!(WorkerError::Canceled.as_label(), "worker_canceled");
        assert_eq!(
            WorkerFault::Failure {
                worker: "a".into(),
                error: WorkerError::fail("x"),
            }
            .as_label(),
            "worker_failure"
        );
    }

    #[test]
    fn all_failed_without_fault_renders_none() {
        let err = RaceError::AllWorkersFailed {
            workers: 0,
            last: None,
        };
        assert_eq!(err.as_message(), "all failed: workers=0 last=none");
    }
}
