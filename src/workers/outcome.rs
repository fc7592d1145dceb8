//! # Terminal outcome of a worker.
//!
//! Every worker that actually starts produces exactly one [`Outcome`]:
//! `Success` or `Failure` when its future completes, `Crashed` when it
//! terminates abnormally and the supervision link reports it instead.

use crate::core::ExitReason;
use crate::error::WorkerError;

/// Tagged terminal result of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// The worker produced a response.
    Success(R),
    /// The worker answered with a logical error.
    Failure(WorkerError),
    /// The worker terminated abnormally before answering.
    Crashed(ExitReason),
}

impl<R> Outcome<R> {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(_) => "failure",
            Outcome::Crashed(_) => "crashed",
        }
    }
}

impl<R> From<Result<R, WorkerError>> for Outcome<R> {
    fn from(res: Result<R, WorkerError>) -> Self {
        match res {
            Ok(r) => Outcome::Success(r),
            Err(e) => Outcome::Failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_map_onto_outcomes() {
        let ok: Outcome<u8> = Ok(3).into();
        assert!(ok.is_success());
        assert_eq!(ok.as_label(), "success");

        let failed: Outcome<u8> = Err(WorkerError::fail("down")).into();
        assert!(!failed.is_success());
        assert_eq!(failed.as_label(), "failure");
    }

    #[test]
    fn crashes_are_not_successes() {
        let crashed = Outcome::<u8>::Crashed(ExitReason::Killed);
        assert!(!crashed.is_success());
        assert_eq!(crashed.as_label(), "crashed");
    }
}
