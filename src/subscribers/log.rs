//! # LogWriter: tracing-backed event logger
//!
//! Renders every [`Event`] as a `tracing` record under the `racevisor` target.
//! Worker failures and crashes are `warn`, the final decision is `info`,
//! per-worker bookkeeping is `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO racevisor: race started race=3 workers=5
//! WARN racevisor: worker crashed race=3 worker="replica-1" pid=17 reason="panicked: boom"
//! INFO racevisor: winner chosen race=3 worker="replica-4" pid=20
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let race = e.race.unwrap_or_default();
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::RaceStarted => {
                tracing::info!(target: "racevisor", race, workers = e.workers, timeout_ms = e.timeout_ms, "race started");
            }
            EventKind::WinnerChosen => {
                tracing::info!(target: "racevisor", race, worker, pid = e.pid, "winner chosen");
            }
            EventKind::AllWorkersFailed => {
                tracing::warn!(target: "racevisor", race, workers = e.workers, last = reason, "all workers failed");
            }
            EventKind::RaceTimedOut => {
                tracing::warn!(target: "racevisor", race, timeout_ms = e.timeout_ms, "race timed out");
            }
            EventKind::StragglersCancelled => {
                tracing::debug!(target: "racevisor", race, workers = e.workers, "stragglers cancelled");
            }
            EventKind::WorkerSucceeded => {
                tracing::debug!(target: "racevisor", race, worker, pid = e.pid, "worker succeeded");
            }
            EventKind::WorkerFailed => {
                tracing::warn!(target: "racevisor", race, worker, pid = e.pid, reason, "worker failed");
            }
            EventKind::WorkerCrashed => {
                tracing::warn!(target: "racevisor", race, worker, pid = e.pid, reason, "worker crashed");
            }
            EventKind::LateOutcomeDiscarded => {
                tracing::debug!(target: "racevisor", race, pid = e.pid, outcome = reason, "late outcome discarded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "racevisor", subscriber = worker, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "racevisor", subscriber = worker, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
