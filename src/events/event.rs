//! # Runtime events emitted by the coordinator.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Race events**: start, final decision and straggler cleanup of one race
//! - **Worker events**: outcome of one worker
//! - **Subscriber events**: delivery problems inside the fan-out
//!
//! Worker events scale with the race width; race events do not. A race
//! publishes exactly one start event and one decision event however many
//! workers it has, so they survive a lagging bus as long as possible.
//!
//! The [`Event`] struct carries metadata such as the race id, worker name,
//! process id, reasons and timeouts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the order when events are delivered
//! out of order.
//!
//! ## Example
//! ```rust
//! use racevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerFailed)
//!     .with_race(7)
//!     .with_worker("replica-2")
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::WorkerFailed);
//! assert_eq!(ev.worker.as_deref(), Some("replica-2"));
//! assert_eq!(ev.race, Some(7));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::ProcessId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,

    // === Race events ===
    /// A race dispatched its request.
    ///
    /// Sets:
    /// - `race`: race id
    /// - `workers`: number of workers
    /// - `timeout_ms`: deadline, if any
    RaceStarted,

    /// A winner was chosen; the race returns its response.
    ///
    /// Sets:
    /// - `race`, `worker`, `pid`
    WinnerChosen,

    /// Every worker failed or crashed.
    ///
    /// Sets:
    /// - `race`, `workers`
    /// - `reason`: last observed fault
    AllWorkersFailed,

    /// The race deadline elapsed before any success.
    ///
    /// Sets:
    /// - `race`, `timeout_ms`
    RaceTimedOut,

    /// Workers still running after the decision were cancelled.
    ///
    /// Published once per race, only when at least one worker was pending.
    ///
    /// Sets:
    /// - `race`
    /// - `workers`: number of cancelled workers
    StragglersCancelled,

    // === Worker events ===
    /// Worker delivered a response.
    ///
    /// Sets:
    /// - `race`, `worker`, `pid`
    WorkerSucceeded,

    /// Worker answered with a logical error.
    ///
    /// Sets:
    /// - `race`, `worker`, `pid`
    /// - `reason`: error message
    WorkerFailed,

    /// Worker terminated abnormally (reported by its supervision link).
    ///
    /// Sets:
    /// - `race`, `worker`, `pid`
    /// - `reason`: exit reason
    WorkerCrashed,

    /// An outcome arrived after the decision and was discarded.
    ///
    /// Sets:
    /// - `race`, `pid`
    /// - `reason`: outcome label
    LateOutcomeDiscarded,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::RaceStarted => "race_started",
            EventKind::WinnerChosen => "winner_chosen",
            EventKind::AllWorkersFailed => "all_workers_failed",
            EventKind::RaceTimedOut => "race_timed_out",
            EventKind::StragglersCancelled => "stragglers_cancelled",
            EventKind::WorkerSucceeded => "worker_succeeded",
            EventKind::WorkerFailed => "worker_failed",
            EventKind::WorkerCrashed => "worker_crashed",
            EventKind::LateOutcomeDiscarded => "late_outcome_discarded",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Race the event belongs to.
    pub race: Option<u64>,
    /// Worker (or subscriber) name.
    pub worker: Option<Arc<str>>,
    /// Process id of the worker.
    pub pid: Option<u64>,
    /// Human-readable reason (errors, exit reasons, overflow details).
    pub reason: Option<Arc<str>>,
    /// Number of workers in the race.
    pub workers: Option<u32>,
    /// Race deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            race: None,
            worker: None,
            pid: None,
            reason: None,
            workers: None,
            timeout_ms: None,
        }
    }

    /// Attaches the race id.
    #[inline]
    pub fn with_race(mut self, race: u64) -> Self {
        self.race = Some(race);
        self
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: ProcessId) -> Self {
        self.pid = Some(pid.as_u64());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the number of workers (saturating at `u32::MAX`).
    #[inline]
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_increases() {
        let a = Event::new(EventKind::RaceStarted);
        let b = Event::new(EventKind::RaceStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_saturates() {
        let ev = Event::new(EventKind::RaceTimedOut).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
