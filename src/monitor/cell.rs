//! # Monitor cell: race accounting under a mutex and condition variable.
//!
//! [`RaceCell`] keeps `(count, best, last fault)` behind one lock. Every
//! record is a single transaction; the waiter sleeps on a [`Condvar`] until a
//! success exists or every worker has reported.
//!
//! Workers report through cloned [`RaceRecorder`]s. The cell itself is the
//! single waiting end: `wait` consumes it, so the winner is handed out once.
//!
//! ```text
//! record(outcome)                 wait(self)
//!   lock                            lock
//!   count += 1                      while best empty && count < total:
//!   Success && best empty →             condvar.wait
//!       best = r                    take best | AllWorkersFailed
//!   otherwise failure →
//!       last = fault
//!   notify_all
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{RaceError, WorkerFault};
use crate::workers::Outcome;

struct Tally<R> {
    count: usize,
    best: Option<R>,
    last: Option<WorkerFault>,
}

impl<R> Tally<R> {
    fn settled(&self, total: usize) -> bool {
        self.best.is_some() || self.count >= total
    }
}

struct Shared<R> {
    total: usize,
    tally: Mutex<Tally<R>>,
    ready: Condvar,
}

impl<R> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Tally<R>> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, worker: &str, outcome: Outcome<R>) -> bool {
        let mut tally = self.lock();
        tally.count += 1;
        let won = match outcome {
            Outcome::Success(r) if tally.best.is_none() => {
                tally.best = Some(r);
                true
            }
            Outcome::Success(_) => false,
            Outcome::Failure(error) => {
                tally.last = Some(WorkerFault::Failure {
                    worker: worker.to_string(),
                    error,
                });
                false
            }
            Outcome::Crashed(reason) => {
                tally.last = Some(WorkerFault::Crash {
                    worker: worker.to_string(),
                    reason,
                });
                false
            }
        };
        drop(tally);
        self.ready.notify_all();
        won
    }
}

/// Waiting end of a race over a fixed number of workers.
pub struct RaceCell<R> {
    shared: Arc<Shared<R>>,
}

/// Reporting end of a [`RaceCell`]; clone one per worker.
pub struct RaceRecorder<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for RaceRecorder<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> RaceRecorder<R> {
    /// Records one worker's outcome.
    ///
    /// Returns `true` if this outcome became the winner. A success that
    /// arrives after the winner is counted and dropped. Recording after the
    /// cell was consumed is accepted and has no effect on anyone.
    pub fn record(&self, worker: &str, outcome: Outcome<R>) -> bool {
        self.shared.record(worker, outcome)
    }
}

impl<R> RaceCell<R> {
    /// Creates a cell expecting `total` reports.
    pub fn new(total: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                total,
                tally: Mutex::new(Tally {
                    count: 0,
                    best: None,
                    last: None,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Returns a reporting handle sharing this cell's tally.
    pub fn recorder(&self) -> RaceRecorder<R> {
        RaceRecorder {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Records one outcome directly; see [`RaceRecorder::record`].
    pub fn record(&self, worker: &str, outcome: Outcome<R>) -> bool {
        self.shared.record(worker, outcome)
    }

    /// Number of outcomes recorded so far.
    pub fn count(&self) -> usize {
        self.shared.lock().count
    }

    /// Blocks until a winner exists or every worker reported.
    pub fn wait(self) -> Result<R, RaceError> {
        let shared = &self.shared;
        let tally = shared
            .ready
            .wait_while(shared.lock(), |t| !t.settled(shared.total))
            .unwrap_or_else(PoisonError::into_inner);
        conclude(shared.total, tally)
    }

    /// Like [`RaceCell::wait`] but gives up after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<R, RaceError> {
        let shared = &self.shared;
        let (tally, res) = shared
            .ready
            .wait_timeout_while(shared.lock(), timeout, |t| !t.settled(shared.total))
            .unwrap_or_else(PoisonError::into_inner);
        if res.timed_out() && !tally.settled(shared.total) {
            return Err(RaceError::TimedOut { timeout });
        }
        conclude(shared.total, tally)
    }
}

fn conclude<R>(total: usize, mut tally: MutexGuard<'_, Tally<R>>) -> Result<R, RaceError> {
    if total == 0 {
        return Err(RaceError::NoWorkers);
    }
    match tally.best.take() {
        Some(r) => Ok(r),
        None => Err(RaceError::AllWorkersFailed {
            workers: total,
            last: tally.last.clone(),
        }),
    }
}
