//! # Thread-backed race over blocking workers.
//!
//! [`race_threads`] runs each [`BlockingWorker`] on its own OS thread and
//! waits on a [`RaceCell`], each thread holding its own recorder. Threads are
//! detached: after the decision the shared token is cancelled and stragglers
//! report into a tally nobody waits on anymore.

use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::ExitReason;
use crate::error::{RaceError, WorkerError};
use crate::monitor::RaceCell;
use crate::workers::Outcome;

type BlockingFn<Req, R> =
    dyn Fn(&Req, &CancellationToken) -> Result<R, WorkerError> + Send + Sync + 'static;

/// A named blocking worker.
pub struct BlockingWorker<Req, R> {
    name: Cow<'static, str>,
    f: Arc<BlockingFn<Req, R>>,
}

impl<Req, R> BlockingWorker<Req, R> {
    /// Wraps a blocking closure.
    ///
    /// The closure should poll the token at convenient points and return
    /// [`WorkerError::Canceled`] once it is cancelled.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Req, &CancellationToken) -> Result<R, WorkerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Races `request` across blocking workers on OS threads.
///
/// A zero `timeout` waits without a deadline.
///
/// # Errors
/// Same taxonomy as [`Coordinator::race`](crate::Coordinator::race).
pub fn race_threads<Req, R>(
    request: Req,
    workers: Vec<BlockingWorker<Req, R>>,
    timeout: Duration,
) -> Result<R, RaceError>
where
    Req: Send + Sync + 'static,
    R: Send + 'static,
{
    if workers.is_empty() {
        return Err(RaceError::NoWorkers);
    }

    let request = Arc::new(request);
    let cell = RaceCell::new(workers.len());
    let token = CancellationToken::new();

    for worker in workers {
        let BlockingWorker { name, f } = worker;
        let request = Arc::clone(&request);
        let recorder = cell.recorder();
        let token = token.child_token();
        let thread_name = format!("racevisor-{name}");
        let report_name = name.clone();

        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(|| f(&*request, &token))) {
                Ok(res) => Outcome::from(res),
                Err(payload) => Outcome::Crashed(ExitReason::from_panic(payload)),
            };
            recorder.record(&report_name, outcome);
        });
        if let Err(err) = spawned {
            tracing::warn!(worker = %name, error = %err, "failed to spawn worker thread");
            cell.record(&name, Outcome::Crashed(ExitReason::Killed));
        }
    }

    let verdict = if timeout.is_zero() {
        cell.wait()
    } else {
        cell.wait_timeout(timeout)
    };
    token.cancel();
    verdict
}
