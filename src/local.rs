//! # In-task variant: race plain futures without spawning.
//!
//! [`first_success`] polls every future concurrently inside the calling task
//! through [`FuturesUnordered`]. The first `Ok` wins and the remaining futures
//! are dropped, which is how they get cancelled. Nothing needs to be `Send` or
//! `'static`.
//!
//! Panics inside a future are caught and accounted as crashes, so the error
//! taxonomy matches [`Coordinator::race`](crate::Coordinator::race).
//!
//! ## Example
//! ```rust
//! use futures::future::ready;
//! use racevisor::{WorkerError, first_success};
//!
//! # futures::executor::block_on(async {
//! let answer = first_success([
//!     ("a", ready(Err(WorkerError::fail("down")))),
//!     ("b", ready(Ok(7))),
//! ])
//! .await;
//! assert_eq!(answer.unwrap(), 7);
//! # });
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::core::ExitReason;
use crate::error::{RaceError, WorkerError, WorkerFault};

/// Returns the first successful output among `futures`.
///
/// # Errors
/// - [`RaceError::NoWorkers`] for an empty input
/// - [`RaceError::AllWorkersFailed`] when every future failed or panicked
pub async fn first_success<I, S, F, R>(futures: I) -> Result<R, RaceError>
where
    I: IntoIterator<Item = (S, F)>,
    S: Into<String>,
    F: Future<Output = Result<R, WorkerError>>,
{
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .map(|(name, fut)| {
            let name: String = name.into();
            AssertUnwindSafe(fut)
                .catch_unwind()
                .map(move |res| (name, res))
        })
        .collect();

    let total = pending.len();
    if total == 0 {
        return Err(RaceError::NoWorkers);
    }

    let mut last = None;
    while let Some((worker, res)) = pending.next().await {
        match res {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => last = Some(WorkerFault::Failure { worker, error }),
            Err(payload) => {
                last = Some(WorkerFault::Crash {
                    worker,
                    reason: ExitReason::from_panic(payload),
                })
            }
        }
    }
    Err(RaceError::AllWorkersFailed {
        workers: total,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::pin::Pin;
    use std::time::Duration;

    type LocalFut<'a> = Pin<Box<dyn Future<Output = Result<&'static str, WorkerError>> + 'a>>;

    fn after(ms: u64, res: Result<&'static str, &'static str>) -> LocalFut<'static> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            res.map_err(WorkerError::fail)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_success_wins() {
        let res = first_success([
            ("w1", after(50, Err("no"))),
            ("w2", after(100, Ok("X"))),
            ("w3", after(200, Ok("Y"))),
        ])
        .await;
        assert_eq!(res.unwrap(), "X");
    }

    #[tokio::test(start_paused = true)]
    async fn panics_and_failures_are_accounted() {
        let boom: LocalFut<'static> = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            if true {
                panic!("local future exploded");
            }
            Ok("unreachable")
        });
        let err = first_success([("f", after(10, Err("no"))), ("boom", boom)])
            .await
            .unwrap_err();
        let last = err.last_fault().cloned().unwrap();
        assert_eq!(
            last,
            WorkerFault::Crash {
                worker: "boom".into(),
                reason: ExitReason::Panicked("local future exploded".into()),
            }
        );
    }

    #[tokio::test]
    async fn borrows_local_state_and_drops_losers() {
        let polled_after_win = Cell::new(false);
        let loser: LocalFut<'_> = Box::pin(async {
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            polled_after_win.set(true);
            Ok("never")
        });
        let winner: LocalFut<'_> = Box::pin(async { Ok("now") });
        assert_eq!(first_success([("loser", loser), ("winner", winner)]).await.unwrap(), "now");
        assert!(!polled_after_win.get());
    }

    #[tokio::test]
    async fn empty_input_is_no_workers() {
        let none: Vec<(&str, LocalFut<'static>)> = Vec::new();
        assert!(matches!(first_success(none).await, Err(RaceError::NoWorkers)));
    }
}
