//! # Result channel between workers and the coordinator.
//!
//! Many writers, one reader. Built on [`tokio::sync::mpsc::unbounded_channel`]
//! so a writer never blocks and never waits for the coordinator.
//!
//! ```text
//! watcher 1 ── Deliverer::deliver ──┐
//! watcher 2 ── Deliverer::deliver ──┼──► ResultReceiver::receive_any ──► RaceState
//! LinkTable ── CrashSink (weak) ────┘
//! ```
//!
//! ## Rules
//! - A [`Deliverer`] is consumed by `deliver`, so each worker delivers at most once.
//! - Delivery order across workers is arrival order; nothing is reordered.
//! - `receive_any` yields `None` once every strong writer is gone.
//! - The crash sink only holds a weak sender and never keeps the channel open.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::link::{ExitReason, ExitSink, ProcessId};
use crate::workers::Outcome;

/// One outcome together with the process that produced it.
#[derive(Debug)]
pub struct Delivery<R> {
    /// Process the outcome belongs to.
    pub from: ProcessId,
    /// The terminal outcome.
    pub outcome: Outcome<R>,
}

/// Creates a connected sender/receiver pair.
pub fn result_channel<R>() -> (ResultSender<R>, ResultReceiver<R>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResultSender { tx }, ResultReceiver { rx })
}

/// Factory for per-worker writers.
pub struct ResultSender<R> {
    tx: mpsc::UnboundedSender<Delivery<R>>,
}

impl<R: Send + 'static> ResultSender<R> {
    /// Creates the single-use writer for `from`.
    pub fn deliverer(&self, from: ProcessId) -> Deliverer<R> {
        Deliverer {
            from,
            tx: self.tx.clone(),
        }
    }

    /// Returns a sink that turns abnormal exit signals into [`Outcome::Crashed`].
    pub fn crash_sink(&self) -> Arc<dyn ExitSink> {
        Arc::new(CrashSink {
            tx: self.tx.downgrade(),
        })
    }
}

/// Single-use writer owned by one worker's watcher.
pub struct Deliverer<R> {
    from: ProcessId,
    tx: mpsc::UnboundedSender<Delivery<R>>,
}

impl<R> Deliverer<R> {
    /// Process this writer delivers for.
    pub fn pid(&self) -> ProcessId {
        self.from
    }

    /// Hands `outcome` to the coordinator.
    ///
    /// Returns `false` when the coordinator is gone; the outcome is dropped.
    pub fn deliver(self, outcome: Outcome<R>) -> bool {
        self.tx
            .send(Delivery {
                from: self.from,
                outcome,
            })
            .is_ok()
    }
}

/// Reading end, owned by the coordinator.
pub struct ResultReceiver<R> {
    rx: mpsc::UnboundedReceiver<Delivery<R>>,
}

impl<R> ResultReceiver<R> {
    /// Waits for the next outcome from any worker.
    ///
    /// Returns `None` once every writer has been dropped and the queue is empty.
    pub async fn receive_any(&mut self) -> Option<Delivery<R>> {
        self.rx.recv().await
    }
}

/// Exit sink installed for a trapping coordinator.
struct CrashSink<R> {
    tx: mpsc::WeakUnboundedSender<Delivery<R>>,
}

impl<R: Send + 'static> ExitSink for CrashSink<R> {
    fn exit_signal(&self, from: ProcessId, reason: &ExitReason) {
        if !reason.is_abnormal() {
            return;
        }
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(Delivery {
                from,
                outcome: Outcome::Crashed(reason.clone()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::link::LinkTable;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn receiver_closes_after_last_deliverer() {
        let table = LinkTable::new();
        let a = table.register(CancellationToken::new());
        let b = table.register(CancellationToken::new());

        let (tx, mut rx) = result_channel::<u8>();
        let da = tx.deliverer(a);
        let db = tx.deliverer(b);
        assert_eq!((da.pid(), db.pid()), (a, b));
        drop(tx);

        assert!(db.deliver(Outcome::Success(2)));
        assert!(da.deliver(Outcome::Success(1)));

        let first = rx.receive_any().await.unwrap();
        assert_eq!(first.from, b);
        assert_eq!(first.outcome, Outcome::Success(2));
        assert_eq!(rx.receive_any().await.unwrap().from, a);
        assert!(rx.receive_any().await.is_none());
    }

    #[tokio::test]
    async fn crash_sink_ignores_normal_exits_and_does_not_hold_channel() {
        let table = LinkTable::new();
        let pid = table.register(CancellationToken::new());
        let (tx, mut rx) = result_channel::<u8>();
        let sink = tx.crash_sink();
        let keep = tx.deliverer(pid);
        drop(tx);

        sink.exit_signal(pid, &ExitReason::Normal);
        sink.exit_signal(pid, &ExitReason::Killed);
        let got = rx.receive_any().await.unwrap();
        assert_eq!(got.outcome, Outcome::Crashed(ExitReason::Killed));

        drop(keep);
        assert!(rx.receive_any().await.is_none());
        // nothing left to upgrade; the signal is dropped silently
        sink.exit_signal(pid, &ExitReason::Killed);
    }

    #[tokio::test]
    async fn deliver_after_receiver_dropped_reports_false() {
        let (tx, rx) = result_channel::<u8>();
        let pid = LinkTable::new().register(CancellationToken::new());
        let d = tx.deliverer(pid);
        drop(rx);
        assert!(!d.deliver(Outcome::Success(0)));
    }
}
