//! # Spawn one linked worker.
//!
//! [`spawn_linked`] starts a worker under a coordinator and installs the
//! watcher that turns its termination into exactly one outcome.
//!
//! ## Flow
//! ```text
//! spawn_linked(worker, request, parent)
//!   ├─► child token = parent_token.child_token()
//!   ├─► links.register_child(parent, token)      (linked BEFORE the task exists)
//!   ├─► task    = tokio::spawn(worker.spawn(request, token))
//!   ├─► links.attach_abort(pid, task.abort_handle())
//!   └─► watcher = tokio::spawn(join task):
//!         ├─ Ok(Ok(r))   → deliver Success(r), exit(pid, Normal)
//!         ├─ Ok(Err(e))  → deliver Failure(e), exit(pid, Normal)
//!         ├─ Err(panic)  → exit(pid, Panicked(msg)) → link synthesizes Crashed
//!         └─ Err(abort)  → exit(pid, Killed)        → link synthesizes Crashed
//! ```
//!
//! ## Rules
//! - The worker's `spawn` runs inside the task, so a panic while building the
//!   future is a crash of that worker and never of the coordinator.
//! - The watcher keeps its deliverer alive until the exit has been propagated,
//!   so the result channel cannot close before a synthesized crash is queued.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::channel::ResultSender;
use crate::core::link::{ExitReason, LinkTable, ProcessId};
use crate::core::state::WorkerHandle;
use crate::workers::{Outcome, WorkerRef};

/// Spawns `worker` against `request`, linked under `parent`.
pub fn spawn_linked<Req, Resp>(
    worker: &WorkerRef<Req, Resp>,
    request: &Arc<Req>,
    parent: ProcessId,
    parent_token: &CancellationToken,
    links: &Arc<LinkTable>,
    results: &ResultSender<Resp>,
) -> WorkerHandle
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    let token = parent_token.child_token();
    let pid = links.register_child(parent, token.clone());
    let mut deliverer = Some(results.deliverer(pid));

    let task = {
        let worker = Arc::clone(worker);
        let request = Arc::clone(request);
        let token = token.clone();
        tokio::spawn(async move { worker.spawn(request, token).await })
    };
    let abort = task.abort_handle();
    links.attach_abort(pid, abort.clone());

    let watcher_links = Arc::clone(links);
    tokio::spawn(async move {
        let reason = match task.await {
            Ok(res) => {
                if let Some(d) = deliverer.take() {
                    let outcome = Outcome::from(res);
                    let (from, label) = (d.pid(), outcome.as_label());
                    if !d.deliver(outcome) {
                        tracing::trace!(pid = %from, outcome = label, "race already over, outcome dropped");
                    }
                }
                ExitReason::Normal
            }
            Err(err) if err.is_panic() => ExitReason::from_panic(err.into_panic()),
            Err(_) => ExitReason::Killed,
        };
        watcher_links.exit(pid, reason);
        drop(deliverer);
    });

    WorkerHandle::new(pid, Arc::from(worker.name()), token, Some(abort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::result_channel;
    use crate::core::link::ExitSink;
    use crate::error::WorkerError;
    use crate::workers::WorkerFn;

    fn trapping_parent(links: &LinkTable, sink: Arc<dyn ExitSink>) -> (ProcessId, CancellationToken) {
        let token = CancellationToken::new();
        let pid = links.register(token.clone());
        links.trap_exits(pid, sink);
        (pid, token)
    }

    #[tokio::test]
    async fn success_is_delivered_once_and_link_dissolves() {
        let links = Arc::new(LinkTable::new());
        let (tx, mut rx) = result_channel::<u32>();
        let (parent, ptoken) = trapping_parent(&links, tx.crash_sink());

        let w: WorkerRef<u32, u32> =
            WorkerFn::arc("ok", |req: Arc<u32>, _ctx: CancellationToken| async move {
                Ok::<_, WorkerError>(*req)
            });
        let h = spawn_linked(&w, &Arc::new(7), parent, &ptoken, &links, &tx);
        drop(tx);

        let d = rx.receive_any().await.unwrap();
        assert_eq!(d.from, h.pid());
        assert_eq!(d.outcome, Outcome::Success(7));
        assert!(rx.receive_any().await.is_none());
        while links.is_alive(h.pid()) {
            tokio::task::yield_now().await;
        }
        assert!(links.is_alive(parent));
        assert!(links.children(parent).is_empty());
    }

    #[tokio::test]
    async fn panic_is_synthesized_as_crash() {
        let links = Arc::new(LinkTable::new());
        let (tx, mut rx) = result_channel::<u32>();
        let (parent, ptoken) = trapping_parent(&links, tx.crash_sink());

        let w: WorkerRef<u32, u32> =
            WorkerFn::arc("boom", |_req: Arc<u32>, _ctx: CancellationToken| async move {
                if true {
                    panic!("worker exploded");
                }
                Ok::<u32, WorkerError>(0)
            });
        let h = spawn_linked(&w, &Arc::new(0), parent, &ptoken, &links, &tx);
        drop(tx);

        let d = rx.receive_any().await.unwrap();
        assert_eq!(d.from, h.pid());
        assert_eq!(
            d.outcome,
            Outcome::Crashed(ExitReason::Panicked("worker exploded".into()))
        );
        assert!(rx.receive_any().await.is_none());
        assert!(!ptoken.is_cancelled());
    }

    #[tokio::test]
    async fn abort_reports_killed() {
        let links = Arc::new(LinkTable::new());
        let (tx, mut rx) = result_channel::<u32>();
        let (parent, ptoken) = trapping_parent(&links, tx.crash_sink());

        let w: WorkerRef<u32, u32> =
            WorkerFn::arc("hang", |_req: Arc<u32>, _ctx: CancellationToken| async move {
                futures::future::pending::<Result<u32, WorkerError>>().await
            });
        let h = spawn_linked(&w, &Arc::new(0), parent, &ptoken, &links, &tx);
        drop(tx);
        h.cancel(true);

        let d = rx.receive_any().await.unwrap();
        assert_eq!(d.outcome, Outcome::Crashed(ExitReason::Killed));
    }
}
