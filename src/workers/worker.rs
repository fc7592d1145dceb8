//! # Worker abstraction.
//!
//! A [`Worker`] turns a shared request into a future producing either a
//! response or a [`WorkerError`]. It receives a [`CancellationToken`] and
//! should stop producing side effects once the token is cancelled: the
//! coordinator cancels every straggler as soon as a winner is chosen.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Boxed future returned by [`Worker::spawn`].
pub type BoxWorkerFuture<Resp> = Pin<Box<dyn Future<Output = Result<Resp, WorkerError>> + Send + 'static>>;

/// Shared handle to a worker.
pub type WorkerRef<Req, Resp> = Arc<dyn Worker<Req, Resp>>;

/// # Asynchronous, cancelable responder.
///
/// `spawn` is invoked at most once per race and must return a fresh future
/// that owns everything it needs. Cancellation is advisory: the coordinator
/// does not wait for the future to observe it.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use racevisor::{BoxWorkerFuture, Worker, WorkerError};
///
/// struct Echo;
///
/// impl Worker<String, String> for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     fn spawn(&self, req: Arc<String>, ctx: CancellationToken) -> BoxWorkerFuture<String> {
///         Box::pin(async move {
///             if ctx.is_cancelled() {
///                 return Err(WorkerError::Canceled);
///             }
///             Ok(req.as_ref().clone())
///         })
///     }
/// }
/// ```
pub trait Worker<Req, Resp>: Send + Sync + 'static {
    /// Returns a stable, human-readable worker name.
    fn name(&self) -> &str;

    /// Creates the future answering `request`.
    fn spawn(&self, request: Arc<Req>, ctx: CancellationToken) -> BoxWorkerFuture<Resp>;
}
