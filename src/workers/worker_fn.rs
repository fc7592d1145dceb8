//! # Function-backed worker (`WorkerFn`)
//!
//! [`WorkerFn`] wraps a closure `F: Fn(Arc<Req>, CancellationToken) -> Fut`,
//! producing a fresh future per spawn. State shared between spawns must be
//! captured explicitly (e.g. `Arc<...>` inside the closure).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use racevisor::{WorkerFn, WorkerRef, WorkerError};
//!
//! let w: WorkerRef<u32, u32> = WorkerFn::arc("double", |req: Arc<u32>, _ctx: CancellationToken| async move {
//!     Ok::<_, WorkerError>(*req * 2)
//! });
//!
//! assert_eq!(w.name(), "double");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::workers::worker::{BoxWorkerFuture, Worker};

/// Function-backed worker implementation.
pub struct WorkerFn<F, Req, Resp> {
    name: Cow<'static, str>,
    f: F,
    _types: PhantomData<fn(Arc<Req>) -> Resp>,
}

impl<F, Req, Resp> WorkerFn<F, Req, Resp> {
    /// Creates a new function-backed worker.
    ///
    /// Prefer [`WorkerFn::arc`] when you immediately need a [`WorkerRef`](crate::WorkerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _types: PhantomData,
        }
    }

    /// Creates the worker and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut, Req, Resp> Worker<Req, Resp> for WorkerFn<F, Req, Resp>
where
    F: Fn(Arc<Req>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, WorkerError>> + Send + 'static,
    Req: 'static,
    Resp: 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, request: Arc<Req>, ctx: CancellationToken) -> BoxWorkerFuture<Resp> {
        Box::pin((self.f)(request, ctx))
    }
}
