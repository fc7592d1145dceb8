//! # Worker abstractions.
//!
//! This module provides the worker-related types:
//! - [`Worker`] - trait for a cancelable unit that answers one request
//! - [`WorkerFn`] - closure-backed worker implementation
//! - [`WorkerRef`] - shared reference to a worker (`Arc<dyn Worker>`)
//! - [`Outcome`] - terminal result of one worker's attempt

mod outcome;
mod worker;
mod worker_fn;

pub use outcome::Outcome;
pub use worker::{BoxWorkerFuture, Worker, WorkerRef};
pub use worker_fn::WorkerFn;
