//! # racevisor
//!
//! **Racevisor** dispatches one request to many workers concurrently and
//! returns the first successful response.
//!
//! Workers run as supervised tokio tasks linked to the coordinator. A worker
//! that panics or is torn down is observed through its link and counted like
//! a failure, so a race always ends with either the earliest success or a
//! single aggregate error. Workers still running after the decision are
//! cancelled without waiting for them.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Worker    │   │    Worker    │   │    Worker    │
//!     │  (replica 1) │   │  (replica 2) │   │  (replica N) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Coordinator::race(request, workers)                              │
//! │  - LinkTable (coordinator traps exits, workers linked to it)      │
//! │  - Result channel (many writers, one reader)                      │
//! │  - RaceState (single decision point)                              │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ task+watcher │   │ task+watcher │   │ task+watcher │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ Success          │ Failure          │ panic → link    │
//!      │                  │                  │ → Crashed       │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                (capacity: RaceConfig::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │   (in Coordinator)     │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//! ```
//!
//! ### Lifecycle
//! ```text
//! race(request, workers)
//!   ├─► empty            ─► Err(NoWorkers)
//!   ├─► RaceStarted, spawn_linked × N
//!   ├─► receive_any():
//!   │       ├─ Success   ─► WinnerChosen, Ok(r)
//!   │       ├─ Failure   ─► WorkerFailed,  pending -= 1
//!   │       └─ Crashed   ─► WorkerCrashed, pending -= 1
//!   ├─► pending empty    ─► AllWorkersFailed
//!   ├─► deadline         ─► RaceTimedOut
//!   └─► cancel stragglers ─► StragglersCancelled, late outcomes discarded
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Racing**        | First success across supervised async workers.                | [`Coordinator`], [`race`]                   |
//! | **Workers**       | Define workers as closures or trait objects.                  | [`Worker`], [`WorkerFn`], [`WorkerRef`]     |
//! | **Links**         | Erlang-style links with exit trapping.                        | [`LinkTable`], [`ExitReason`]               |
//! | **Subscriber API**| Hook into race events (logging, metrics, custom subscribers). | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | One aggregate error per race.                                 | [`RaceError`], [`WorkerError`]              |
//! | **Variants**      | Blocking threads, callbacks, in-task futures.                 | [`race_threads`], [`race_callback`], [`first_success`] |
//! | **Configuration** | Deadline, bus size, straggler policy.                         | [`RaceConfig`]                              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use racevisor::{Coordinator, RaceConfig, RaceError, WorkerError, WorkerFn, WorkerRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = RaceConfig::default();
//!     cfg.timeout = Duration::from_secs(5);
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn racevisor::Subscribe>> = vec![Arc::new(racevisor::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn racevisor::Subscribe>> = Vec::new();
//!
//!     let coordinator = Coordinator::builder(cfg).with_subscribers(subs).build();
//!
//!     let down: WorkerRef<u64, u64> = WorkerFn::arc("down", |_req: Arc<u64>, _ctx: CancellationToken| async move {
//!         Err(WorkerError::fail("connection refused"))
//!     });
//!     let up: WorkerRef<u64, u64> = WorkerFn::arc("up", |req: Arc<u64>, _ctx: CancellationToken| async move {
//!         Ok(*req * 2)
//!     });
//!
//!     assert_eq!(coordinator.race(21, vec![down.clone(), up]).await?, 42);
//!
//!     let err = coordinator.race(21, vec![down]).await.unwrap_err();
//!     assert!(matches!(err, RaceError::AllWorkersFailed { workers: 1, .. }));
//!     Ok(())
//! }
//! ```
mod callback;
mod core;
mod error;
mod events;
mod local;
mod monitor;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use callback::{Claim, Completion, Service, race_callback};
pub use core::{
    Coordinator, CoordinatorBuilder, ExitReason, ExitSink, LinkTable, ProcessId, RaceConfig, race,
};
pub use error::{RaceError, WorkerError, WorkerFault};
pub use events::{Bus, Event, EventKind};
pub use local::first_success;
pub use monitor::{BlockingWorker, RaceCell, RaceRecorder, race_threads};
pub use subscribers::{Subscribe, SubscriberSet};
pub use workers::{BoxWorkerFuture, Outcome, Worker, WorkerFn, WorkerRef};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
