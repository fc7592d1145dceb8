//! # Blocking variant: monitor cell and OS-thread workers.
//!
//! For code that is not async. [`RaceCell`] is the shared accounting, fed
//! through [`RaceRecorder`] handles, and [`race_threads`] runs [`BlockingWorker`]s on dedicated threads on top of it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use racevisor::{BlockingWorker, WorkerError, race_threads};
//!
//! let a = BlockingWorker::new("a", |x: &u32, _ctx: &CancellationToken| Ok::<_, WorkerError>(x + 1));
//! let b = BlockingWorker::new("b", |_x: &u32, _ctx: &CancellationToken| Err(WorkerError::fail("down")));
//! assert_eq!(race_threads(1, vec![a, b], Duration::ZERO).unwrap(), 2);
//! ```

mod cell;
mod threads;

pub use cell::{RaceCell, RaceRecorder};
pub use threads::{BlockingWorker, race_threads};
