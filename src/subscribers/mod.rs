//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and, behind the `logging` feature, the [`LogWriter`] subscriber.
//!
//! ## Architecture
//! ```text
//! Coordinator ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                           │
//!                                                 ┌─────────┼─────────┐
//!                                                 ▼         ▼         ▼
//!                                             LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use racevisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct CrashCounter;
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::WorkerCrashed {
//!             // increment crash counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "crash-counter"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
