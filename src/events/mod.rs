//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted while races run.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Coordinator` (race and worker events, late-outcome drain),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the coordinator's listener, which fans out to `SubscriberSet`,
//!   and any receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
