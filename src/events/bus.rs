//! # Event bus for broadcasting race events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] so that the
//! coordinator, its drain tasks and subscriber workers can publish without
//! ever blocking a race.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Receivers:
//!   Coordinator ──┐
//!   drain task  ──┼──────► Bus ───────► listener ────► SubscriberSet
//!   subscribers ──┘  (broadcast chan)  Bus::subscribe() (tests, callers)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for race events.
///
/// Cheap to clone; every clone publishes into the same ring buffer.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
