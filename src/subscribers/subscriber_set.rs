//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`], which distributes events to multiple subscribers
//! concurrently without blocking the coordinator.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**; each subscriber sees its own events in order
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a panicking subscriber is reported and keeps receiving events

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::core::ExitReason;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let worker_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = ExitReason::from_panic(payload).to_string();
                        worker_bus.publish(Event::subscriber_panicked(sub.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Number of subscribers in the set.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers (clones the event once).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// Overflow events that themselves overflow are not re-published.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// Drops every queue sender, then awaits the workers so queued events are
    /// still delivered.
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_shuts_down() {
        let bus = Bus::new(16);
        let collect = Arc::new(Collect::default());
        let set = SubscriberSet::new(vec![collect.clone()], bus);
        assert_eq!(set.len(), 1);

        set.emit(&Event::new(EventKind::RaceStarted));
        set.emit(&Event::new(EventKind::WinnerChosen));
        set.shutdown().await;

        assert_eq!(
            collect.kinds.lock().unwrap().as_slice(),
            &[EventKind::RaceStarted, EventKind::WinnerChosen]
        );
    }

    #[tokio::test]
    async fn panicking_subscriber_is_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Explode)], bus);

        set.emit(&Event::new(EventKind::RaceStarted));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.worker.as_deref(), Some("explode"));
        assert_eq!(ev.reason.as_deref(), Some("panicked: subscriber exploded"));
        set.shutdown().await;
    }
}
