use std::sync::Arc;

use crate::{
    core::{config::RaceConfig, coordinator::Coordinator},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Coordinator`] with optional subscribers.
pub struct CoordinatorBuilder {
    cfg: RaceConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl CoordinatorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: RaceConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive race events (spawns, failures, crashes, winners)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the coordinator.
    ///
    /// Without subscribers no background task is started. With subscribers
    /// this spawns the fan-out workers and the bus listener, so it must be
    /// called from within a tokio runtime.
    pub fn build(self) -> Coordinator {
        if self.subscribers.is_empty() {
            return Coordinator::new(self.cfg);
        }
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        Coordinator::with_subscribers(self.cfg, bus, subs)
    }
}
