use std::sync::Arc;

use super::closed::{ClosedHandler, default_closed_handler};
use super::runner;
use super::supervisor::{Shared, Supervisor, next_worker_id};
use crate::{
    config::Config,
    events::Bus,
    handler::NotifyHandler,
    subscribers::{Subscribe, SubscriberSet},
    watcher::Termination,
};

/// Builder for starting a [`Supervisor`] with non-default wiring.
pub struct SupervisorBuilder<H> {
    handler: H,
    cfg: Config,
    bus: Option<Bus>,
    closed: ClosedHandler,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<H: NotifyHandler> SupervisorBuilder<H> {
    /// Creates a builder with default configuration and the default
    /// closed-channel classifier ([`must_err`](crate::must_err)).
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            cfg: Config::default(),
            bus: None,
            closed: default_closed_handler(),
            subscribers: Vec::new(),
        }
    }

    /// Replaces the runtime configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Publishes lifecycle events on an existing bus instead of a private one.
    ///
    /// Useful when several workers should share one stream of events.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Replaces the classifier used when the change stream closes unexpectedly.
    pub fn with_closed_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(Termination) -> Termination + Send + Sync + 'static,
    {
        self.closed = Arc::new(f);
        self
    }

    /// Sets event subscribers for this worker.
    ///
    /// Subscribers see this worker's events (and diagnostics of their own
    /// set) until it is dead, then their queues are drained and closed.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Spawns the worker task and returns its handle.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(self) -> Supervisor {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let id = next_worker_id();
        let name: Arc<str> = Arc::from(self.handler.name());

        let shared = Arc::new(Shared::new(id, name, bus.clone()));

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::for_worker(self.subscribers, bus.clone(), &self.cfg, id);
            // Subscribe before the runner exists so `WorkerStarting` is never missed.
            set.spawn_listener(bus.subscribe(), id, shared.dead.clone());
        }

        tokio::spawn(runner::run(self.handler, Arc::clone(&shared), self.closed));
        Supervisor { shared }
    }
}
