//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`], which distributes events to multiple
//! subscribers concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: slow/panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//! - **Ownership**: a set started for a worker tags its diagnostics with that worker's id
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::panic_message;
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
    owner: Option<u64>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber, using
    /// each subscriber's preferred queue capacity.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        Self::with_config(subs, bus, &Config::default())
    }

    /// Creates a new set with queue capacities resolved through `cfg`.
    #[must_use]
    pub fn with_config(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, cfg: &Config) -> Self {
        Self::build(subs, bus, cfg, None)
    }

    /// Creates a set serving the worker `owner`.
    pub(crate) fn for_worker(
        subs: Vec<Arc<dyn Subscribe>>,
        bus: Bus,
        cfg: &Config,
        owner: u64,
    ) -> Self {
        Self::build(subs, bus, cfg, Some(owner))
    }

    fn build(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, cfg: &Config, owner: Option<u64>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = cfg.queue_capacity_for(sub.as_ref());
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let s = Arc::clone(&sub);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = s.on_event(ev.as_ref());

                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_message(&*panic_err);
                        tracing::warn!(subscriber = s.name(), %info, "subscriber panicked");
                        bus_for_worker
                            .publish(Event::subscriber_panicked(s.name(), info).owned_by(owner));
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
            owner,
        }
    }

    /// Emits an event to all subscribers (clones the event once).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// - On queue full: drops event, publishes `SubscriberOverflow`
    /// - On queue closed: publishes `SubscriberOverflow` with reason "closed"
    ///
    /// `SubscriberOverflow` events are not re-published if they themselves overflow.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = event.is_subscriber_overflow();

        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if !is_overflow_evt {
                        self.bus.publish(
                            Event::subscriber_overflow(channel.name, "full").owned_by(self.owner),
                        );
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    if !is_overflow_evt {
                        self.bus.publish(
                            Event::subscriber_overflow(channel.name, "closed").owned_by(self.owner),
                        );
                    }
                }
            }
        }
    }

    /// Drives this set from a bus receiver on behalf of the worker `id`,
    /// then shuts the set down.
    ///
    /// Only events tagged with `id` are forwarded. The listener ends after
    /// forwarding the worker's `WorkerDead`, or once `dead` fires: whatever is
    /// still queued on `rx` is drained first, so a lagged receiver cannot keep
    /// the subscribers alive.
    pub(crate) fn spawn_listener(
        self,
        mut rx: broadcast::Receiver<Event>,
        id: u64,
        dead: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = dead.cancelled() => {
                        self.drain(&mut rx, id);
                        break;
                    }

                    res = rx.recv() => match res {
                        Ok(ev) => {
                            if self.forward(&ev, id) {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(worker_id = id, skipped = n, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            self.shutdown().await;
        })
    }

    /// Emits `ev` if it belongs to worker `id`. Returns `true` on its `WorkerDead`.
    fn forward(&self, ev: &Event, id: u64) -> bool {
        if !ev.is_from(id) {
            return false;
        }
        self.emit(ev);
        ev.kind == EventKind::WorkerDead
    }

    fn drain(&self, rx: &mut broadcast::Receiver<Event>, id: u64) {
        loop {
            match rx.try_recv() {
                Ok(ev) => {
                    if self.forward(&ev, id) {
                        return;
                    }
                }
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(worker_id = id, skipped = n, "subscriber listener lagged behind the bus");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return,
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Drops all channel senders (workers see channel closed)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }

        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_is_reported_and_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let collect = Arc::new(Collect::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone(), Arc::new(Explode)];
        let set = SubscriberSet::new(subs, bus.clone());
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::WorkerStarting));

        let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no panic event")
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));

        set.shutdown().await;
        assert_eq!(*collect.0.lock().unwrap(), vec![EventKind::WorkerStarting]);
    }

    #[tokio::test]
    async fn listener_stops_after_worker_dead() {
        let bus = Bus::new(16);
        let collect = Arc::new(Collect::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone()];
        let set = SubscriberSet::for_worker(subs, bus.clone(), &Config::default(), 42);
        let listener = set.spawn_listener(bus.subscribe(), 42, CancellationToken::new());

        bus.publish(Event::new(EventKind::WorkerStarting).with_worker(42, "w"));
        bus.publish(Event::new(EventKind::WorkerStarting).with_worker(43, "other"));
        bus.publish(Event::new(EventKind::WorkerDead).with_worker(42, "w"));

        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("listener did not finish")
            .unwrap();
        assert_eq!(
            *collect.0.lock().unwrap(),
            vec![EventKind::WorkerStarting, EventKind::WorkerDead]
        );
    }

    #[tokio::test]
    async fn listener_drains_and_stops_once_dead_fires() {
        let bus = Bus::new(16);
        let collect = Arc::new(Collect::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone()];
        let set = SubscriberSet::for_worker(subs, bus.clone(), &Config::default(), 7);
        let dead = CancellationToken::new();
        let listener = set.spawn_listener(bus.subscribe(), 7, dead.clone());

        bus.publish(Event::new(EventKind::WorkerStarting).with_worker(7, "w"));
        bus.publish(Event::subscriber_overflow("audit", "full").owned_by(Some(8)));
        bus.publish(Event::subscriber_overflow("audit", "full").owned_by(Some(7)));
        dead.cancel();

        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("listener did not finish")
            .unwrap();
        assert_eq!(
            *collect.0.lock().unwrap(),
            vec![EventKind::WorkerStarting, EventKind::SubscriberOverflow]
        );
        assert_eq!(Arc::strong_count(&collect), 1);
    }

    #[tokio::test]
    async fn owned_set_tags_its_diagnostics() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Explode)];
        let set = SubscriberSet::for_worker(subs, bus.clone(), &Config::default(), 5);

        set.emit(&Event::new(EventKind::WorkerStarting).with_worker(5, "w"));
        let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no panic event")
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert!(ev.is_from(5));
        set.shutdown().await;
    }
}
