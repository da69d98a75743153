//! # Supervisor and killer handles.
//!
//! [`Supervisor`] is the owner-facing handle of one running worker; [`Killer`]
//! is the narrow handle passed into [`NotifyHandler::react`](crate::NotifyHandler::react)
//! so a handler can end its own worker.
//!
//! Both wrap the same `Shared` state:
//!
//! ```text
//!            ┌──────────── Shared ────────────┐
//! Supervisor │ id, name                       │  kill / stop / wait / phase
//!     ───────► state: Phase + death reason    │
//!            │ dying: CancellationToken       │◄─── runner task (select! on dying)
//!  Killer    │ dead:  CancellationToken       │
//!     ───────► handled: AtomicU64             │
//!            │ bus: Bus                       │───► lifecycle events
//!            └────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - The first non-`None` reason wins; later ones are dropped.
//! - `kill` never blocks and is safe from any task, any number of times.
//! - `wait` may be awaited by any number of tasks, before or after death.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::state::{Phase, StateCell};
use crate::error::{WorkerError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::handler::NotifyHandler;

static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_worker_id() -> u64 {
    WORKER_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// State shared between the handles and the runner task.
pub(crate) struct Shared {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    state: StateCell,
    pub(crate) dying: CancellationToken,
    pub(crate) dead: CancellationToken,
    handled: AtomicU64,
    bus: Bus,
}

impl Shared {
    pub(crate) fn new(id: u64, name: Arc<str>, bus: Bus) -> Self {
        Self {
            id,
            name,
            state: StateCell::new(),
            dying: CancellationToken::new(),
            dead: CancellationToken::new(),
            handled: AtomicU64::new(0),
            bus,
        }
    }

    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_worker(self.id, Arc::clone(&self.name))
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    pub(crate) fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub(crate) fn bump_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Offers `err` as the death reason. Returns `true` if it won.
    pub(crate) fn commit(&self, err: WorkerError) -> bool {
        let text = err.to_string();
        let won = self.state.commit(err);
        if won {
            tracing::debug!(worker = %self.name, id = self.id, reason = %text, "death reason recorded");
        }
        won
    }

    /// Requests termination, optionally offering a reason.
    pub(crate) fn kill(&self, reason: Option<WorkerError>) {
        let text = reason.as_ref().map(ToString::to_string);
        if let Some(err) = reason {
            self.commit(err);
        }
        if self.state.begin_dying() {
            let mut ev = self.event(EventKind::WorkerDying);
            if let Some(text) = text {
                ev = ev.with_reason(text);
            }
            self.publish(ev);
        }
        self.dying.cancel();
    }

    /// Records a caught panic as the death reason and starts termination.
    pub(crate) fn panicked(&self, during: &'static str, payload: &(dyn std::any::Any + Send)) {
        let info = panic_message(payload);
        tracing::error!(worker = %self.name, id = self.id, during, %info, "worker panicked");
        self.publish(self.event(EventKind::WorkerPanicked).with_reason(info.as_str()));
        self.kill(Some(WorkerError::Panicked { info }));
    }

    /// Seals the death reason and releases every waiter.
    pub(crate) fn finish(&self) {
        let reason = self.state.seal();
        let mut ev = self.event(EventKind::WorkerDead).with_handled(self.handled());
        if let Some(err) = &reason {
            ev = ev.with_reason(err.to_string());
        }
        self.publish(ev);
        self.dead.cancel();
    }

    fn result(&self) -> Result<(), WorkerError> {
        match self.state.reason() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Handle to one supervised worker.
///
/// Cheap to clone; all clones refer to the same worker. Dropping every handle
/// does **not** stop the worker.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use watchvisor::{ChannelWatcher, Killer, NotifyHandler, Supervisor, WorkerError, channel};
///
/// struct Printer(Option<ChannelWatcher<u32>>);
///
/// #[async_trait]
/// impl NotifyHandler for Printer {
///     type Watcher = ChannelWatcher<u32>;
///
///     async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
///         self.0.take().ok_or_else(|| WorkerError::fail("no source"))
///     }
///
///     async fn react(&mut self, n: u32, killer: &Killer) -> Result<(), WorkerError> {
///         if n == 3 {
///             killer.kill(None);
///         }
///         Ok(())
///     }
///
///     async fn release(&mut self) -> Result<(), WorkerError> {
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (tx, watcher) = channel(8);
/// let sup = Supervisor::start(Printer(Some(watcher)));
/// for n in 1..=3 {
///     tx.send(n).await.ok();
/// }
/// assert!(sup.wait().await.is_ok());
/// assert_eq!(sup.handled(), 3);
/// # }
/// ```
#[derive(Clone)]
pub struct Supervisor {
    pub(crate) shared: Arc<Shared>,
}

impl Supervisor {
    /// Starts supervising `handler` with defaults.
    ///
    /// Must be called within a tokio runtime.
    pub fn start<H: NotifyHandler>(handler: H) -> Self {
        SupervisorBuilder::new(handler).start()
    }

    /// Returns a builder for non-default configuration.
    pub fn builder<H: NotifyHandler>(handler: H) -> SupervisorBuilder<H> {
        SupervisorBuilder::new(handler)
    }

    /// Requests termination. Never blocks.
    ///
    /// `Some(reason)` becomes the death reason unless another reason was
    /// recorded first. `None` asks for a clean stop.
    pub fn kill(&self, reason: Option<WorkerError>) {
        self.shared.kill(reason);
    }

    /// Requests a clean stop and waits for death.
    pub async fn stop(&self) -> Result<(), WorkerError> {
        self.kill(None);
        self.wait().await
    }

    /// Waits until the worker is dead and returns its death reason.
    ///
    /// Cancel-safe; returns immediately if the worker already died.
    pub async fn wait(&self) -> Result<(), WorkerError> {
        self.shared.dead.cancelled().await;
        self.shared.result()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.state.phase()
    }

    /// Process-unique worker id (used on published events).
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Handler label.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of changes processed without error so far.
    pub fn handled(&self) -> u64 {
        self.shared.handled()
    }

    /// Returns a killer for this worker.
    pub fn killer(&self) -> Killer {
        Killer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bus this worker publishes its lifecycle events on.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }
}

impl fmt::Display for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.name)
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Termination capability handed to handlers.
#[derive(Clone)]
pub struct Killer {
    pub(crate) shared: Arc<Shared>,
}

impl Killer {
    /// Requests termination of the owning worker; see [`Supervisor::kill`].
    pub fn kill(&self, reason: Option<WorkerError>) {
        self.shared.kill(reason);
    }

    /// `true` once termination was requested.
    pub fn is_dying(&self) -> bool {
        self.shared.dying.is_cancelled()
    }

    /// Resolves once termination was requested.
    pub async fn dying(&self) {
        self.shared.dying.cancelled().await;
    }

    /// Id of the owning worker.
    pub fn id(&self) -> u64 {
        self.shared.id
    }
}

impl fmt::Debug for Killer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Killer").field("id", &self.shared.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new(next_worker_id(), Arc::from("unit"), Bus::new(16)))
    }

    #[tokio::test]
    async fn kill_publishes_dying_once() {
        let sh = shared();
        let mut rx = sh.bus.subscribe();

        sh.kill(Some(WorkerError::fail("first")));
        sh.kill(Some(WorkerError::fail("second")));
        sh.kill(None);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::WorkerDying);
        assert_eq!(ev.reason.as_deref(), Some("first"));
        assert!(rx.try_recv().is_err());
        assert!(sh.dying.is_cancelled());
    }

    #[tokio::test]
    async fn finish_releases_waiters_with_the_first_reason() {
        let sh = shared();
        let sup = Supervisor {
            shared: Arc::clone(&sh),
        };
        let waiter = tokio::spawn({
            let sup = sup.clone();
            async move { sup.wait().await }
        });

        sh.kill(Some(WorkerError::fail("boom")));
        sh.finish();
        sh.kill(Some(WorkerError::fail("ignored")));

        assert_eq!(waiter.await.unwrap(), Err(WorkerError::fail("boom")));
        assert_eq!(sup.wait().await, Err(WorkerError::fail("boom")));
        assert_eq!(sup.phase(), Phase::Dead);
    }

    #[test]
    fn worker_ids_are_unique() {
        assert_ne!(next_worker_id(), next_worker_id());
    }
}
