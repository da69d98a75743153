//! # Channel-backed watcher.
//!
//! [`channel`] creates a connected pair:
//! - [`ChangeSender`] held by the producer (state layer, log store, tests);
//! - [`ChannelWatcher`] handed to a supervisor through a handler's `acquire`.
//!
//! ```text
//! producer ── send(change) ──► [bounded mpsc] ──► ChannelWatcher::next_change()
//!          ── close(t)     ──► stream ends, err() == t
//! supervisor ── stop() ──► stream ends, stopped() resolves for the producer
//! ```
//!
//! ## Rules
//! - The termination reason is written once while the watcher is still alive;
//!   later writes are ignored.
//! - `stop()` finalizes a still-alive reason as [`Termination::Clean`].
//! - Sends after `stop()` fail and hand the change back.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Termination, Watcher};

/// State shared by both halves.
#[derive(Debug)]
struct Inner {
    termination: Mutex<Termination>,
    stopping: CancellationToken,
}

impl Inner {
    /// Records `t` unless a definitive reason is already present.
    fn record(&self, t: Termination) {
        let mut cur = self
            .termination
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cur.is_still_alive() {
            *cur = t;
        }
    }

    fn current(&self) -> Termination {
        self.termination
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Creates a watcher and the sender that drives it.
///
/// `capacity` bounds the number of undelivered changes (minimum 1).
///
/// # Example
/// ```
/// use watchvisor::{Termination, Watcher, WorkerError, channel};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (tx, mut w) = channel::<&'static str>(4);
/// tx.send("machine-0").await.unwrap();
/// tx.close(Termination::Failed(WorkerError::fail("state closed")));
///
/// assert_eq!(w.next_change().await, Some("machine-0"));
/// assert_eq!(w.next_change().await, None);
/// assert_eq!(w.err().to_string(), "state closed");
/// # }
/// ```
pub fn channel<C: Send + 'static>(capacity: usize) -> (ChangeSender<C>, ChannelWatcher<C>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let inner = Arc::new(Inner {
        termination: Mutex::new(Termination::StillAlive),
        stopping: CancellationToken::new(),
    });
    (
        ChangeSender {
            tx,
            inner: Arc::clone(&inner),
        },
        ChannelWatcher { rx, inner },
    )
}

/// Producer half of a [`ChannelWatcher`].
///
/// Dropping it closes the stream with whatever reason was recorded so far
/// (still-alive if none).
#[derive(Debug)]
pub struct ChangeSender<C> {
    tx: mpsc::Sender<C>,
    inner: Arc<Inner>,
}

impl<C: Send + 'static> ChangeSender<C> {
    /// Delivers one change, waiting for capacity.
    ///
    /// Returns the change back if the watcher was stopped.
    pub async fn send(&self, change: C) -> Result<(), C> {
        self.tx.send(change).await.map_err(|e| e.0)
    }

    /// Records a termination reason without closing the stream.
    ///
    /// It becomes the value `stop()` reports, unless a reason was already set.
    pub fn set_termination(&self, t: Termination) {
        self.inner.record(t);
    }

    /// Records `t` and closes the stream.
    ///
    /// Changes already queued are still delivered before the closure is observed.
    pub fn close(self, t: Termination) {
        self.inner.record(t);
        drop(self.tx);
    }

    /// Resolves once the consumer called [`Watcher::stop`].
    pub async fn stopped(&self) {
        self.inner.stopping.cancelled().await;
    }

    /// Returns `true` once the consumer called [`Watcher::stop`].
    pub fn is_stopped(&self) -> bool {
        self.inner.stopping.is_cancelled()
    }
}

/// Consumer half: a [`Watcher`] over a bounded mpsc channel.
#[derive(Debug)]
pub struct ChannelWatcher<C> {
    rx: mpsc::Receiver<C>,
    inner: Arc<Inner>,
}

impl<C> ChannelWatcher<C> {
    /// Returns `true` once `stop()` has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopping.is_cancelled()
    }
}

#[async_trait]
impl<C: Send + 'static> Watcher for ChannelWatcher<C> {
    type Change = C;

    async fn next_change(&mut self) -> Option<C> {
        self.rx.recv().await
    }

    fn err(&self) -> Termination {
        self.inner.current()
    }

    async fn stop(&mut self) -> Termination {
        self.inner.stopping.cancel();
        self.rx.close();
        self.inner.record(Termination::Clean);
        self.inner.current()
    }
}
