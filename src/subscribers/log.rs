//! # LogWriter: lifecycle events through `tracing`
//!
//! A subscriber that renders incoming [`Event`]s with `tracing` macros:
//! transitions at `debug`, failures at `warn`, faults and panics at `error`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG worker="debug-log" id=3 starting
//! WARN  worker="offer-sync" id=4 handled=2 reason="backend unavailable" react-failed
//! ERROR worker="machine-watcher" id=5 reason="watcher was stopped cleanly" classifier-fault
//! DEBUG worker="debug-log" id=3 handled=100 reason="" dead
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("unknown");
        let id = e.worker_id.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");
        let label = e.kind.as_label();

        match e.kind {
            EventKind::WorkerStarting | EventKind::WorkerDying | EventKind::WatcherStopped => {
                tracing::debug!(worker, id, reason, "{label}");
            }
            EventKind::WorkerDead => {
                let handled = e.handled.unwrap_or_default();
                if e.reason.is_some() {
                    tracing::warn!(worker, id, handled, reason, "{label}");
                } else {
                    tracing::debug!(worker, id, handled, "{label}");
                }
            }
            EventKind::AcquireFailed
            | EventKind::ReactFailed
            | EventKind::WatcherClosed
            | EventKind::ReleaseFailed => {
                tracing::warn!(worker, id, reason, "{label}");
            }
            EventKind::ClassifierFault | EventKind::WorkerPanicked => {
                tracing::error!(worker, id, reason, "{label}");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(subscriber = worker, reason, "{label}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
