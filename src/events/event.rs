//! # Lifecycle events emitted by supervisors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: starting, dying, dead
//! - **Failure events**: acquire/react/release failures, unexpected closure, faults
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries metadata such as timestamps, the worker it
//! belongs to, a human-readable reason, and the number of handled changes.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events of one worker are published from its own task in lifecycle order, except
//! `WorkerDying`, which is published by whichever caller first requests termination.
//!
//! ## Example
//! ```rust
//! use watchvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReactFailed)
//!     .with_worker(7, "offer-sync")
//!     .with_reason("boom")
//!     .with_handled(3);
//!
//! assert_eq!(ev.kind, EventKind::ReactFailed);
//! assert_eq!(ev.worker.as_deref(), Some("offer-sync"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Worker lifecycle ===
    /// Supervisor task started; `acquire` is about to run.
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    WorkerStarting,

    /// Termination was requested for the first time (kill, stop, or internal failure).
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    /// - `reason`: the kill reason, if one was given
    WorkerDying,

    /// Worker is dead; `wait()` callers are released.
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    /// - `handled`: number of completed `react` calls
    /// - `reason`: the recorded death reason (absent on clean shutdown)
    WorkerDead,

    // === Failures ===
    /// `acquire` returned an error.
    ///
    /// Sets:
    /// - `worker_id`, `worker`, `reason`
    AcquireFailed,

    /// `react` returned an error.
    ///
    /// Sets:
    /// - `worker_id`, `worker`, `reason`, `handled`
    ReactFailed,

    /// The change stream closed without a stop request.
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    /// - `reason`: the watcher's termination
    WatcherClosed,

    /// The watcher was stopped during termination.
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    /// - `reason`: the stop termination
    WatcherStopped,

    /// `release` returned an error.
    ///
    /// Sets:
    /// - `worker_id`, `worker`, `reason`
    ReleaseFailed,

    /// The closed-channel classifier raised an implementation fault.
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    /// - `reason`: the fault message
    ClassifierFault,

    /// A handler or watcher call panicked.
    ///
    /// Sets:
    /// - `worker_id`, `worker`
    /// - `reason`: panic info/message
    WorkerPanicked,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::WorkerStarting => "starting",
            EventKind::WorkerDying => "dying",
            EventKind::WorkerDead => "dead",
            EventKind::AcquireFailed => "acquire-failed",
            EventKind::ReactFailed => "react-failed",
            EventKind::WatcherClosed => "watcher-closed",
            EventKind::WatcherStopped => "watcher-stopped",
            EventKind::ReleaseFailed => "release-failed",
            EventKind::ClassifierFault => "classifier-fault",
            EventKind::WorkerPanicked => "panicked",
        }
    }
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Id of the supervisor that published the event. For subscriber
    /// diagnostics, the worker whose subscriber set raised them.
    pub worker_id: Option<u64>,
    /// Worker (or subscriber) name, if applicable.
    pub worker: Option<Arc<str>>,
    /// Human-readable reason (errors, terminations, overflow details).
    pub reason: Option<Arc<str>>,
    /// Number of completed `react` calls at the time of the event.
    pub handled: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker_id: None,
            worker: None,
            reason: None,
            handled: None,
        }
    }

    /// Attaches the publishing worker.
    #[inline]
    pub fn with_worker(mut self, id: u64, name: impl Into<Arc<str>>) -> Self {
        self.worker_id = Some(id);
        self.worker = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the handled-change count.
    #[inline]
    pub fn with_handled(mut self, n: u64) -> Self {
        self.handled = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_subscriber(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_subscriber(subscriber)
            .with_reason(info)
    }

    /// Attributes a subscriber diagnostic to the worker owning the set.
    #[inline]
    pub(crate) fn owned_by(mut self, owner: Option<u64>) -> Self {
        self.worker_id = owner;
        self
    }

    /// Returns `true` if this event belongs to the worker with `id`.
    #[inline]
    pub fn is_from(&self, id: u64) -> bool {
        self.worker_id == Some(id)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    fn with_subscriber(mut self, name: &'static str) -> Self {
        self.worker = Some(Arc::from(name));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::WorkerStarting);
        let b = Event::new(EventKind::WorkerDead);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_events_have_no_worker_id() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.worker.as_deref(), Some("audit"));
        assert_eq!(ev.worker_id, None);
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
