//! # Channel-closed classification.
//!
//! When a watcher's stream closes while the supervisor never asked it to stop,
//! the supervisor hands the watcher's [`Termination`] to a [`ClosedHandler`]
//! and folds the verdict into its death-reason race.
//!
//! ```text
//! unrequested closure ──► closed(watcher.err()) ──► Failed(e)  → death-reason candidate
//!                                               ├─► Clean      → no candidate
//!                                               ├─► StillAlive → no candidate
//!                                               └─► panic      → WorkerError::Fatal (recovery boundary)
//! ```
//!
//! The default policy is [`must_err`]: a watcher must never close "cleanly" on
//! its own, so anything but a concrete error is an implementation fault.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::{WorkerError, panic_message};
use crate::watcher::Termination;

/// Classifier invoked on unrequested stream closure.
pub type ClosedHandler = Arc<dyn Fn(Termination) -> Termination + Send + Sync>;

/// Returns the default classifier ([`must_err`]).
pub fn default_closed_handler() -> ClosedHandler {
    Arc::new(must_err)
}

/// Default classification policy.
///
/// # Panics
/// - on [`Termination::Clean`] with `"watcher was stopped cleanly"`;
/// - on [`Termination::StillAlive`] with `"watcher is still running"`.
///
/// A concrete failure is returned unchanged.
///
/// # Example
/// ```
/// use watchvisor::{Termination, WorkerError, must_err};
///
/// let boom = Termination::Failed(WorkerError::fail("boom"));
/// assert_eq!(must_err(boom.clone()), boom);
///
/// let clean = std::panic::catch_unwind(|| must_err(Termination::Clean));
/// assert!(clean.is_err());
/// ```
pub fn must_err(t: Termination) -> Termination {
    match t {
        Termination::Clean => panic!("watcher was stopped cleanly"),
        Termination::StillAlive => panic!("watcher is still running"),
        failed @ Termination::Failed(_) => failed,
    }
}

/// Returns the error that explains why `name`'s stream is closed.
///
/// Used by callers that read a watcher directly (outside a supervisor) and
/// find it closed: a failure is returned as-is, anything else is turned into
/// an error describing the broken expectation.
///
/// # Example
/// ```
/// use watchvisor::{Termination, ensure_err};
///
/// let err = ensure_err("offer watcher", Termination::Clean);
/// assert_eq!(err.to_string(), "expected an error from offer watcher, got nil");
/// ```
pub fn ensure_err(name: &str, t: Termination) -> WorkerError {
    match t {
        Termination::Failed(e) => e,
        Termination::Clean => WorkerError::fail(format!("expected an error from {name}, got nil")),
        Termination::StillAlive => WorkerError::fail("watcher is still running")
            .annotate(format!("expected {name} to be stopped")),
    }
}

/// Runs `closed` inside the recovery boundary.
///
/// Returns the panic message if the classifier raised a fault.
pub(crate) fn classify(closed: &ClosedHandler, reason: Termination) -> Result<Termination, String> {
    std::panic::catch_unwind(AssertUnwindSafe(|| closed(reason)))
        .map_err(|payload| panic_message(&*payload))
}
