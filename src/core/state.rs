//! # Lifecycle phase and write-once death reason.
//!
//! Both live behind one mutex so that "is it dead yet?" and "may I still
//! record a reason?" are answered atomically.
//!
//! ```text
//!   Alive ──begin_dying()──► Dying ──seal()──► Dead
//!     │                                          ▲
//!     └────────────────── seal() ────────────────┘
//!
//!   commit(err): stored only if no reason yet AND phase != Dead
//! ```

use std::sync::{Mutex, PoisonError};

use crate::error::WorkerError;

/// Lifecycle phase of a supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Running: reacting to changes (or still acquiring its watcher).
    Alive,
    /// Termination requested; no further `react` calls start.
    Dying,
    /// Watcher stopped, `release` returned, death reason sealed.
    Dead,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    reason: Option<WorkerError>,
}

/// Phase plus first-wins death reason.
#[derive(Debug)]
pub(crate) struct StateCell {
    inner: Mutex<Inner>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Alive,
                reason: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `err` if no reason is recorded yet and the worker is not dead.
    ///
    /// Returns `true` if this call set the reason.
    pub(crate) fn commit(&self, err: WorkerError) -> bool {
        let mut inner = self.lock();
        if inner.reason.is_some() || inner.phase == Phase::Dead {
            return false;
        }
        inner.reason = Some(err);
        true
    }

    /// Moves `Alive` to `Dying`. Returns `true` on the transition.
    pub(crate) fn begin_dying(&self) -> bool {
        let mut inner = self.lock();
        if inner.phase == Phase::Alive {
            inner.phase = Phase::Dying;
            true
        } else {
            false
        }
    }

    /// Marks the worker dead and returns the final reason.
    pub(crate) fn seal(&self) -> Option<WorkerError> {
        let mut inner = self.lock();
        inner.phase = Phase::Dead;
        inner.reason.clone()
    }

    pub(crate) fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub(crate) fn reason(&self) -> Option<WorkerError> {
        self.lock().reason.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let cell = StateCell::new();
        assert!(cell.commit(WorkerError::fail("first")));
        assert!(!cell.commit(WorkerError::fail("second")));
        assert_eq!(cell.reason(), Some(WorkerError::fail("first")));
    }

    #[test]
    fn phases_only_move_forward() {
        let cell = StateCell::new();
        assert_eq!(cell.phase(), Phase::Alive);
        assert!(cell.begin_dying());
        assert!(!cell.begin_dying());
        assert_eq!(cell.phase(), Phase::Dying);

        assert_eq!(cell.seal(), None);
        assert_eq!(cell.phase(), Phase::Dead);
        assert!(!cell.begin_dying());
    }

    #[test]
    fn sealed_reason_is_immutable() {
        let cell = StateCell::new();
        cell.seal();
        assert!(!cell.commit(WorkerError::fail("too late")));
        assert_eq!(cell.reason(), None);
    }

    #[test]
    fn commit_works_while_dying() {
        let cell = StateCell::new();
        cell.begin_dying();
        assert!(cell.commit(WorkerError::fail("failed to tear down watcher")));
        assert_eq!(
            cell.seal(),
            Some(WorkerError::fail("failed to tear down watcher"))
        );
    }
}
