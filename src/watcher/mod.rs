//! # Watcher contract consumed by the supervisor.
//!
//! A [`Watcher`] is a change-notification source: it yields changes until its
//! stream closes, then reports *why* it closed through a [`Termination`].
//!
//! ```text
//!   next_change() ──► Some(change) ... Some(change) ──► None (closed, exactly once)
//!                                                          │
//!                                              err() ──────┘  Clean | StillAlive | Failed(e)
//!   stop() ──► closes the stream (idempotent) and returns what err() then returns
//! ```
//!
//! ## Rules
//! - `next_change` must be **cancel-safe**: the supervisor races it against its
//!   dying signal and drops the future when the signal wins.
//! - `err` is only meaningful once the stream has closed.
//! - `stop` may be called any number of times; every call returns the same value.

mod channel;

pub use channel::{ChangeSender, ChannelWatcher, channel};

use std::fmt;

use async_trait::async_trait;

use crate::error::WorkerError;

/// Why a watcher's change stream closed.
///
/// A tagged result rather than `Option<WorkerError>`, so "no problem" is never
/// confused with "no definitive cause recorded yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Termination {
    /// The watcher stopped without error.
    Clean,
    /// Closed, but no definitive cause has been recorded yet.
    #[default]
    StillAlive,
    /// The watcher died with an error.
    Failed(WorkerError),
}

impl Termination {
    /// Returns the failure, if any.
    pub fn error(&self) -> Option<&WorkerError> {
        match self {
            Termination::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the termination and returns the failure, if any.
    ///
    /// `StillAlive` maps to `None`: once the supervisor is terminating, an
    /// unfinalized reason is not a failure.
    pub fn into_error(self) -> Option<WorkerError> {
        match self {
            Termination::Failed(e) => Some(e),
            Termination::Clean | Termination::StillAlive => None,
        }
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        matches!(self, Termination::Clean)
    }

    #[inline]
    pub fn is_still_alive(&self) -> bool {
        matches!(self, Termination::StillAlive)
    }
}

impl From<Result<(), WorkerError>> for Termination {
    fn from(res: Result<(), WorkerError>) -> Self {
        match res {
            Ok(()) => Termination::Clean,
            Err(e) => Termination::Failed(e),
        }
    }
}

impl From<WorkerError> for Termination {
    fn from(err: WorkerError) -> Self {
        Termination::Failed(err)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Clean => f.write_str("stopped cleanly"),
            Termination::StillAlive => f.write_str("still running"),
            Termination::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// # Change-notification source.
///
/// Implemented by the state layer (and by [`ChannelWatcher`]). The supervisor
/// owns the watcher exclusively once a handler's `acquire` returns it.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use watchvisor::{Termination, Watcher};
///
/// /// Emits a fixed number of ticks, then closes with an error.
/// struct Ticks(u32);
///
/// #[async_trait]
/// impl Watcher for Ticks {
///     type Change = u32;
///
///     async fn next_change(&mut self) -> Option<u32> {
///         if self.0 == 0 { return None; }
///         self.0 -= 1;
///         Some(self.0)
///     }
///
///     fn err(&self) -> Termination {
///         Termination::Failed(watchvisor::WorkerError::fail("out of ticks"))
///     }
///
///     async fn stop(&mut self) -> Termination {
///         self.0 = 0;
///         self.err()
///     }
/// }
/// ```
#[async_trait]
pub trait Watcher: Send + 'static {
    /// Payload delivered with each change (`()` for pure notifications).
    type Change: Send + 'static;

    /// Waits for the next change; `None` once the stream has closed.
    ///
    /// Must be cancel-safe.
    async fn next_change(&mut self) -> Option<Self::Change>;

    /// Returns the termination reason; valid after the stream has closed.
    fn err(&self) -> Termination;

    /// Stops the watcher and waits until its stream is closed.
    ///
    /// Idempotent; returns the value [`err`](Watcher::err) returns afterwards.
    async fn stop(&mut self) -> Termination;
}
