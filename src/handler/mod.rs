//! # Task handler contract.
//!
//! A [`NotifyHandler`] is the per-use-case half of a supervised worker: it
//! knows how to obtain its watcher, what to do with one change, and how to
//! clean up. The [`Supervisor`](crate::Supervisor) supplies everything else.
//!
//! ```text
//! Supervisor task:
//!   acquire() ──► Watcher
//!   loop { change ──► react(change, &killer) }     (strictly sequential)
//!   watcher.stop()
//!   release()                                      (exactly once, always)
//! ```
//!
//! Handlers never need internal synchronization against the supervisor: all
//! three calls happen on the supervisor's task, one at a time.

use async_trait::async_trait;

use crate::core::Killer;
use crate::error::WorkerError;
use crate::watcher::Watcher;

/// # Acquire / react / release capability set of one background job.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use watchvisor::{ChannelWatcher, Killer, NotifyHandler, WorkerError, channel};
///
/// struct MachineCounter {
///     seen: usize,
///     source: Option<ChannelWatcher<String>>,
/// }
///
/// #[async_trait]
/// impl NotifyHandler for MachineCounter {
///     type Watcher = ChannelWatcher<String>;
///
///     fn name(&self) -> &str { "machine-counter" }
///
///     async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
///         self.source.take().ok_or_else(|| WorkerError::fail("already acquired"))
///     }
///
///     async fn react(&mut self, _machine: String, _killer: &Killer) -> Result<(), WorkerError> {
///         self.seen += 1;
///         Ok(())
///     }
///
///     async fn release(&mut self) -> Result<(), WorkerError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait NotifyHandler: Send + 'static {
    /// Watcher type returned by [`acquire`](NotifyHandler::acquire).
    type Watcher: Watcher;

    /// Human-readable label; forwarded by the supervisor's `Display`.
    ///
    /// The default uses `type_name::<Self>()`, override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Obtains the watcher. Called once, before any change is processed.
    ///
    /// An error aborts startup; [`release`](NotifyHandler::release) still runs.
    async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError>;

    /// Handles one change.
    ///
    /// An error ends the worker and becomes a death-reason candidate. Call
    /// `killer.kill(None)` to finish cleanly after this change.
    async fn react(
        &mut self,
        change: <Self::Watcher as Watcher>::Change,
        killer: &Killer,
    ) -> Result<(), WorkerError>;

    /// Releases resources. Called exactly once, however termination began.
    async fn release(&mut self) -> Result<(), WorkerError>;
}
