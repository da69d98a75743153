//! # watchvisor
//!
//! **Watchvisor** supervises long-lived background workers that react to
//! change notifications.
//!
//! A worker is a [`NotifyHandler`] (acquire a watcher, react to each change,
//! release resources). The [`Supervisor`] runs it on its own task, shuts it
//! down exactly once, and reports a single death reason no matter which of
//! the racing parties (the handler, the watcher, cleanup, or an external
//! caller) noticed a problem first.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!      ┌───────────────┐        ┌──────────────────────────────┐
//!      │ NotifyHandler │        │  Watcher (state layer,       │
//!      │  (user logic) │        │   ChannelWatcher, tailers)   │
//!      └───────┬───────┘        └──────────────┬───────────────┘
//!              ▼                               │ next_change / err / stop
//! ┌────────────────────────────────────────────┴──────────────────────┐
//! │  Supervisor (one tokio task per worker)                           │
//! │  - Phase + write-once death reason                                │
//! │  - dying / dead signals (CancellationToken)                       │
//! │  - ClosedHandler (classifies unexpected stream closure)           │
//! └──────┬──────────────────────────────────────┬─────────────────────┘
//!        │ kill / stop / wait                   │ publishes lifecycle events
//!        ▼                                      ▼
//!   callers, Killer                 ┌────────────────────────┐
//!   (inside react)                  │ Bus (broadcast channel)│
//!                                   └───────────┬────────────┘
//!                                               ▼
//!                                   subscriber listener ──► SubscriberSet
//!                                                        ┌──────┼──────┐
//!                                                        ▼      ▼      ▼
//!                                                     sub1   sub2   subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::start(handler)
//!   ├─► publish WorkerStarting
//!   ├─► acquire()            ── Err ─► candidate, Dying
//!   ├─► loop {
//!   │     dying?             ─► exit
//!   │     change            ─► react(change, &killer) ── Err ─► candidate, Dying
//!   │     stream closed     ─► closed(watcher.err())  ── Failed ─► candidate
//!   │   }
//!   ├─► Dying: watcher.stop() ── Failed ─► candidate
//!   ├─► release()            ── Err ─► candidate
//!   └─► Dead: reason sealed, publish WorkerDead, wait() returns
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | Run, kill, stop and await one reactive worker.                | [`Supervisor`], [`Killer`], [`Phase`]      |
//! | **Contracts**     | What a worker and its change source must provide.             | [`NotifyHandler`], [`Watcher`]             |
//! | **Closure policy**| Classify a change stream that closed on its own.              | [`ClosedHandler`], [`must_err`]            |
//! | **Watchers**      | Channel-backed watcher driven by any producer.                | [`ChannelWatcher`], [`ChangeSender`]       |
//! | **Subscriber API**| Observe lifecycle events (logging, metrics, custom).          | [`Subscribe`], [`SubscriberSet`], [`Bus`]  |
//! | **Errors**        | One cloneable error type for every death reason.              | [`WorkerError`]                            |
//! | **Resources**     | Id-keyed registry of watchers and workers per connection.     | [`Resources`]                              |
//! | **Collaborators** | Debug-log streaming and offered-service sync built on top.    | [`logtail`], [`offers`]                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use watchvisor::{ChannelWatcher, Killer, NotifyHandler, Supervisor, Termination, WorkerError, channel};
//!
//! struct Counter {
//!     source: Option<ChannelWatcher<String>>,
//!     seen: Vec<String>,
//! }
//!
//! #[async_trait]
//! impl NotifyHandler for Counter {
//!     type Watcher = ChannelWatcher<String>;
//!
//!     fn name(&self) -> &str { "counter" }
//!
//!     async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
//!         self.source.take().ok_or_else(|| WorkerError::fail("already acquired"))
//!     }
//!
//!     async fn react(&mut self, change: String, _killer: &Killer) -> Result<(), WorkerError> {
//!         self.seen.push(change);
//!         Ok(())
//!     }
//!
//!     async fn release(&mut self) -> Result<(), WorkerError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (tx, watcher) = channel(16);
//!     let sup = Supervisor::start(Counter { source: Some(watcher), seen: Vec::new() });
//!     assert_eq!(sup.to_string(), "counter");
//!
//!     tx.send("machine-0".to_string()).await.ok();
//!     tx.close(Termination::Failed(WorkerError::fail("state closed")));
//!
//!     let err = sup.wait().await.unwrap_err();
//!     assert_eq!(err.to_string(), "state closed");
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod handler;
mod resources;
mod subscribers;
mod watcher;

pub mod logtail;
pub mod offers;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    ClosedHandler, Killer, Phase, Supervisor, SupervisorBuilder, default_closed_handler,
    ensure_err, must_err,
};
pub use error::WorkerError;
pub use events::{Bus, Event, EventKind};
pub use handler::NotifyHandler;
pub use resources::{Resource, Resources};
pub use subscribers::{Subscribe, SubscriberSet};
pub use watcher::{ChangeSender, ChannelWatcher, Termination, Watcher, channel};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
