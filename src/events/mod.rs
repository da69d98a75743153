//! Worker lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** every
//! supervisor publishes its lifecycle transitions on.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the supervisor runner, `Supervisor::kill`, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by the supervisor builder
//!   (fans out to `SubscriberSet`), or any caller of [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
