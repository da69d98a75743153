//! # Worker supervision core.
//!
//! - [`Supervisor`]: owner handle (kill / stop / wait / phase)
//! - [`Killer`]: handle passed to handlers so they can end their own worker
//! - [`SupervisorBuilder`]: bus, subscribers, config and closed-channel policy
//! - [`ClosedHandler`], [`must_err`], [`ensure_err`]: unexpected-closure classification
//!
//! Internal:
//! - `runner`: the per-worker task
//! - `state`: phase plus write-once death reason

mod builder;
mod closed;
mod runner;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use closed::{ClosedHandler, default_closed_handler, ensure_err, must_err};
pub use state::Phase;
pub use supervisor::{Killer, Supervisor};
