//! # Offered services.
//!
//! Per-URL lookup of services offered to other models ([`OfferedServiceApi`]),
//! the watch entry point that hands a registered watcher id back to the
//! caller, and [`OfferSyncHandler`], a supervised worker that keeps resolving
//! offers as their URLs change.

mod api;
mod handler;
mod types;

pub use api::{OfferedServiceApi, OfferedServiceLister, OfferedServiceWatch, resolve_offer};
pub use handler::{OfferSyncHandler, OfferUpdate};
pub use types::{Endpoint, OfferError, OfferedService, OfferedServiceFilter, StringsWatchResult};
