//! # Offered-service queries and watches.
//!
//! ```text
//! offered_services([url...]) ──► for each url: list_offers(by_url) ──► 1 match  → Ok(offer)
//!                                                                 ├─► 0        → NotFound
//!                                                                 ├─► n > 1    → Ambiguous
//!                                                                 └─► Err      → Backend
//!
//! watch_offered_services() ──► st.watch_offered_services() ──► first change ─► register ─► StringsWatchResult
//!                                                                └─ closed ───► ensure_err(...)
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{OfferError, OfferedService, OfferedServiceFilter, StringsWatchResult};
use crate::core::ensure_err;
use crate::error::WorkerError;
use crate::resources::Resources;
use crate::watcher::Watcher;

/// Queries offered services.
#[async_trait]
pub trait OfferedServiceLister: Send + Sync + 'static {
    /// Returns the offers matching any of `filters`.
    async fn list_offers(
        &self,
        filters: &[OfferedServiceFilter],
    ) -> Result<Vec<OfferedService>, OfferError>;
}

/// Change source for offered-service URLs.
pub trait OfferedServiceWatch: Send + Sync + 'static {
    type Watcher: Watcher<Change = Vec<String>>;

    /// Starts a watcher whose first change lists every current URL.
    fn watch_offered_services(&self) -> Self::Watcher;
}

/// Resolves `url` to exactly one offer.
pub async fn resolve_offer<L>(lister: &L, url: &str) -> Result<OfferedService, OfferError>
where
    L: OfferedServiceLister + ?Sized,
{
    let mut found = lister
        .list_offers(&[OfferedServiceFilter::by_url(url)])
        .await?;
    match found.len() {
        0 => Err(OfferError::NotFound {
            url: url.to_string(),
        }),
        1 => Ok(found.remove(0)),
        count => Err(OfferError::Ambiguous {
            url: url.to_string(),
            count,
        }),
    }
}

/// Offered-service queries on behalf of one connection.
pub struct OfferedServiceApi<S, L> {
    st: Arc<S>,
    offers: Arc<L>,
    resources: Arc<Resources>,
}

impl<S, L> OfferedServiceApi<S, L>
where
    S: OfferedServiceWatch,
    L: OfferedServiceLister,
{
    pub fn new(st: Arc<S>, offers: Arc<L>, resources: Arc<Resources>) -> Self {
        Self {
            st,
            offers,
            resources,
        }
    }

    /// Looks up each URL; results are returned in request order.
    pub async fn offered_services(
        &self,
        urls: &[String],
    ) -> Vec<Result<OfferedService, OfferError>> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(resolve_offer(self.offers.as_ref(), url).await);
        }
        results
    }

    /// Starts a watcher, waits for its first change and registers it.
    ///
    /// # Errors
    /// If the watcher closes before its first change, its termination is
    /// returned through [`ensure_err`].
    pub async fn watch_offered_services(&self) -> Result<StringsWatchResult, WorkerError> {
        let mut watch = self.st.watch_offered_services();
        match watch.next_change().await {
            Some(changes) => Ok(StringsWatchResult {
                watcher_id: self.resources.register_watcher(watch),
                changes,
            }),
            None => Err(ensure_err("offered services watcher", watch.err())),
        }
    }
}
