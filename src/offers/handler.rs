use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::api::{OfferedServiceLister, OfferedServiceWatch, resolve_offer};
use super::types::{OfferError, OfferedService};
use crate::core::Killer;
use crate::error::WorkerError;
use crate::handler::NotifyHandler;

/// Resolution of one changed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferUpdate {
    pub url: String,
    pub result: Result<OfferedService, OfferError>,
}

/// Resolves every changed offer URL and forwards the outcome.
///
/// The worker stops cleanly once the receiving side of `updates` is gone.
pub struct OfferSyncHandler<S, L> {
    st: Arc<S>,
    offers: Arc<L>,
    updates: mpsc::Sender<OfferUpdate>,
}

impl<S, L> OfferSyncHandler<S, L>
where
    S: OfferedServiceWatch,
    L: OfferedServiceLister,
{
    pub fn new(st: Arc<S>, offers: Arc<L>, updates: mpsc::Sender<OfferUpdate>) -> Self {
        Self {
            st,
            offers,
            updates,
        }
    }
}

#[async_trait]
impl<S, L> NotifyHandler for OfferSyncHandler<S, L>
where
    S: OfferedServiceWatch,
    L: OfferedServiceLister,
{
    type Watcher = S::Watcher;

    fn name(&self) -> &str {
        "offer-sync"
    }

    async fn acquire(&mut self) -> Result<S::Watcher, WorkerError> {
        Ok(self.st.watch_offered_services())
    }

    async fn react(&mut self, urls: Vec<String>, killer: &Killer) -> Result<(), WorkerError> {
        for url in urls {
            let result = resolve_offer(self.offers.as_ref(), &url).await;
            if let Err(OfferError::Backend { error }) = &result {
                return Err(WorkerError::fail(error).annotate(format!("resolving {url:?}")));
            }
            if self.updates.send(OfferUpdate { url, result }).await.is_err() {
                killer.kill(None);
                break;
            }
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }
}
