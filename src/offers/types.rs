use thiserror::Error;

/// One relation endpoint exposed by an offered service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub interface: String,
    pub role: String,
}

/// A service offered to other models under a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferedService {
    pub service_url: String,
    pub service_name: String,
    pub charm_name: String,
    pub description: String,
    pub registered: bool,
    pub endpoints: Vec<Endpoint>,
}

/// Query for [`OfferedServiceLister::list_offers`](super::OfferedServiceLister::list_offers).
///
/// Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferedServiceFilter {
    pub service_url: String,
    pub service_name: String,
}

impl OfferedServiceFilter {
    pub fn by_url(url: impl Into<String>) -> Self {
        Self {
            service_url: url.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, offer: &OfferedService) -> bool {
        (self.service_url.is_empty() || self.service_url == offer.service_url)
            && (self.service_name.is_empty() || self.service_name == offer.service_name)
    }
}

/// Per-URL lookup failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("offered service at {url:?} not found")]
    NotFound { url: String },

    #[error("expected 1 result, got {count}")]
    Ambiguous { url: String, count: usize },

    /// The lister itself failed.
    #[error("{error}")]
    Backend { error: String },
}

impl OfferError {
    pub fn backend(error: impl std::fmt::Display) -> Self {
        OfferError::Backend {
            error: error.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OfferError::NotFound { .. })
    }
}

/// Reply to a watch request: the registered watcher id and its first change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringsWatchResult {
    pub watcher_id: String,
    pub changes: Vec<String>,
}
