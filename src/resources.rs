//! # Id-keyed registry of stoppable resources.
//!
//! A facade connection hands out watchers and workers to a remote caller by
//! id; [`Resources`] keeps them alive until the caller (or connection
//! teardown) stops them.
//!
//! ```text
//! register(w) ──► "1"      stop("1") ──► remove + w.stop_resource()
//! register(s) ──► "2"      stop_all() ─► stop every entry, newest first
//! ```
//!
//! Ids are decimal strings, unique for the lifetime of the registry.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::core::Supervisor;
use crate::error::WorkerError;
use crate::watcher::{ChannelWatcher, Watcher};

/// Something that can be stopped on behalf of a remote caller.
#[async_trait]
pub trait Resource: Send + 'static {
    /// Stops the resource and reports why it ended.
    async fn stop_resource(&mut self) -> Result<(), WorkerError>;
}

#[async_trait]
impl<C: Send + 'static> Resource for ChannelWatcher<C> {
    async fn stop_resource(&mut self) -> Result<(), WorkerError> {
        self.stop().await.into_error().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Resource for Supervisor {
    async fn stop_resource(&mut self) -> Result<(), WorkerError> {
        self.stop().await
    }
}

/// Adapter for arbitrary watchers.
struct Watched<W>(W);

#[async_trait]
impl<W: Watcher> Resource for Watched<W> {
    async fn stop_resource(&mut self) -> Result<(), WorkerError> {
        self.0.stop().await.into_error().map_or(Ok(()), Err)
    }
}

#[derive(Default)]
struct Entries {
    last_id: u64,
    items: BTreeMap<u64, Box<dyn Resource>>,
}

/// Registry of resources owned by one connection.
#[derive(Default)]
pub struct Resources {
    entries: Mutex<Entries>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `r` and returns its id.
    pub fn register(&self, r: impl Resource) -> String {
        let mut entries = self.lock();
        entries.last_id += 1;
        let id = entries.last_id;
        entries.items.insert(id, Box::new(r));
        id.to_string()
    }

    /// Registers any [`Watcher`] and returns its id.
    pub fn register_watcher<W: Watcher>(&self, w: W) -> String {
        self.register(Watched(w))
    }

    /// Stops and forgets the resource with `id`.
    ///
    /// Unknown ids are ignored.
    pub async fn stop(&self, id: &str) -> Result<(), WorkerError> {
        let Ok(key) = id.parse::<u64>() else {
            return Ok(());
        };
        let entry = self.lock().items.remove(&key);
        match entry {
            Some(mut r) => r.stop_resource().await,
            None => Ok(()),
        }
    }

    /// Stops every resource, newest first, and returns the first error.
    ///
    /// Later errors are logged and dropped.
    pub async fn stop_all(&self) -> Result<(), WorkerError> {
        let drained = std::mem::take(&mut self.lock().items);
        let mut first = None;
        for (id, mut r) in drained.into_iter().rev() {
            if let Err(err) = r.stop_resource().await {
                tracing::warn!(resource = id, error = %err, "error stopping resource");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Number of registered resources.
    pub fn count(&self) -> usize {
        self.lock().items.len()
    }
}
