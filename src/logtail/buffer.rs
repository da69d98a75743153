//! # In-memory log store with filtered tailers.
//!
//! ```text
//! append(rec) ──► records (Vec) ──snapshot──► backlog ─┐
//!             └─► feed (broadcast) ───────────► live ──┴─► forwarder task ──► ChangeSender ──► tailer (ChannelWatcher)
//! ```
//!
//! ## Rules
//! - The snapshot and the live subscription are taken under the same lock as
//!   `append`, so a tailer sees every record exactly once.
//! - A `no_tail` tailer closes cleanly after its backlog.
//! - A tailer that lags behind the live feed closes with a failure.
//! - Stopping the tailer ends its forwarder task.
//! - With a retention limit the oldest records are evicted first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use super::params::LogTailerParams;
use super::record::LogRecord;
use crate::error::WorkerError;
use crate::watcher::{ChangeSender, ChannelWatcher, Termination, channel};

/// Opens log tailers.
#[async_trait]
pub trait LogTailerSource: Send + Sync + 'static {
    /// Starts a tailer yielding the records selected by `params`.
    async fn open_tailer(
        &self,
        params: LogTailerParams,
    ) -> Result<ChannelWatcher<LogRecord>, WorkerError>;
}

/// Records kept by [`LogBuffer::default`].
pub const DEFAULT_RETENTION: usize = 65_536;

struct Store {
    records: Mutex<VecDeque<LogRecord>>,
    feed: broadcast::Sender<LogRecord>,
    tailer_capacity: usize,
    retention: Option<usize>,
}

/// In-memory [`LogTailerSource`]. Clones share the same store.
#[derive(Clone)]
pub struct LogBuffer {
    store: Arc<Store>,
}

impl LogBuffer {
    /// Creates an empty store that keeps every record.
    ///
    /// `feed_capacity` bounds how far a live tailer may fall behind before it
    /// is closed with a failure (min 1).
    pub fn new(feed_capacity: usize) -> Self {
        Self::build(feed_capacity, None)
    }

    /// Creates an empty store that keeps at most `max_records` (min 1),
    /// evicting the oldest on overflow.
    pub fn with_retention(feed_capacity: usize, max_records: usize) -> Self {
        Self::build(feed_capacity, Some(max_records.max(1)))
    }

    fn build(feed_capacity: usize, retention: Option<usize>) -> Self {
        let capacity = feed_capacity.max(1);
        let (feed, _) = broadcast::channel(capacity);
        Self {
            store: Arc::new(Store {
                records: Mutex::new(VecDeque::new()),
                feed,
                tailer_capacity: capacity,
                retention,
            }),
        }
    }

    /// Stores `rec` and forwards it to live tailers.
    pub fn append(&self, rec: LogRecord) {
        let mut records = self
            .store
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = self.store.feed.send(rec.clone());
        records.push_back(rec);
        if let Some(max) = self.store.retention {
            while records.len() > max {
                records.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.store
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_retention(1024, DEFAULT_RETENTION)
    }
}

#[async_trait]
impl LogTailerSource for LogBuffer {
    async fn open_tailer(
        &self,
        params: LogTailerParams,
    ) -> Result<ChannelWatcher<LogRecord>, WorkerError> {
        let (backlog, live) = {
            let records = self
                .store
                .records
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let live = (!params.no_tail).then(|| self.store.feed.subscribe());
            let mut backlog: Vec<LogRecord> = records
                .iter()
                .filter(|r| params.matches(r))
                .cloned()
                .collect();
            if params.initial_lines > 0 && backlog.len() > params.initial_lines {
                let skip = backlog.len() - params.initial_lines;
                backlog = backlog.split_off(skip);
            }
            (backlog, live)
        };

        let (tx, tailer) = channel(self.store.tailer_capacity);
        tokio::spawn(forward(tx, backlog, live, params));
        Ok(tailer)
    }
}

async fn forward(
    tx: ChangeSender<LogRecord>,
    backlog: Vec<LogRecord>,
    live: Option<broadcast::Receiver<LogRecord>>,
    params: LogTailerParams,
) {
    for rec in backlog {
        if tx.send(rec).await.is_err() {
            return;
        }
    }
    let Some(mut live) = live else {
        tx.close(Termination::Clean);
        return;
    };

    loop {
        tokio::select! {
            biased;

            _ = tx.stopped() => return,

            rec = live.recv() => match rec {
                Ok(rec) => {
                    if params.matches(&rec) && tx.send(rec).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "log tailer fell behind");
                    tx.close(Termination::Failed(WorkerError::fail(format!(
                        "log tailer fell behind by {n} records"
                    ))));
                    return;
                }
                Err(RecvError::Closed) => {
                    tx.close(Termination::Failed(WorkerError::fail("log store closed")));
                    return;
                }
            },
        }
    }
}
