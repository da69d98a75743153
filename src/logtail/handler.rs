use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::buffer::LogTailerSource;
use super::params::DebugLogParams;
use super::record::{LogRecord, format_record};
use crate::core::{Killer, Supervisor, must_err};
use crate::error::WorkerError;
use crate::handler::NotifyHandler;
use crate::watcher::{ChannelWatcher, Termination};

/// Streams tailed log records to an async sink, one formatted line per record.
pub struct DebugLogHandler<S, W> {
    source: Arc<S>,
    params: DebugLogParams,
    sink: W,
    lines: u64,
}

impl<S, W> DebugLogHandler<S, W>
where
    S: LogTailerSource,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(source: Arc<S>, params: DebugLogParams, sink: W) -> Self {
        Self {
            source,
            params,
            sink,
            lines: 0,
        }
    }
}

#[async_trait]
impl<S, W> NotifyHandler for DebugLogHandler<S, W>
where
    S: LogTailerSource,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Watcher = ChannelWatcher<LogRecord>;

    fn name(&self) -> &str {
        "debug-log"
    }

    async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
        self.source
            .open_tailer(self.params.tailer_params())
            .await
            .map_err(|e| e.annotate("cannot open log tailer"))
    }

    async fn react(&mut self, rec: LogRecord, killer: &Killer) -> Result<(), WorkerError> {
        let line = format_record(&rec);
        self.sink
            .write_all(line.as_bytes())
            .await
            .map_err(|e| WorkerError::from(e).annotate("sending failed"))?;

        self.lines += 1;
        if self.params.max_lines > 0 && self.lines == self.params.max_lines {
            killer.kill(None);
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<(), WorkerError> {
        self.sink
            .flush()
            .await
            .map_err(|e| WorkerError::from(e).annotate("sending failed"))
    }
}

/// Closed-channel policy for log tailers.
///
/// A `no_tail` tailer legitimately ends cleanly once its backlog is sent; a
/// failure is reported as `"tailer stopped: …"`.
pub fn debug_log_closed(t: Termination) -> Termination {
    match t {
        Termination::Clean => Termination::Clean,
        Termination::Failed(e) => Termination::Failed(e.annotate("tailer stopped")),
        still @ Termination::StillAlive => must_err(still),
    }
}

/// Starts a supervisor streaming the records selected by `params` into `sink`.
///
/// The worker ends cleanly after `max_lines` lines, at the end of a `no_tail`
/// backlog, or on `stop()`.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use tokio::io::AsyncReadExt;
/// use watchvisor::logtail::{DebugLogParams, Level, LogBuffer, LogRecord, stream_debug_log};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let logs = Arc::new(LogBuffer::default());
/// logs.append(LogRecord::new("machine-0", Level::Info, "juju.worker", "hello"));
///
/// let (sink, mut client) = tokio::io::duplex(4096);
/// let params = DebugLogParams { no_tail: true, ..Default::default() };
/// let sup = stream_debug_log(logs, params, sink);
/// assert!(sup.wait().await.is_ok());
///
/// let mut out = String::new();
/// client.read_to_string(&mut out).await.unwrap();
/// assert!(out.ends_with("INFO juju.worker  hello\n"));
/// # }
/// ```
pub fn stream_debug_log<S, W>(source: Arc<S>, params: DebugLogParams, sink: W) -> Supervisor
where
    S: LogTailerSource,
    W: AsyncWrite + Unpin + Send + 'static,
{
    Supervisor::builder(DebugLogHandler::new(source, params, sink))
        .with_closed_handler(debug_log_closed)
        .start()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::catch_unwind;

    #[test]
    fn closed_policy() {
        assert_eq!(debug_log_closed(Termination::Clean), Termination::Clean);
        assert_eq!(
            debug_log_closed(Termination::Failed(WorkerError::fail("store gone")))
                .to_string(),
            "tailer stopped: store gone"
        );
        assert!(catch_unwind(|| debug_log_closed(Termination::StillAlive)).is_err());
    }
}
