//! # Example: debug_log
//!
//! Streams an in-memory log store to stdout the way a debug-log client sees
//! it, with lifecycle events rendered by the built-in [`LogWriter`].
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example debug_log --features logging
//! ```

use std::{sync::Arc, time::Duration};

use tracing_subscriber::EnvFilter;
use watchvisor::logtail::{
    DebugLogHandler, DebugLogParams, Level, LogBuffer, LogRecord, debug_log_closed,
};
use watchvisor::{LogWriter, Subscribe, Supervisor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let logs = Arc::new(LogBuffer::default());
    logs.append(LogRecord::new("machine-0", Level::Info, "juju.worker", "agent started"));
    logs.append(LogRecord::new("machine-0", Level::Debug, "juju.worker.uniter", "hook queued"));
    logs.append(
        LogRecord::new("unit-mysql-0", Level::Error, "juju.worker.uniter", "hook failed")
            .with_location("uniter.go:214"),
    );

    let params = DebugLogParams {
        max_lines: 4,
        filter_level: Level::Info,
        include_module: vec!["juju.worker".into()],
        from_the_start: true,
        ..Default::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(DebugLogHandler::new(
        Arc::clone(&logs),
        params,
        tokio::io::stdout(),
    ))
    .with_closed_handler(debug_log_closed)
    .with_subscribers(subs)
    .start();

    // Live records arrive after the backlog; the fourth line ends the stream.
    for n in 0..3 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        logs.append(LogRecord::new(
            format!("machine-{n}"),
            Level::Warning,
            "juju.worker.provisioner",
            format!("instance {n} is slow to start"),
        ));
    }

    sup.wait().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
