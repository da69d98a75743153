//! # Debug-log streaming.
//!
//! Tails stored log records and streams them, formatted, to a client sink.
//! The streaming loop is a [`Supervisor`](crate::Supervisor) over a
//! [`DebugLogHandler`]; the store is anything implementing
//! [`LogTailerSource`] ([`LogBuffer`] keeps records in memory).
//!
//! ```text
//! DebugLogParams ──tailer_params()──► LogTailerSource::open_tailer ──► ChannelWatcher<LogRecord>
//!                                                                         │
//!                          Supervisor ◄── DebugLogHandler ◄── react(rec) ─┘
//!                              │             └─► sink.write_all(format_record(rec))
//!                              └─ closed: debug_log_closed
//! ```

mod buffer;
mod handler;
mod params;
mod record;

pub use buffer::{DEFAULT_RETENTION, LogBuffer, LogTailerSource};
pub use handler::{DebugLogHandler, debug_log_closed, stream_debug_log};
pub use params::{DebugLogParams, LogTailerParams};
pub use record::{Level, LogRecord, ParseLevelError, format_record};
