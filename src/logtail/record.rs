use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    #[default]
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level name is not recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// One stored log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Emitting entity, e.g. `machine-0` or `unit-mysql-1`.
    pub entity: String,
    pub time: DateTime<Utc>,
    pub level: Level,
    /// Dotted logger name, e.g. `juju.worker.uniter`.
    pub module: String,
    /// Source location, e.g. `uniter.go:42`.
    pub location: String,
    pub message: String,
}

impl LogRecord {
    /// Creates a record stamped with the current time and no location.
    pub fn new(
        entity: impl Into<String>,
        level: Level,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            time: Utc::now(),
            level,
            module: module.into(),
            location: String::new(),
            message: message.into(),
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Renders `r` as one debug-log line (newline terminated, time in UTC).
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use watchvisor::logtail::{Level, LogRecord, format_record};
///
/// let rec = LogRecord::new("machine-0", Level::Info, "juju.worker", "started")
///     .with_time(Utc.with_ymd_and_hms(2015, 6, 1, 12, 30, 5).unwrap())
///     .with_location("worker.go:10");
/// assert_eq!(
///     format_record(&rec),
///     "machine-0: 2015-06-01 12:30:05 INFO juju.worker worker.go:10 started\n"
/// );
/// ```
pub fn format_record(r: &LogRecord) -> String {
    format!(
        "{}: {} {} {} {} {}\n",
        r.entity,
        r.time.format("%Y-%m-%d %H:%M:%S"),
        r.level,
        r.module,
        r.location,
        r.message,
    )
}
