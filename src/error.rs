//! Error types used by supervised workers and their watchers.
//!
//! [`WorkerError`] is the single error type that flows through a supervisor:
//! handlers return it from `acquire`/`react`/`release`, watchers report it
//! inside [`Termination::Failed`](crate::Termination::Failed), and
//! [`Supervisor::wait`](crate::Supervisor::wait) hands the recorded one back.
//!
//! It is `Clone` because every `wait()` caller receives the same value.

use thiserror::Error;

/// # Errors recorded as a worker's death reason.
///
/// - [`WorkerError::Fail`] ordinary task failure, displayed verbatim;
/// - [`WorkerError::Annotated`] a failure wrapped with context;
/// - [`WorkerError::Fatal`] watcher/supervisor contract violation caught at the recovery boundary;
/// - [`WorkerError::Panicked`] a handler or watcher panicked.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Task failed; the message is reported as-is.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Failure annotated with the operation that observed it.
    #[error("{context}: {source}")]
    Annotated {
        /// What was being done when the failure surfaced.
        context: String,
        /// The original failure.
        source: Box<WorkerError>,
    },

    /// Implementation fault: a watcher closed while reporting no definitive error.
    #[error("implementation fault: {error}")]
    Fatal {
        /// The fault message raised by the classifier.
        error: String,
    },

    /// A handler or watcher call panicked.
    #[error("worker panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl WorkerError {
    /// Creates a [`WorkerError::Fail`] from anything displayable.
    ///
    /// # Example
    /// ```
    /// use watchvisor::WorkerError;
    ///
    /// let err = WorkerError::fail("boom");
    /// assert_eq!(err.to_string(), "boom");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        WorkerError::Fail {
            error: error.to_string(),
        }
    }

    /// Wraps `self` with context, rendered as `"context: self"`.
    ///
    /// # Example
    /// ```
    /// use watchvisor::WorkerError;
    ///
    /// let err = WorkerError::fail("connection reset").annotate("tailer stopped");
    /// assert_eq!(err.to_string(), "tailer stopped: connection reset");
    /// ```
    pub fn annotate(self, context: impl Into<String>) -> Self {
        WorkerError::Annotated {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping annotations.
    pub fn root(&self) -> &WorkerError {
        match self {
            WorkerError::Annotated { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// Annotations are transparent: the label of the root error is returned.
    pub fn as_label(&self) -> &'static str {
        match self.root() {
            WorkerError::Fail { .. } => "worker_failed",
            WorkerError::Fatal { .. } => "worker_fatal",
            WorkerError::Panicked { .. } => "worker_panicked",
            WorkerError::Annotated { .. } => "worker_failed",
        }
    }

    /// Indicates an implementation fault (classifier verdict or panic)
    /// rather than an ordinary task failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            WorkerError::Fatal { .. } | WorkerError::Panicked { .. }
        )
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::fail(err)
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
