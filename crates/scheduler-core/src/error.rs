//! Core error types and utilities.
//!
//! This module provides the error type shared by every scheduling component:
//!
//! - A strongly-typed [`ErrorKind`] for categorizing failures
//! - Builder-style constructors on [`Error`] for ergonomic construction
//! - Integration with `thiserror` for automatic `Display`/`Error` impls

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Type alias for boxed errors that are `Send + Sync`.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for scheduling-core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing scheduler errors.
///
/// Kept separate from [`Error`] so callers can match on the kind without
/// touching the message or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A workflow submission failed DAG validation.
    InvalidDag,
    /// A query referenced a workflow id that does not exist.
    UnknownWorkflow,
    /// A query referenced a job id that does not exist.
    UnknownJob,
    /// A status transition was attempted that the state machine forbids.
    InvalidTransition,
    /// A job runner returned abnormally (panicked or the task was aborted).
    RunnerCrash,
    /// A job was cancelled because a predecessor in its branch failed.
    SkippedDuePredecessor,
    /// A job or workflow was cancelled by an explicit user request.
    CancelledByRequest,
    /// Reserved for future tenant-quota extensions; not emitted today.
    TenantRejected,
    /// Catch-all for invariant violations that should never surface to a user.
    Internal,
}

impl ErrorKind {
    /// Returns the error kind as a stable string, for logging and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDag => "invalid_dag",
            Self::UnknownWorkflow => "unknown_workflow",
            Self::UnknownJob => "unknown_job",
            Self::InvalidTransition => "invalid_transition",
            Self::RunnerCrash => "runner_crash",
            Self::SkippedDuePredecessor => "skipped_due_to_predecessor",
            Self::CancelledByRequest => "cancelled_by_request",
            Self::TenantRejected => "tenant_rejected",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error, enabling error chain tracking.
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates an [`ErrorKind::InvalidDag`] error.
    #[inline]
    pub fn invalid_dag(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidDag, message)
    }

    /// Creates an [`ErrorKind::UnknownWorkflow`] error.
    #[inline]
    pub fn unknown_workflow(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownWorkflow, format!("unknown workflow: {id}"))
    }

    /// Creates an [`ErrorKind::UnknownJob`] error.
    #[inline]
    pub fn unknown_job(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownJob, format!("unknown job: {id}"))
    }

    /// Creates an [`ErrorKind::InvalidTransition`] error.
    #[inline]
    pub fn invalid_transition(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidTransition, message)
    }

    /// Creates an [`ErrorKind::RunnerCrash`] error.
    #[inline]
    pub fn runner_crash(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::RunnerCrash, message)
    }

    /// Creates an [`ErrorKind::SkippedDuePredecessor`] error.
    #[inline]
    pub fn skipped_due_predecessor() -> Self {
        Self::new(
            ErrorKind::SkippedDuePredecessor,
            "skipped: a predecessor in this branch failed",
        )
    }

    /// Creates an [`ErrorKind::CancelledByRequest`] error.
    #[inline]
    pub fn cancelled_by_request() -> Self {
        Self::new(ErrorKind::CancelledByRequest, "cancelled by request")
    }

    /// Creates an [`ErrorKind::Internal`] error.
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_display() {
        let err = Error::invalid_dag("branch 'a' is empty");
        assert_eq!(err.kind(), ErrorKind::InvalidDag);
        assert_eq!(err.message(), "branch 'a' is empty");
        assert_eq!(err.kind().as_str(), "invalid_dag");
    }

    #[test]
    fn with_source_chains_error() {
        let io_err = std::io::Error::other("boom");
        let err = Error::internal("wrapped").with_source(io_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
