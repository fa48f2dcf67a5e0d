//! Maps [`scheduler_core::ErrorKind`] onto HTTP status codes and a uniform
//! JSON error body.
//!
//! This is the boundary layer: everything upstream (the scheduler core)
//! speaks in domain errors, and everything downstream (the HTTP client)
//! speaks in status codes and JSON. No domain error variant is swallowed
//! silently — every [`scheduler_core::ErrorKind`] has exactly one arm below.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use scheduler_core::{Error as CoreError, ErrorKind};

/// The wire shape of an error response: a stable `code` for programmatic
/// handling and a human-readable `message`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

/// An HTTP-adapted error: a status code plus the body that goes with it.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ErrorResponse,
}

impl HttpError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code,
                message: message.into(),
            },
        }
    }

    /// A malformed request the adapter itself rejects, before it ever
    /// reaches the scheduler core (e.g. a path segment that isn't a UUID).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    #[must_use]
    pub fn missing_user_id() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "missing_user_id",
            "request is missing the X-User-ID header",
        )
    }

    #[must_use]
    pub fn result_not_ready() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "result_not_ready",
            "job has not succeeded yet; no result is available",
        )
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        let (status, code) = match err.kind() {
            ErrorKind::InvalidDag => (StatusCode::BAD_REQUEST, "invalid_dag"),
            ErrorKind::UnknownWorkflow => (StatusCode::NOT_FOUND, "unknown_workflow"),
            ErrorKind::UnknownJob => (StatusCode::NOT_FOUND, "unknown_job"),
            ErrorKind::InvalidTransition => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_transition"),
            ErrorKind::RunnerCrash => (StatusCode::INTERNAL_SERVER_ERROR, "runner_crash"),
            ErrorKind::SkippedDuePredecessor => (StatusCode::INTERNAL_SERVER_ERROR, "skipped_due_predecessor"),
            ErrorKind::CancelledByRequest => (StatusCode::INTERNAL_SERVER_ERROR, "cancelled_by_request"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self::new(status, code, err.message().to_owned())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
