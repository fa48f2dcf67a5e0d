//! Middleware for the adapter's `axum::Router`.
//!
//! Layering order, outermost first: recovery (panics, timeouts), then
//! observability (request ids, tracing spans). There is no authentication
//! layer here — identity is carried per-request by [`crate::extract::RequestUserId`],
//! not established once for a whole router.

mod observability;
mod recovery;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
