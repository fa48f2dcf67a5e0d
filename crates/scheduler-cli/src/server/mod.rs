//! HTTP server startup and shutdown.

mod error;
mod http_server;
mod shutdown;

use axum::Router;
pub use error::{ServerError, ServerResult as Result};
pub use http_server::serve_http;
pub(crate) use shutdown::shutdown_signal;

use crate::config::ServerConfig;

pub(crate) const TRACING_TARGET_SHUTDOWN: &str = "scheduler_cli::server::shutdown";

/// Binds and serves `app`, running until a shutdown signal arrives and
/// every in-flight request has drained.
///
/// # Errors
///
/// Returns an error if the configured address cannot be bound, or if the
/// server encounters a fatal runtime error.
pub async fn serve(app: Router, config: ServerConfig) -> Result<()> {
    serve_http(app, config).await
}
