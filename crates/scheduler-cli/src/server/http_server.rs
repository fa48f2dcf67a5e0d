//! Binds a TCP listener and serves the router until a shutdown signal.

use axum::Router;
use tokio::net::TcpListener;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;
use crate::server::{Result, ServerError, shutdown_signal};

/// Binds `server_config.socket_addr()` and serves `app` until a shutdown
/// signal arrives, then waits for in-flight requests to drain.
pub async fn serve_http(app: Router, server_config: ServerConfig) -> Result<()> {
    let server_addr = server_config.socket_addr();
    let shutdown_timeout = server_config.shutdown_timeout();

    let listener = TcpListener::bind(server_addr)
        .await
        .map_err(|source| ServerError::bind_error(&server_addr.to_string(), source))?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(ServerError::Runtime)
}

#[cfg(test)]
mod tests {}
