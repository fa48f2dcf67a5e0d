//! Recovery middleware: request timeouts and panic-to-response conversion.

use std::any::Any;
use std::future::ready;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
#[cfg(feature = "config")]
use clap::Args;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::HttpError;

const TRACING_TARGET_PANIC: &str = "scheduler_server::recovery::panic";

type ResponseFut = BoxFuture<'static, Response>;
type Panic = Box<dyn Any + Send + 'static>;

/// Configuration for the recovery middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct RecoveryConfig {
    /// Maximum seconds a request may run before it is aborted with a 500.
    #[cfg_attr(feature = "config", arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30))]
    pub request_timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { request_timeout: 30 }
    }
}

impl RecoveryConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Extension trait for [`Router`] to apply recovery middleware.
pub trait RouterRecoveryExt<S> {
    /// Layers a request timeout and panic recovery around every handler.
    fn with_recovery(self, config: &RecoveryConfig) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, config: &RecoveryConfig) -> Self {
        let middlewares = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .layer(CatchPanicLayer::custom(catch_panic))
            .layer(TimeoutLayer::new(config.request_timeout()));

        self.layer(middlewares)
    }
}

fn handle_error(err: tower::BoxError) -> ResponseFut {
    use tower::timeout::error::Elapsed;

    let error = if err.downcast_ref::<Elapsed>().is_some() {
        tracing::error!(target: TRACING_TARGET_PANIC, error = %err, "request timed out");
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "request_timeout", "the request took too long to process")
    } else {
        tracing::error!(target: TRACING_TARGET_PANIC, error = %err, "unhandled middleware error");
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
    };

    ready(error.into_response()).boxed()
}

fn catch_panic(err: Panic) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic type");

    tracing::error!(target: TRACING_TARGET_PANIC, message, "handler panicked");

    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "an unexpected panic occurred").into_response()
}
