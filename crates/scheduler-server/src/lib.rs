#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub const TRACING_TARGET_WORKFLOWS: &str = "scheduler_server::handler::workflows";
pub const TRACING_TARGET_WEBSOCKET: &str = "scheduler_server::handler::websocket";

pub mod error;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod service;

#[doc(hidden)]
pub mod prelude;

pub use error::{ErrorResponse, HttpError};
pub use extract::RequestUserId;
pub use service::ServiceState;
