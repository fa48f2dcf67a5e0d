//! Convenience re-exports for `scheduler_server` consumers.
//!
//! ```rust
//! use scheduler_server::prelude::*;
//! ```

pub use crate::error::{ErrorResponse, HttpError};
pub use crate::extract::RequestUserId;
pub use crate::handler::routes;
pub use crate::middleware::{RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt};
pub use crate::service::ServiceState;
