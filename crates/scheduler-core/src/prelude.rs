//! Commonly used items from scheduler-core.
//!
//! This prelude module exports the most commonly used types to simplify
//! imports in the server and CLI crates that build on top of this one.

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::event_bus::{Envelope, Event, EventBus};
pub use crate::ids::{BranchId, JobId, UserId, WorkflowId};
pub use crate::registry::job::{Job, JobRegistry, JobStatus};
pub use crate::registry::workflow::{Workflow, WorkflowRegistry, WorkflowStatus, WorkflowSubmission};
pub use crate::runner::{JobRunner, Outcome, RunnerRegistry};
pub use crate::scheduler::{SchedulerCore, SchedulerLimits};
pub use crate::tenant::TenantManager;
