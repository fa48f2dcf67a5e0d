#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod error;
pub mod event_bus;
pub mod ids;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod tenant;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxedError, Error, ErrorKind, Result};
pub use event_bus::{Envelope, Event, EventBus, Subscription};
pub use ids::{BranchId, JobId, UserId, WorkflowId};
pub use registry::job::{Job, JobFailure, JobRegistry, JobStatus, ResultHandle};
pub use registry::workflow::{Workflow, WorkflowRegistry, WorkflowStatus, WorkflowSubmission};
pub use runner::{JobRunner, JobView, Outcome, ProgressSink, RunnerRegistry, RunnerRegistryBuilder};
pub use scheduler::{SchedulerCore, SchedulerLimits};
pub use tenant::{TenantManager, TenantState};
