//! In-memory registries for jobs and workflows.
//!
//! A registry is the sole owner of the records it names: every other
//! component (the tenant manager, the dispatch coordinator, the event bus
//! publishers) holds ids and looks records up through these types rather
//! than sharing mutable references. Both registries are cheap to clone —
//! cloning shares the same underlying table — so each can be handed to
//! worker tasks freely.

pub mod job;
pub mod workflow;

pub use job::{Job, JobRegistry, JobSpec, JobStatus};
pub use workflow::{Workflow, WorkflowRegistry, WorkflowStatus, WorkflowSubmission};
