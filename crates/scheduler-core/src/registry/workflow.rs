//! Workflow records: branch layout, submission validation, and the derived
//! status/progress aggregate recomputed from job state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::ids::{BranchId, JobId, UserId, WorkflowId};
use crate::registry::job::{Job, JobRegistry, JobSpec, JobStatus};

const TRACING_TARGET: &str = "scheduler_core::registry::workflow";

/// A caller's submission: branches of ordered job specs, keyed by
/// caller-chosen branch id. Branches run in parallel; jobs within a branch
/// run strictly in list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSubmission {
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    pub branches: BTreeMap<BranchId, Vec<JobSpec>>,
}

/// The workflow's derived status. Never set directly — recomputed from its
/// jobs' statuses after every job transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// A submitted workflow: its branch layout plus the aggregate counters and
/// status derived from its jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub user_id: UserId,
    pub branches: BTreeMap<BranchId, Vec<JobId>>,
    pub status: WorkflowStatus,
    pub total_jobs: u32,
    pub pending_jobs: u32,
    pub running_jobs: u32,
    pub succeeded_jobs: u32,
    pub failed_jobs: u32,
    pub cancelled_jobs: u32,
    pub progress_percent: f64,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// Validates a submission's shape. A workflow with no branches, or a branch
/// with no jobs, or a job with an empty runner tag, is rejected as an
/// invalid DAG before any job record is created.
fn validate_submission(submission: &WorkflowSubmission) -> Result<()> {
    if submission.branches.is_empty() {
        return Err(Error::invalid_dag("workflow has no branches"));
    }
    for (branch_id, jobs) in &submission.branches {
        if jobs.is_empty() {
            return Err(Error::invalid_dag(format!(
                "branch '{branch_id}' has no jobs"
            )));
        }
        for job in jobs {
            if job.tag.trim().is_empty() {
                return Err(Error::invalid_dag(format!(
                    "branch '{branch_id}' has a job with an empty runner tag"
                )));
            }
        }
    }
    Ok(())
}

fn derive_status(total: u32, succeeded: u32, failed: u32, cancelled: u32, running: u32) -> WorkflowStatus {
    if total == 0 {
        return WorkflowStatus::Succeeded;
    }
    let terminal = succeeded + failed + cancelled;
    if terminal == total {
        if failed > 0 {
            WorkflowStatus::Failed
        } else if cancelled > 0 {
            WorkflowStatus::Cancelled
        } else {
            WorkflowStatus::Succeeded
        }
    } else if running > 0 || terminal > 0 {
        WorkflowStatus::Running
    } else {
        WorkflowStatus::Pending
    }
}

/// Owns every workflow record, keyed by id, and the job registry backing it.
#[derive(Clone)]
pub struct WorkflowRegistry {
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
    jobs: JobRegistry,
}

impl WorkflowRegistry {
    #[must_use]
    pub fn new(jobs: JobRegistry) -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
            jobs,
        }
    }

    /// Validates and admits a submission, creating the workflow record and
    /// one job record per job spec. Returns the workflow and the full list
    /// of jobs created for it, in branch/position order.
    pub async fn submit(&self, submission: WorkflowSubmission) -> Result<(Workflow, Vec<Job>)> {
        validate_submission(&submission)?;

        let id = WorkflowId::new();
        let mut branches = BTreeMap::new();
        let mut created = Vec::new();

        for (branch_id, specs) in submission.branches {
            let mut job_ids = Vec::with_capacity(specs.len());
            for (position, spec) in specs.into_iter().enumerate() {
                let job = self
                    .jobs
                    .create(id, branch_id.clone(), position, spec)
                    .await;
                job_ids.push(job.id);
                created.push(job);
            }
            branches.insert(branch_id, job_ids);
        }

        let total_jobs = created.len() as u32;
        let workflow = Workflow {
            id,
            name: submission.name,
            user_id: submission.user_id,
            branches,
            status: WorkflowStatus::Pending,
            total_jobs,
            pending_jobs: total_jobs,
            running_jobs: 0,
            succeeded_jobs: 0,
            failed_jobs: 0,
            cancelled_jobs: 0,
            progress_percent: 0.0,
            created_at: Timestamp::now(),
            finished_at: None,
        };

        self.workflows.write().await.insert(id, workflow.clone());
        tracing::info!(
            target: TRACING_TARGET,
            workflow_id = %id,
            branches = workflow.branches.len(),
            total_jobs,
            "workflow submitted"
        );

        Ok((workflow, created))
    }

    /// Fetches a snapshot of a workflow's current record.
    pub async fn get(&self, id: WorkflowId) -> Result<Workflow> {
        self.workflows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::unknown_workflow(id))
    }

    /// Lists every job belonging to a workflow.
    pub async fn list_jobs(&self, id: WorkflowId) -> Result<Vec<Job>> {
        self.get(id).await?;
        Ok(self.jobs.list_by_workflow(id).await)
    }

    /// Lists every workflow, optionally scoped to a single tenant, newest
    /// first. Backs the `GET /workflows` adapter endpoint.
    pub async fn list(&self, user_id: Option<&UserId>) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self
            .workflows
            .read()
            .await
            .values()
            .filter(|w| user_id.is_none_or(|uid| &w.user_id == uid))
            .cloned()
            .collect();
        workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        workflows
    }

    /// Lists every workflow not yet in a terminal state. Used by the
    /// dispatch loop's ready-job survey; not exposed outside the crate,
    /// since external callers address workflows by id.
    pub(crate) async fn all_nonterminal(&self) -> Vec<Workflow> {
        self.workflows
            .read()
            .await
            .values()
            .filter(|w| matches!(w.status, WorkflowStatus::Pending | WorkflowStatus::Running))
            .cloned()
            .collect()
    }

    /// Recomputes a workflow's derived status/progress from its current job
    /// records. Called after every job status or progress change.
    pub async fn recompute(&self, id: WorkflowId) -> Result<Workflow> {
        let jobs = self.jobs.list_by_workflow(id).await;

        let mut pending = 0u32;
        let mut running = 0u32;
        let mut succeeded = 0u32;
        let mut failed = 0u32;
        let mut cancelled = 0u32;
        let mut progress_sum = 0.0f64;

        for job in &jobs {
            progress_sum += f64::from(job.progress_percent);
            match job.status {
                JobStatus::Pending => pending += 1,
                JobStatus::Running => running += 1,
                JobStatus::Succeeded => succeeded += 1,
                JobStatus::Failed => failed += 1,
                JobStatus::Cancelled => cancelled += 1,
            }
        }

        let total = jobs.len() as u32;
        let status = derive_status(total, succeeded, failed, cancelled, running);
        let progress_percent = if total == 0 {
            100.0
        } else {
            progress_sum / f64::from(total)
        };

        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or_else(|| Error::unknown_workflow(id))?;

        let became_terminal = status != workflow.status
            && matches!(
                status,
                WorkflowStatus::Succeeded | WorkflowStatus::Failed | WorkflowStatus::Cancelled
            );

        workflow.status = status;
        workflow.pending_jobs = pending;
        workflow.running_jobs = running;
        workflow.succeeded_jobs = succeeded;
        workflow.failed_jobs = failed;
        workflow.cancelled_jobs = cancelled;
        workflow.progress_percent = progress_percent;
        if became_terminal {
            workflow.finished_at = Some(Timestamp::now());
        }

        tracing::debug!(
            target: TRACING_TARGET,
            workflow_id = %id,
            status = %status,
            progress_percent,
            "workflow recomputed"
        );

        Ok(workflow.clone())
    }
}
