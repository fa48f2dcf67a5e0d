//! Job records and the transitions their state machine allows.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::ids::{BranchId, JobId, WorkflowId};

const TRACING_TARGET: &str = "scheduler_core::registry::job";

/// A caller-submitted job: a runner tag plus an opaque payload the runner
/// alone interprets. The core never looks inside `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Selects which registered [`crate::runner::JobRunner`] executes this job.
    pub tag: String,
    /// Runner-defined input, carried opaque end to end.
    pub payload: serde_json::Value,
}

/// The five states a job moves through. Transitions are one-directional:
/// `PENDING -> RUNNING -> {SUCCEEDED, FAILED, CANCELLED}`, with `PENDING ->
/// CANCELLED` possible directly for a job that never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status is one a job can never leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    fn validate_transition(self, next: Self) -> Result<()> {
        let allowed = matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        );
        if allowed {
            Ok(())
        } else {
            Err(Error::invalid_transition(format!(
                "job cannot move from {self} to {next}"
            )))
        }
    }
}

/// An opaque handle to a runner's output. The core never inspects it; it is
/// returned verbatim to API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultHandle(pub serde_json::Value);

/// Why a job ended in [`JobStatus::Failed`] or [`JobStatus::Cancelled`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
}

impl JobFailure {
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        Self {
            kind: err.kind().as_str().to_owned(),
            message: err.message().to_owned(),
        }
    }
}

/// A single job record: position within a branch, current status, progress,
/// and — once terminal — its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub workflow_id: WorkflowId,
    pub branch_id: BranchId,
    pub position: usize,
    pub tag: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub tiles_processed: u64,
    pub tiles_total: u64,
    pub result: Option<ResultHandle>,
    pub failure: Option<JobFailure>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    fn new(
        workflow_id: WorkflowId,
        branch_id: BranchId,
        position: usize,
        spec: JobSpec,
    ) -> Self {
        Self {
            id: JobId::new(),
            workflow_id,
            branch_id,
            position,
            tag: spec.tag,
            payload: spec.payload,
            status: JobStatus::Pending,
            progress_percent: 0,
            tiles_processed: 0,
            tiles_total: 0,
            result: None,
            failure: None,
            created_at: Timestamp::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Owns every job record ever created, keyed by id.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub(crate) async fn create(
        &self,
        workflow_id: WorkflowId,
        branch_id: BranchId,
        position: usize,
        spec: JobSpec,
    ) -> Job {
        let job = Job::new(workflow_id, branch_id, position, spec);
        self.jobs.write().await.insert(job.id, job.clone());
        job
    }

    /// Fetches a snapshot of a job's current record.
    pub async fn get(&self, id: JobId) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::unknown_job(id))
    }

    /// Lists every job belonging to a workflow, in branch/position order.
    pub async fn list_by_workflow(&self, workflow_id: WorkflowId) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.workflow_id == workflow_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            a.branch_id
                .cmp(&b.branch_id)
                .then(a.position.cmp(&b.position))
        });
        jobs
    }

    async fn transition<F>(&self, id: JobId, next: JobStatus, mutate: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| Error::unknown_job(id))?;
        job.status.validate_transition(next)?;
        job.status = next;
        mutate(job);
        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %id,
            status = %next,
            "job transitioned"
        );
        Ok(job.clone())
    }

    /// Moves a pending job to `RUNNING`.
    pub async fn mark_running(&self, id: JobId) -> Result<Job> {
        self.transition(id, JobStatus::Running, |job| {
            job.started_at = Some(Timestamp::now());
        })
        .await
    }

    /// Records a progress update for a running job. Not a status transition.
    ///
    /// Clamps to `[0, 100]` and enforces monotonic non-decrease: a report
    /// below the job's last known percent is absorbed rather than applied,
    /// since the core — not the runner — is the source of truth for a
    /// running job's progress.
    pub async fn update_progress(
        &self,
        id: JobId,
        progress_percent: u8,
        tiles_processed: u64,
        tiles_total: u64,
    ) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| Error::unknown_job(id))?;
        job.progress_percent = progress_percent.min(100).max(job.progress_percent);
        job.tiles_processed = tiles_processed;
        job.tiles_total = tiles_total;
        Ok(job.clone())
    }

    /// Moves a running job to `SUCCEEDED`.
    pub async fn mark_succeeded(&self, id: JobId, result: ResultHandle) -> Result<Job> {
        self.transition(id, JobStatus::Succeeded, |job| {
            job.result = Some(result);
            job.progress_percent = 100;
            job.finished_at = Some(Timestamp::now());
        })
        .await
    }

    /// Moves a running job to `FAILED`.
    pub async fn mark_failed(&self, id: JobId, failure: JobFailure) -> Result<Job> {
        self.transition(id, JobStatus::Failed, |job| {
            job.failure = Some(failure);
            job.finished_at = Some(Timestamp::now());
        })
        .await
    }

    /// Moves a pending or running job to `CANCELLED`, either by explicit
    /// request or because a predecessor in its branch failed.
    pub async fn mark_cancelled(&self, id: JobId, failure: JobFailure) -> Result<Job> {
        self.transition(id, JobStatus::Cancelled, |job| {
            job.failure = Some(failure);
            job.finished_at = Some(Timestamp::now());
        })
        .await
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec {
            tag: "tile-infer".to_owned(),
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn lifecycle_happy_path() {
        let registry = JobRegistry::new();
        let job = registry
            .create(WorkflowId::new(), BranchId::new("a"), 0, spec())
            .await;

        assert_eq!(job.status, JobStatus::Pending);

        registry.mark_running(job.id).await.unwrap();
        registry
            .update_progress(job.id, 50, 5, 10)
            .await
            .unwrap();
        let done = registry
            .mark_succeeded(job.id, ResultHandle(serde_json::json!({"ok": true})))
            .await
            .unwrap();

        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.progress_percent, 100);
        assert!(done.result.is_some());
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let registry = JobRegistry::new();
        let job = registry
            .create(WorkflowId::new(), BranchId::new("a"), 0, spec())
            .await;

        let err = registry
            .mark_succeeded(job.id, ResultHandle(serde_json::json!(null)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn progress_never_regresses() {
        let registry = JobRegistry::new();
        let job = registry
            .create(WorkflowId::new(), BranchId::new("a"), 0, spec())
            .await;
        registry.mark_running(job.id).await.unwrap();

        registry.update_progress(job.id, 60, 6, 10).await.unwrap();
        let after_regression = registry.update_progress(job.id, 30, 3, 10).await.unwrap();
        assert_eq!(after_regression.progress_percent, 60);

        let after_overflow = registry.update_progress(job.id, 255, 10, 10).await.unwrap();
        assert_eq!(after_overflow.progress_percent, 100);
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let registry = JobRegistry::new();
        let err = registry.get(JobId::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownJob);
    }
}
