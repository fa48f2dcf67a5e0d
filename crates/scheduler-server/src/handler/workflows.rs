//! Workflow submission, inspection, and cancellation.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use scheduler_core::registry::JobSpec;
use scheduler_core::{BranchId, Job, JobId, ResultHandle, SchedulerCore, Workflow, WorkflowId, WorkflowSubmission};

use crate::error::HttpError;
use crate::extract::RequestUserId;

/// The body of `POST /workflows`. The tenant is never taken from the body —
/// it comes from the `X-User-ID` header via [`RequestUserId`].
#[derive(Debug, Deserialize)]
pub struct SubmitWorkflowBody {
    #[serde(default)]
    pub name: String,
    pub branches: BTreeMap<BranchId, Vec<JobSpec>>,
}

#[tracing::instrument(skip_all, fields(user_id = %user_id.0))]
pub async fn submit_workflow(
    State(core): State<SchedulerCore>,
    RequestUserId(user_id): RequestUserId,
    Json(body): Json<SubmitWorkflowBody>,
) -> Result<(StatusCode, Json<Workflow>), HttpError> {
    let submission = WorkflowSubmission {
        user_id,
        name: body.name,
        branches: body.branches,
    };
    let workflow = core.submit_workflow(submission).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn get_workflow(
    State(core): State<SchedulerCore>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workflow>, HttpError> {
    let workflow = core.get_workflow(WorkflowId::from(id)).await?;
    Ok(Json(workflow))
}

/// Lists the calling tenant's workflows, newest first. There is no
/// cross-tenant view: the `X-User-ID` header scopes every listing to its
/// own caller.
#[tracing::instrument(skip_all, fields(user_id = %user_id.0))]
pub async fn list_workflows(
    State(core): State<SchedulerCore>,
    RequestUserId(user_id): RequestUserId,
) -> Json<Vec<Workflow>> {
    Json(core.list_workflows(Some(&user_id)).await)
}

#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn list_jobs(
    State(core): State<SchedulerCore>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Job>>, HttpError> {
    let jobs = core.list_jobs(WorkflowId::from(id)).await?;
    Ok(Json(jobs))
}

#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn cancel_workflow(
    State(core): State<SchedulerCore>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    core.cancel_workflow(WorkflowId::from(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

#[tracing::instrument(skip_all, fields(job_id = %id))]
pub async fn get_job_result(
    State(core): State<SchedulerCore>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultHandle>, HttpError> {
    let job = core.get_job(JobId::from(id)).await?;
    job.result.map(Json).ok_or_else(HttpError::result_not_ready)
}
