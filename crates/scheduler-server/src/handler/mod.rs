//! All `axum::Router`s with their handlers.

mod status;
mod websocket;
mod workflows;

use axum::Router;
use axum::routing::{get, post};

use crate::service::ServiceState;

pub use workflows::SubmitWorkflowBody;

/// Assembles every route the adapter exposes.
#[must_use]
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .route(
            "/workflows",
            post(workflows::submit_workflow).get(workflows::list_workflows),
        )
        .route("/workflows/{id}", get(workflows::get_workflow))
        .route("/workflows/{id}/jobs", get(workflows::list_jobs))
        .route("/workflows/{id}/cancel", post(workflows::cancel_workflow))
        .route("/workflows/{id}/ws", get(websocket::upgrade))
        .route("/jobs/{id}/result", get(workflows::get_job_result))
        .route("/status", get(status::get_status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use scheduler_core::{RunnerRegistryBuilder, SchedulerCore, SchedulerLimits};
    use serde_json::json;

    use super::routes;
    use crate::service::ServiceState;

    fn test_server() -> TestServer {
        let limits = SchedulerLimits {
            max_workers: 2,
            max_active_users: 2,
            event_queue_capacity: 16,
        };
        let core = SchedulerCore::new(limits, RunnerRegistryBuilder::new().build());
        let state = ServiceState::new(core);
        TestServer::new(routes(state)).unwrap()
    }

    fn submission_body() -> serde_json::Value {
        json!({
            "name": "demo",
            "branches": {
                "a": [{"tag": "tile-infer", "payload": {}}],
            },
        })
    }

    #[tokio::test]
    async fn submission_requires_user_id_header() {
        let server = test_server();
        let response = server.post("/workflows").json(&submission_body()).await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submits_queries_and_cancels_a_workflow() {
        let server = test_server();

        let created = server
            .post("/workflows")
            .add_header("X-User-ID", "tenant-a")
            .json(&submission_body())
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let workflow: scheduler_core::Workflow = created.json();
        assert_eq!(workflow.status, scheduler_core::WorkflowStatus::Pending);
        assert_eq!(workflow.total_jobs, 1);

        let fetched = server.get(&format!("/workflows/{}", workflow.id)).await;
        fetched.assert_status_ok();

        let jobs = server
            .get(&format!("/workflows/{}/jobs", workflow.id))
            .await;
        jobs.assert_status_ok();
        let jobs: Vec<scheduler_core::Job> = jobs.json();
        assert_eq!(jobs.len(), 1);

        let result = server.get(&format!("/jobs/{}/result", jobs[0].id)).await;
        result.assert_status(axum::http::StatusCode::NOT_FOUND);

        let cancelled = server
            .post(&format!("/workflows/{}/cancel", workflow.id))
            .await;
        cancelled.assert_status(axum::http::StatusCode::ACCEPTED);

        let after = server.get(&format!("/workflows/{}", workflow.id)).await;
        let after: scheduler_core::Workflow = after.json();
        assert_eq!(after.status, scheduler_core::WorkflowStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let server = test_server();
        let response = server
            .get(&format!("/workflows/{}", uuid::Uuid::new_v4()))
            .await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_endpoint_reports_limits() {
        let server = test_server();
        let response = server.get("/status").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["max_workers"], 2);
        // The configured cap, not the live active+queued sum (which is 0
        // here since no workflow has been submitted yet).
        assert_eq!(body["max_active_users"], 2);
    }
}
