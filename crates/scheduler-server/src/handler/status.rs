//! Global admission/concurrency snapshot.

use axum::Json;
use axum::extract::State;
use scheduler_core::{Event, SchedulerCore};

#[tracing::instrument(skip_all)]
pub async fn get_status(State(core): State<SchedulerCore>) -> Json<Event> {
    Json(core.status_snapshot())
}
