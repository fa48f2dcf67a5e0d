//! Runner wiring: maps job tags to the [`scheduler_core::JobRunner`]
//! implementations the process actually executes.
//!
//! The scheduling core is runner-agnostic; it never looks inside a job's
//! payload. This binary registers one concrete runner — a tile-by-tile
//! simulator standing in for a real segmentation/inference backend — under
//! every tag this deployment accepts. Swapping in a real backend means
//! implementing [`scheduler_core::JobRunner`] and registering it here;
//! nothing in `scheduler-core` or `scheduler-server` changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scheduler_core::registry::job::ResultHandle;
use scheduler_core::{JobRunner, JobView, Outcome, ProgressSink, RunnerRegistry, RunnerRegistryBuilder};
use tokio_util::sync::CancellationToken;

const TRACING_TARGET: &str = "scheduler_cli::runners";

/// Runner tags this deployment accepts. A workflow submission naming any
/// other tag is rejected by `JobRunner` lookup failure at dispatch time.
pub const TILE_RUNNER_TAGS: &[&str] = &["tile-infer", "tissue-mask", "segmentation"];

/// Splits a payload's `tile_count` (default 4) into that many simulated
/// tile-processing steps, reporting progress between each and honoring
/// cancellation between steps.
struct TileSimulatorRunner;

#[async_trait]
impl JobRunner for TileSimulatorRunner {
    async fn run(&self, job: JobView, progress: ProgressSink, cancel_token: CancellationToken) -> Outcome {
        let tiles_total = job
            .payload
            .get("tile_count")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(4)
            .max(1);

        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %job.job_id,
            workflow_id = %job.workflow_id,
            branch_id = %job.branch_id,
            tiles_total,
            "tile run starting"
        );

        for tile in 1..=tiles_total {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    tracing::debug!(target: TRACING_TARGET, job_id = %job.job_id, "cancelled mid-tile");
                    return Outcome::Cancelled;
                }
                () = tokio::time::sleep(Duration::from_millis(50)) => {}
            }

            let progress_percent = ((tile * 100) / tiles_total) as u8;
            progress.report(progress_percent, tile, tiles_total);
        }

        Outcome::Succeeded(ResultHandle(serde_json::json!({
            "tiles_processed": tiles_total,
            "branch": job.branch_id.as_str(),
            "position": job.position,
        })))
    }
}

/// Builds the runner registry this binary serves requests with.
#[must_use]
pub fn build_registry() -> RunnerRegistry {
    let runner: Arc<dyn JobRunner> = Arc::new(TileSimulatorRunner);
    let mut builder = RunnerRegistryBuilder::new();
    for tag in TILE_RUNNER_TAGS {
        builder = builder.register(*tag, runner.clone());
    }
    builder.build()
}
