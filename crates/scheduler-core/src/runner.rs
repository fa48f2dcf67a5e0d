//! The pluggable interface implemented by each registered job kind.
//!
//! A runner is looked up by tag from the registry the scheduler holds and
//! invoked with a read-only view of the job, a sink for progress updates,
//! and a cooperative cancellation token. It has no access to the registries
//! or the event bus directly — every side effect it wants observed goes
//! through [`ProgressSink`], keeping the scheduling core the sole writer of
//! job state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ids::{BranchId, JobId, WorkflowId};
use crate::registry::job::ResultHandle;

/// Read-only snapshot of a job, handed to its runner at start.
#[derive(Debug, Clone)]
pub struct JobView {
    pub job_id: JobId,
    pub workflow_id: WorkflowId,
    pub branch_id: BranchId,
    pub position: usize,
    pub payload: serde_json::Value,
}

/// How a runner reports progress back to the scheduling core while it runs.
///
/// Cloneable and cheap: every clone reports against the same job.
#[derive(Clone)]
pub struct ProgressSink {
    job_id: JobId,
    report: Arc<dyn Fn(ProgressReport) + Send + Sync>,
}

/// A single progress update emitted through a [`ProgressSink`].
#[derive(Debug, Clone, Copy)]
pub struct ProgressReport {
    pub progress_percent: u8,
    pub tiles_processed: u64,
    pub tiles_total: u64,
}

impl ProgressSink {
    /// Constructs a sink that forwards every report to `report`.
    #[must_use]
    pub fn new(job_id: JobId, report: impl Fn(ProgressReport) + Send + Sync + 'static) -> Self {
        Self {
            job_id,
            report: Arc::new(report),
        }
    }

    /// The job this sink reports progress for.
    #[must_use]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Reports a progress update. Best-effort: a runner that never calls
    /// this simply leaves the job's progress at its last known value.
    pub fn report(&self, progress_percent: u8, tiles_processed: u64, tiles_total: u64) {
        (self.report)(ProgressReport {
            progress_percent: progress_percent.min(100),
            tiles_processed,
            tiles_total,
        });
    }
}

/// How a job run concluded.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The job produced a result. The handle is opaque to the core.
    Succeeded(ResultHandle),
    /// The job failed; `kind` is a runner-defined failure tag, `message` the
    /// recorded failure reason. The core substitutes `RUNNER_CRASH` itself
    /// when a runner panics rather than returning this variant.
    Failed { kind: String, message: String },
    /// The runner observed its cancel token and stopped promptly. Any
    /// partial result it may have produced is discarded by the core.
    Cancelled,
}

/// Implemented once per runner tag and registered with the scheduler under
/// that tag. `async-trait` is used rather than a native `async fn` so the
/// trait stays object-safe — the scheduler dispatches through `Arc<dyn
/// JobRunner>` looked up at runtime by tag, not through static generics.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Executes one job to completion or cancellation.
    ///
    /// Implementations should poll `cancel_token` (or race it with their
    /// own work via `tokio::select!`) and return promptly once it fires;
    /// the scheduler will not forcibly abort the task, it relies on
    /// cooperative cancellation.
    async fn run(
        &self,
        job: JobView,
        progress: ProgressSink,
        cancel_token: CancellationToken,
    ) -> Outcome;
}

/// Maps runner tags to the runner instance that handles them.
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: Arc<HashMap<String, Arc<dyn JobRunner>>>,
}

impl RunnerRegistry {
    /// Builds a registry from a fixed tag-to-runner mapping.
    #[must_use]
    pub fn new(runners: HashMap<String, Arc<dyn JobRunner>>) -> Self {
        Self {
            runners: Arc::new(runners),
        }
    }

    /// Looks up the runner for a tag, if one is registered.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Arc<dyn JobRunner>> {
        self.runners.get(tag).cloned()
    }
}

/// A builder for [`RunnerRegistry`], mirroring how the scheduler is wired
/// together at startup: one `register` call per supported runner tag.
#[derive(Default)]
pub struct RunnerRegistryBuilder {
    runners: HashMap<String, Arc<dyn JobRunner>>,
}

impl RunnerRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, tag: impl Into<String>, runner: Arc<dyn JobRunner>) -> Self {
        self.runners.insert(tag.into(), runner);
        self
    }

    #[must_use]
    pub fn build(self) -> RunnerRegistry {
        RunnerRegistry::new(self.runners)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A runner that always succeeds after reporting a couple of progress
    /// updates, counting how many times it was invoked.
    pub struct MockRunner {
        pub invocations: Arc<AtomicUsize>,
        pub tiles_total: u64,
    }

    impl MockRunner {
        pub fn new(tiles_total: u64) -> (Arc<Self>, Arc<AtomicUsize>) {
            let invocations = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    invocations: invocations.clone(),
                    tiles_total,
                }),
                invocations,
            )
        }
    }

    #[async_trait]
    impl JobRunner for MockRunner {
        async fn run(
            &self,
            _job: JobView,
            progress: ProgressSink,
            cancel_token: CancellationToken,
        ) -> Outcome {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            for tile in 1..=self.tiles_total {
                if cancel_token.is_cancelled() {
                    return Outcome::Cancelled;
                }
                let percent = ((tile * 100) / self.tiles_total.max(1)) as u8;
                progress.report(percent, tile, self.tiles_total);
            }
            Outcome::Succeeded(ResultHandle(serde_json::json!({"tiles": self.tiles_total})))
        }
    }

    /// A runner that fails unconditionally.
    pub struct FailingRunner;

    #[async_trait]
    impl JobRunner for FailingRunner {
        async fn run(
            &self,
            _job: JobView,
            _progress: ProgressSink,
            _cancel_token: CancellationToken,
        ) -> Outcome {
            Outcome::Failed {
                kind: "synthetic_failure".to_owned(),
                message: "synthetic failure".to_owned(),
            }
        }
    }

    /// A runner that waits for cancellation and never completes on its own.
    pub struct HangingRunner;

    #[async_trait]
    impl JobRunner for HangingRunner {
        async fn run(
            &self,
            _job: JobView,
            _progress: ProgressSink,
            cancel_token: CancellationToken,
        ) -> Outcome {
            cancel_token.cancelled().await;
            Outcome::Cancelled
        }
    }

    /// A runner that panics immediately, exercising the core's
    /// crash-to-`RUNNER_CRASH` translation.
    pub struct PanickingRunner;

    #[async_trait]
    impl JobRunner for PanickingRunner {
        async fn run(
            &self,
            _job: JobView,
            _progress: ProgressSink,
            _cancel_token: CancellationToken,
        ) -> Outcome {
            panic!("runner exploded");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::test_support::MockRunner;
    use super::*;

    #[tokio::test]
    async fn mock_runner_reports_progress_and_succeeds() {
        let (runner, invocations) = MockRunner::new(4);
        let job = JobView {
            job_id: JobId::new(),
            workflow_id: WorkflowId::new(),
            branch_id: BranchId::new("a"),
            position: 0,
            payload: serde_json::json!({}),
        };
        let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
        let reports_clone = reports.clone();
        let sink = ProgressSink::new(job.job_id, move |report| {
            reports_clone.lock().unwrap().push(report);
        });

        let outcome = runner.run(job, sink, CancellationToken::new()).await;

        assert!(matches!(outcome, Outcome::Succeeded(_)));
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(reports.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn registry_resolves_by_tag() {
        let (runner, _) = MockRunner::new(1);
        let registry = RunnerRegistryBuilder::new()
            .register("tile-infer", runner)
            .build();

        assert!(registry.get("tile-infer").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
