//! The dispatch coordinator: the two-level admission policy in motion.
//!
//! A single background task surveys ready jobs and assigns them to worker
//! tasks as global semaphore permits and per-tenant admission allow. Worker
//! tasks run a job to completion (or cancellation) and report back over an
//! internal channel the coordinator drains before each re-survey, so all
//! registry and tenant-manager mutation happens from one place rather than
//! from the worker tasks themselves.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, Notify, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};
use crate::event_bus::{Event, EventBus};
use crate::ids::{JobId, UserId, WorkflowId};
use crate::registry::job::{Job, JobFailure, JobRegistry, JobStatus};
use crate::registry::workflow::{Workflow, WorkflowRegistry, WorkflowStatus, WorkflowSubmission};
use crate::runner::{JobView, Outcome, ProgressSink, RunnerRegistry};
use crate::tenant::TenantManager;

const TRACING_TARGET: &str = "scheduler_core::scheduler";

/// The two resource caps the scheduler enforces, plus the event bus's
/// per-topic buffer size.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerLimits {
    /// Global ceiling on simultaneously running jobs, across every tenant.
    pub max_workers: usize,
    /// Ceiling on tenants with at least one job eligible to run at once.
    pub max_active_users: usize,
    /// Per-topic event bus channel capacity.
    pub event_queue_capacity: usize,
}

struct Completion {
    job_id: JobId,
    workflow_id: WorkflowId,
    user_id: UserId,
    outcome: Outcome,
}

/// The scheduling core: registries, tenant admission, and the dispatch
/// loop, wired together. This is the type the HTTP adapter wraps in its
/// shared application state.
#[derive(Clone)]
pub struct SchedulerCore {
    jobs: JobRegistry,
    workflows: WorkflowRegistry,
    tenants: TenantManager,
    runners: RunnerRegistry,
    events: EventBus,
    max_workers: usize,
    semaphore: Arc<Semaphore>,
    dispatch_notify: Arc<Notify>,
    shutdown: CancellationToken,
    workflow_tokens: Arc<tokio::sync::RwLock<HashMap<WorkflowId, CancellationToken>>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Completion>>>>,
}

impl SchedulerCore {
    /// Builds a new scheduler. No background task is started until
    /// [`SchedulerCore::run_dispatch_loop`] is awaited (typically spawned
    /// once by the binary wiring the scheduler up).
    #[must_use]
    pub fn new(limits: SchedulerLimits, runners: RunnerRegistry) -> Self {
        let jobs = JobRegistry::new();
        let workflows = WorkflowRegistry::new(jobs.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            jobs,
            workflows,
            tenants: TenantManager::new(limits.max_active_users),
            runners,
            events: EventBus::new(limits.event_queue_capacity),
            max_workers: limits.max_workers.max(1),
            semaphore: Arc::new(Semaphore::new(limits.max_workers.max(1))),
            dispatch_notify: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            workflow_tokens: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            completions_tx: tx,
            completions_rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// The event bus backing this scheduler, for subscribing to topics.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// A snapshot of current admission/concurrency counters, for the
    /// `system` status topic and health endpoints.
    #[must_use]
    pub fn status_snapshot(&self) -> Event {
        let (active_users, queued_users) = self.tenants.counts();
        let running_jobs = self.max_workers - self.semaphore.available_permits();
        Event::SystemStatus {
            running_jobs,
            max_workers: self.max_workers,
            active_users,
            max_active_users: self.tenants.max_active_users(),
            queued_users,
        }
    }

    /// Validates and admits a workflow submission, registering its tenant
    /// against the `max_active_users` cap and waking the dispatch loop.
    pub async fn submit_workflow(&self, submission: WorkflowSubmission) -> Result<Workflow> {
        let user_id = submission.user_id.clone();
        let (workflow, jobs) = self.workflows.submit(submission).await?;

        self.workflow_tokens
            .write()
            .await
            .insert(workflow.id, self.shutdown.child_token());

        self.tenants.on_workflow_submitted(&user_id, jobs.len());

        self.publish_workflow_progress(&workflow);
        self.dispatch_notify.notify_one();
        Ok(workflow)
    }

    /// Fetches a workflow's current record.
    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow> {
        self.workflows.get(id).await
    }

    /// Lists every job belonging to a workflow.
    pub async fn list_jobs(&self, id: WorkflowId) -> Result<Vec<Job>> {
        self.workflows.list_jobs(id).await
    }

    /// Lists every known workflow, optionally scoped to a single tenant.
    pub async fn list_workflows(&self, user_id: Option<&UserId>) -> Vec<Workflow> {
        self.workflows.list(user_id).await
    }

    /// Fetches a single job's current record.
    pub async fn get_job(&self, id: JobId) -> Result<Job> {
        self.jobs.get(id).await
    }

    /// Requests cancellation of a workflow: every pending job is cancelled
    /// immediately, and every running job's runner observes its
    /// cancellation token and is expected to return promptly.
    pub async fn cancel_workflow(&self, id: WorkflowId) -> Result<()> {
        let workflow = self.workflows.get(id).await?;
        if matches!(
            workflow.status,
            WorkflowStatus::Succeeded | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        ) {
            return Ok(());
        }

        if let Some(token) = self.workflow_tokens.read().await.get(&id) {
            token.cancel();
        }

        for job in self.jobs.list_by_workflow(id).await {
            if job.status == JobStatus::Pending {
                self.terminate_job(
                    job.id,
                    &workflow.user_id,
                    JobStatus::Cancelled,
                    JobFailure {
                        kind: ErrorKind::CancelledByRequest.as_str().to_owned(),
                        message: "cancelled by request".to_owned(),
                    },
                )
                .await;
            }
        }

        if let Ok(workflow) = self.workflows.recompute(id).await {
            self.publish_workflow_progress(&workflow);
        }
        self.dispatch_notify.notify_one();
        Ok(())
    }

    /// Signals every running job to stop and prevents any further
    /// dispatch. The dispatch loop exits once every in-flight job finishes.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
        self.dispatch_notify.notify_one();
    }

    async fn terminate_job(&self, job_id: JobId, user_id: &UserId, status: JobStatus, failure: JobFailure) {
        let result = match status {
            JobStatus::Failed => self.jobs.mark_failed(job_id, failure).await,
            JobStatus::Cancelled => self.jobs.mark_cancelled(job_id, failure).await,
            _ => return,
        };
        if let Ok(job) = result {
            self.publish_job_progress(&job);
            self.tenants.on_job_terminal(user_id);
        }
    }

    fn publish_job_progress(&self, job: &Job) {
        self.events.publish(Event::JobProgress {
            job_id: job.id,
            status: job.status,
            progress_percent: job.progress_percent,
            tiles_processed: job.tiles_processed,
            tiles_total: job.tiles_total,
        });
    }

    fn publish_workflow_progress(&self, workflow: &Workflow) {
        self.events.publish(Event::WorkflowProgress {
            workflow_id: workflow.id,
            status: workflow.status,
            progress_percent: workflow.progress_percent,
            completed_jobs: workflow.succeeded_jobs,
            failed_jobs: workflow.failed_jobs,
            total_jobs: workflow.total_jobs,
        });
    }

    /// Finds the next eligible job per branch across every active tenant's
    /// non-terminal workflows, ordered by workflow submission time, then
    /// branch id, then position.
    async fn ready_jobs(&self) -> Vec<(Workflow, Job)> {
        let mut ready = Vec::new();

        for workflow in self.workflows.all_nonterminal().await {
            if !self.tenants.is_active(&workflow.user_id) {
                continue;
            }
            let jobs = self.jobs.list_by_workflow(workflow.id).await;
            for branch_id in workflow.branches.keys() {
                let mut branch_jobs: Vec<&Job> =
                    jobs.iter().filter(|job| &job.branch_id == branch_id).collect();
                branch_jobs.sort_by_key(|job| job.position);

                for job in branch_jobs {
                    match job.status {
                        JobStatus::Succeeded => continue,
                        JobStatus::Pending => {
                            ready.push((workflow.clone(), job.clone()));
                            break;
                        }
                        _ => break,
                    }
                }
            }
        }

        ready.sort_by(|(wa, ja), (wb, jb)| {
            wa.created_at
                .cmp(&wb.created_at)
                .then(ja.branch_id.cmp(&jb.branch_id))
                .then(ja.position.cmp(&jb.position))
        });
        ready
    }

    /// Runs the dispatch loop until [`SchedulerCore::request_shutdown`] is
    /// called and every outstanding worker task has finished. Panics if
    /// called more than once on the same scheduler (or on any of its
    /// clones) concurrently.
    pub async fn run_dispatch_loop(&self) {
        let mut completions = self
            .completions_rx
            .lock()
            .await
            .take()
            .expect("dispatch loop is already running");

        let mut inflight = 0usize;

        loop {
            while let Ok(completion) = completions.try_recv() {
                inflight -= 1;
                self.handle_completion(completion).await;
            }

            if self.shutdown.is_cancelled() && inflight == 0 {
                break;
            }

            let mut assigned_any = false;
            if !self.shutdown.is_cancelled() {
                for (workflow, job) in self.ready_jobs().await {
                    let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                        break;
                    };

                    let Some(runner) = self.runners.get(&job.tag) else {
                        drop(permit);
                        self.terminate_job(
                            job.id,
                            &workflow.user_id,
                            JobStatus::Failed,
                            JobFailure {
                                kind: ErrorKind::RunnerCrash.as_str().to_owned(),
                                message: format!("no runner registered for tag '{}'", job.tag),
                            },
                        )
                        .await;
                        self.skip_remaining_branch_jobs(workflow.id, job.id, &workflow.user_id)
                            .await;
                        if let Ok(workflow) = self.workflows.recompute(workflow.id).await {
                            self.publish_workflow_progress(&workflow);
                        }
                        continue;
                    };

                    let cancel_token = self
                        .workflow_tokens
                        .read()
                        .await
                        .get(&workflow.id)
                        .cloned()
                        .unwrap_or_default();

                    if let Ok(running) = self.jobs.mark_running(job.id).await {
                        self.publish_job_progress(&running);
                    }

                    let jobs = self.jobs.clone();
                    let events = self.events.clone();
                    let completions_tx = self.completions_tx.clone();
                    let workflow_id = workflow.id;
                    let user_id = workflow.user_id.clone();
                    let job_id = job.id;
                    let branch_id = job.branch_id.clone();
                    let position = job.position;
                    let payload = job.payload.clone();

                    tracing::info!(
                        target: TRACING_TARGET,
                        job_id = %job_id,
                        workflow_id = %workflow_id,
                        tag = %job.tag,
                        "dispatching job"
                    );

                    tokio::spawn(async move {
                        let _permit = permit;
                        let view = JobView {
                            job_id,
                            workflow_id,
                            branch_id,
                            position,
                            payload,
                        };

                        let sink_jobs = jobs.clone();
                        let sink_events = events.clone();
                        let sink = ProgressSink::new(job_id, move |report| {
                            let jobs = sink_jobs.clone();
                            let events = sink_events.clone();
                            tokio::spawn(async move {
                                if let Ok(updated) = jobs
                                    .update_progress(
                                        job_id,
                                        report.progress_percent,
                                        report.tiles_processed,
                                        report.tiles_total,
                                    )
                                    .await
                                {
                                    events.publish(Event::JobProgress {
                                        job_id: updated.id,
                                        status: updated.status,
                                        progress_percent: updated.progress_percent,
                                        tiles_processed: updated.tiles_processed,
                                        tiles_total: updated.tiles_total,
                                    });
                                }
                            });
                        });

                        let outcome = match std::panic::AssertUnwindSafe(runner.run(view, sink, cancel_token))
                            .catch_unwind()
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(panic) => {
                                let message = panic
                                    .downcast_ref::<&str>()
                                    .map(|s| (*s).to_owned())
                                    .or_else(|| panic.downcast_ref::<String>().cloned())
                                    .unwrap_or_else(|| "runner panicked".to_owned());
                                tracing::error!(
                                    target: TRACING_TARGET,
                                    job_id = %job_id,
                                    message,
                                    "runner panicked"
                                );
                                Outcome::Failed {
                                    kind: ErrorKind::RunnerCrash.as_str().to_owned(),
                                    message,
                                }
                            }
                        };
                        let _ = completions_tx.send(Completion {
                            job_id,
                            workflow_id,
                            user_id,
                            outcome,
                        });
                    });

                    assigned_any = true;
                    inflight += 1;
                }
            }

            if !assigned_any {
                tokio::select! {
                    () = self.dispatch_notify.notified() => {}
                    Some(completion) = completions.recv() => {
                        inflight -= 1;
                        self.handle_completion(completion).await;
                    }
                    () = self.shutdown.cancelled(), if inflight == 0 => {}
                }
            }
        }

        tracing::info!(target: TRACING_TARGET, "dispatch loop exited");
    }

    async fn handle_completion(&self, completion: Completion) {
        let Completion {
            job_id,
            workflow_id,
            user_id,
            outcome,
        } = completion;

        match outcome {
            Outcome::Succeeded(result) => {
                if let Ok(job) = self.jobs.mark_succeeded(job_id, result).await {
                    self.publish_job_progress(&job);
                }
                self.tenants.on_job_terminal(&user_id);
            }
            Outcome::Failed { kind, message } => {
                let failure = JobFailure { kind, message };
                if let Ok(job) = self.jobs.mark_failed(job_id, failure).await {
                    self.publish_job_progress(&job);
                }
                self.tenants.on_job_terminal(&user_id);
                self.skip_remaining_branch_jobs(workflow_id, job_id, &user_id)
                    .await;
            }
            Outcome::Cancelled => {
                let failure = JobFailure {
                    kind: ErrorKind::CancelledByRequest.as_str().to_owned(),
                    message: "cancelled by request".to_owned(),
                };
                if let Ok(job) = self.jobs.mark_cancelled(job_id, failure).await {
                    self.publish_job_progress(&job);
                }
                self.tenants.on_job_terminal(&user_id);
            }
        }

        if let Ok(workflow) = self.workflows.recompute(workflow_id).await {
            self.publish_workflow_progress(&workflow);
        }

        self.dispatch_notify.notify_one();
    }

    /// A failed job cancels every later-position job in its own branch;
    /// other branches of the same workflow are unaffected.
    async fn skip_remaining_branch_jobs(&self, workflow_id: WorkflowId, failed_job_id: JobId, user_id: &UserId) {
        let Ok(failed_job) = self.jobs.get(failed_job_id).await else {
            return;
        };
        for sibling in self.jobs.list_by_workflow(workflow_id).await {
            if sibling.branch_id == failed_job.branch_id
                && sibling.position > failed_job.position
                && sibling.status == JobStatus::Pending
            {
                self.terminate_job(
                    sibling.id,
                    user_id,
                    JobStatus::Cancelled,
                    JobFailure {
                        kind: ErrorKind::SkippedDuePredecessor.as_str().to_owned(),
                        message: "skipped: a predecessor in this branch failed".to_owned(),
                    },
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::ids::BranchId;
    use crate::registry::job::JobSpec;
    use crate::runner::RunnerRegistryBuilder;
    use crate::runner::test_support::{FailingRunner, HangingRunner, MockRunner};

    fn limits(max_workers: usize, max_active_users: usize) -> SchedulerLimits {
        SchedulerLimits {
            max_workers,
            max_active_users,
            event_queue_capacity: 64,
        }
    }

    fn single_job_submission(user: &str, tag: &str) -> WorkflowSubmission {
        let mut branches = BTreeMap::new();
        branches.insert(
            BranchId::new("a"),
            vec![JobSpec {
                tag: tag.to_owned(),
                payload: serde_json::json!({}),
            }],
        );
        WorkflowSubmission {
            user_id: UserId::new(user),
            name: "test-workflow".to_owned(),
            branches,
        }
    }

    async fn wait_for_workflow_status(scheduler: &SchedulerCore, id: WorkflowId, status: WorkflowStatus) {
        for _ in 0..200 {
            if scheduler.get_workflow(id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("workflow {id} never reached {status}");
    }

    async fn wait_for_any_job_running(scheduler: &SchedulerCore, id: WorkflowId) {
        for _ in 0..200 {
            if scheduler
                .list_jobs(id)
                .await
                .unwrap()
                .iter()
                .any(|j| j.status == JobStatus::Running)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no job in workflow {id} ever started running");
    }

    #[tokio::test]
    async fn single_job_workflow_runs_to_completion() {
        let (runner, _) = MockRunner::new(3);
        let runners = RunnerRegistryBuilder::new().register("tile-infer", runner).build();
        let scheduler = SchedulerCore::new(limits(4, 4), runners);

        let dispatch = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_dispatch_loop().await })
        };

        let workflow = scheduler
            .submit_workflow(single_job_submission("tenant-a", "tile-infer"))
            .await
            .unwrap();

        wait_for_workflow_status(&scheduler, workflow.id, WorkflowStatus::Succeeded).await;

        scheduler.request_shutdown();
        dispatch.await.unwrap();
    }

    #[tokio::test]
    async fn global_cap_limits_concurrent_jobs() {
        let (runner, _) = MockRunner::new(50);
        let runners = RunnerRegistryBuilder::new().register("tile-infer", runner).build();
        let scheduler = SchedulerCore::new(limits(1, 4), runners);

        let dispatch = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_dispatch_loop().await })
        };

        scheduler
            .submit_workflow(single_job_submission("tenant-a", "tile-infer"))
            .await
            .unwrap();
        scheduler
            .submit_workflow(single_job_submission("tenant-b", "tile-infer"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let snapshot = scheduler.status_snapshot();
        if let Event::SystemStatus { running_jobs, .. } = snapshot {
            assert!(running_jobs <= 1);
        } else {
            panic!("unexpected event variant");
        }

        scheduler.request_shutdown();
        dispatch.await.unwrap();
    }

    #[tokio::test]
    async fn tenant_cap_queues_excess_tenants() {
        let (runner, _) = MockRunner::new(20);
        let runners = RunnerRegistryBuilder::new().register("tile-infer", runner).build();
        let scheduler = SchedulerCore::new(limits(4, 1), runners);

        let dispatch = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_dispatch_loop().await })
        };

        scheduler
            .submit_workflow(single_job_submission("tenant-a", "tile-infer"))
            .await
            .unwrap();
        let second = scheduler
            .submit_workflow(single_job_submission("tenant-b", "tile-infer"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let jobs = scheduler.list_jobs(second.id).await.unwrap();
        assert_eq!(jobs[0].status, JobStatus::Pending);

        scheduler.request_shutdown();
        dispatch.await.unwrap();
    }

    #[tokio::test]
    async fn branch_failure_skips_only_later_jobs_in_same_branch() {
        let (failing, _) = (Arc::new(FailingRunner), ());
        let (ok_runner, _) = MockRunner::new(2);
        let runners = RunnerRegistryBuilder::new()
            .register("fails", failing)
            .register("ok", ok_runner)
            .build();
        let scheduler = SchedulerCore::new(limits(4, 4), runners);

        let dispatch = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_dispatch_loop().await })
        };

        let mut branches = BTreeMap::new();
        branches.insert(
            BranchId::new("fails-branch"),
            vec![
                JobSpec {
                    tag: "fails".to_owned(),
                    payload: serde_json::json!({}),
                },
                JobSpec {
                    tag: "ok".to_owned(),
                    payload: serde_json::json!({}),
                },
            ],
        );
        branches.insert(
            BranchId::new("other-branch"),
            vec![JobSpec {
                tag: "ok".to_owned(),
                payload: serde_json::json!({}),
            }],
        );
        let submission = WorkflowSubmission {
            user_id: UserId::new("tenant-a"),
            name: "test-workflow".to_owned(),
            branches,
        };
        let workflow = scheduler.submit_workflow(submission).await.unwrap();

        wait_for_workflow_status(&scheduler, workflow.id, WorkflowStatus::Failed).await;

        let jobs = scheduler.list_jobs(workflow.id).await.unwrap();
        let skipped = jobs
            .iter()
            .find(|j| j.branch_id == BranchId::new("fails-branch") && j.position == 1)
            .unwrap();
        assert_eq!(skipped.status, JobStatus::Cancelled);

        let other = jobs
            .iter()
            .find(|j| j.branch_id == BranchId::new("other-branch"))
            .unwrap();
        assert_eq!(other.status, JobStatus::Succeeded);

        scheduler.request_shutdown();
        dispatch.await.unwrap();
    }

    #[tokio::test]
    async fn cancelling_a_workflow_stops_its_pending_jobs() {
        let runners = RunnerRegistryBuilder::new()
            .register("hangs", Arc::new(HangingRunner))
            .build();
        let scheduler = SchedulerCore::new(limits(4, 4), runners);

        let dispatch = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_dispatch_loop().await })
        };

        let mut branches = BTreeMap::new();
        branches.insert(
            BranchId::new("a"),
            vec![
                JobSpec {
                    tag: "hangs".to_owned(),
                    payload: serde_json::json!({}),
                },
                JobSpec {
                    tag: "hangs".to_owned(),
                    payload: serde_json::json!({}),
                },
            ],
        );
        let submission = WorkflowSubmission {
            user_id: UserId::new("tenant-a"),
            name: "test-workflow".to_owned(),
            branches,
        };
        let workflow = scheduler.submit_workflow(submission).await.unwrap();

        wait_for_any_job_running(&scheduler, workflow.id).await;

        scheduler.cancel_workflow(workflow.id).await.unwrap();

        let jobs = scheduler.list_jobs(workflow.id).await.unwrap();
        let queued = jobs.iter().find(|j| j.position == 1).unwrap();
        assert_eq!(queued.status, JobStatus::Cancelled);

        wait_for_workflow_status(&scheduler, workflow.id, WorkflowStatus::Cancelled).await;
        let jobs = scheduler.list_jobs(workflow.id).await.unwrap();
        let running_job = jobs.iter().find(|j| j.position == 0).unwrap();
        assert_eq!(running_job.status, JobStatus::Cancelled);
        assert_eq!(
            running_job.failure.as_ref().unwrap().kind,
            ErrorKind::CancelledByRequest.as_str()
        );

        scheduler.request_shutdown();
        dispatch.await.unwrap();
    }

    #[tokio::test]
    async fn panicking_runner_fails_the_job_with_runner_crash() {
        use crate::runner::test_support::PanickingRunner;

        let runners = RunnerRegistryBuilder::new()
            .register("explodes", Arc::new(PanickingRunner))
            .build();
        let scheduler = SchedulerCore::new(limits(4, 4), runners);

        let dispatch = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_dispatch_loop().await })
        };

        let workflow = scheduler
            .submit_workflow(single_job_submission("tenant-a", "explodes"))
            .await
            .unwrap();

        wait_for_workflow_status(&scheduler, workflow.id, WorkflowStatus::Failed).await;

        let jobs = scheduler.list_jobs(workflow.id).await.unwrap();
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(
            jobs[0].failure.as_ref().unwrap().kind,
            ErrorKind::RunnerCrash.as_str()
        );

        scheduler.request_shutdown();
        dispatch.await.unwrap();
    }
}
