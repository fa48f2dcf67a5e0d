//! Per-tenant admission: the `max_active_users` cap and its FIFO queue.
//!
//! A tenant becomes `Active` the moment it has at least one non-terminal job
//! and a free slot is available; otherwise it waits `Queued` in submission
//! order. A tenant's slot is released — and the longest-waiting queued
//! tenant promoted — only when its aggregate non-terminal job count across
//! every workflow it has submitted reaches zero (Open Question 1: release
//! is per-tenant, not per-workflow, so one finished workflow does not free
//! a slot while another of the same tenant's workflows is still running).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::ids::UserId;

const TRACING_TARGET: &str = "scheduler_core::tenant";

/// A tenant's current relationship to the `max_active_users` cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TenantState {
    /// Holds a slot; its jobs are eligible for the global dispatch loop.
    Active,
    /// Waiting in FIFO order for a slot to free up.
    Queued,
    /// Known to the manager but currently has no non-terminal jobs.
    Idle,
}

struct TenantRecord {
    state: TenantState,
    non_terminal_jobs: usize,
}

struct Inner {
    max_active_users: usize,
    tenants: HashMap<UserId, TenantRecord>,
    queue: VecDeque<UserId>,
}

/// Tracks tenant admission against the global concurrency-independent
/// `max_active_users` cap. Cheaply cloneable; every clone shares state.
#[derive(Clone)]
pub struct TenantManager {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl TenantManager {
    #[must_use]
    pub fn new(max_active_users: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                max_active_users: max_active_users.max(1),
                tenants: HashMap::new(),
                queue: VecDeque::new(),
            })),
        }
    }

    /// Registers a newly submitted workflow's jobs against its tenant,
    /// admitting the tenant immediately if a slot is free or enqueuing it
    /// otherwise. Returns the tenant's resulting state.
    pub fn on_workflow_submitted(&self, user: &UserId, job_count: usize) -> TenantState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let already_tracked = inner.tenants.contains_key(user);
        let entry = inner
            .tenants
            .entry(user.clone())
            .or_insert(TenantRecord {
                state: TenantState::Idle,
                non_terminal_jobs: 0,
            });
        entry.non_terminal_jobs += job_count;

        let state = match entry.state {
            TenantState::Active | TenantState::Queued => entry.state,
            TenantState::Idle => {
                let active_count = inner
                    .tenants
                    .values()
                    .filter(|t| t.state == TenantState::Active)
                    .count();
                if active_count < inner.max_active_users {
                    TenantState::Active
                } else {
                    inner.queue.push_back(user.clone());
                    TenantState::Queued
                }
            }
        };

        if let Some(record) = inner.tenants.get_mut(user) {
            record.state = state;
        }

        tracing::debug!(
            target: TRACING_TARGET,
            user_id = %user,
            state = %state,
            already_tracked,
            "tenant workflow submitted"
        );

        state
    }

    /// Records that one of a tenant's jobs reached a terminal state. If the
    /// tenant's aggregate non-terminal count reaches zero and it held an
    /// active slot, the slot is released and the next queued tenant (if
    /// any) is promoted to `Active`. Returns the promoted tenant's id, if
    /// a promotion happened.
    pub fn on_job_terminal(&self, user: &UserId) -> Option<UserId> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let Some(record) = inner.tenants.get_mut(user) else {
            return None;
        };
        record.non_terminal_jobs = record.non_terminal_jobs.saturating_sub(1);
        if record.non_terminal_jobs > 0 {
            return None;
        }

        let was_active = record.state == TenantState::Active;
        record.state = TenantState::Idle;

        if !was_active {
            return None;
        }

        let promoted = loop {
            let Some(candidate) = inner.queue.pop_front() else {
                break None;
            };
            match inner.tenants.get_mut(&candidate) {
                Some(candidate_record) if candidate_record.state == TenantState::Queued => {
                    candidate_record.state = TenantState::Active;
                    break Some(candidate);
                }
                _ => continue,
            }
        };

        if let Some(promoted) = &promoted {
            tracing::debug!(
                target: TRACING_TARGET,
                released_user_id = %user,
                promoted_user_id = %promoted,
                "tenant slot released and reassigned"
            );
        } else {
            tracing::debug!(
                target: TRACING_TARGET,
                released_user_id = %user,
                "tenant slot released, queue empty"
            );
        }

        promoted
    }

    /// Whether a tenant currently holds an active slot.
    #[must_use]
    pub fn is_active(&self, user: &UserId) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .tenants
            .get(user)
            .is_some_and(|record| record.state == TenantState::Active)
    }

    /// A point-in-time snapshot: `(active_count, queued_count)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let active = inner
            .tenants
            .values()
            .filter(|t| t.state == TenantState::Active)
            .count();
        (active, inner.queue.len())
    }

    /// The configured tenant-slot cap (`max_active_users`), independent of
    /// how many slots are currently in use.
    #[must_use]
    pub fn max_active_users(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.max_active_users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_cap_then_queues() {
        let manager = TenantManager::new(2);
        let a = UserId::new("a");
        let b = UserId::new("b");
        let c = UserId::new("c");

        assert_eq!(manager.on_workflow_submitted(&a, 1), TenantState::Active);
        assert_eq!(manager.on_workflow_submitted(&b, 1), TenantState::Active);
        assert_eq!(manager.on_workflow_submitted(&c, 1), TenantState::Queued);
        assert_eq!(manager.counts(), (2, 1));
    }

    #[test]
    fn resubmission_by_an_active_tenant_stays_active() {
        let manager = TenantManager::new(1);
        let a = UserId::new("a");
        assert_eq!(manager.on_workflow_submitted(&a, 2), TenantState::Active);
        assert_eq!(manager.on_workflow_submitted(&a, 3), TenantState::Active);
    }

    #[test]
    fn slot_releases_only_after_every_job_terminates() {
        let manager = TenantManager::new(1);
        let a = UserId::new("a");
        let b = UserId::new("b");

        manager.on_workflow_submitted(&a, 1);
        manager.on_workflow_submitted(&a, 1);
        assert_eq!(manager.on_workflow_submitted(&b, 1), TenantState::Queued);

        assert_eq!(manager.on_job_terminal(&a), None);
        assert!(manager.is_active(&a));

        let promoted = manager.on_job_terminal(&a);
        assert_eq!(promoted, Some(b.clone()));
        assert!(manager.is_active(&b));
        assert!(!manager.is_active(&a));
    }

    #[test]
    fn max_active_users_reports_the_configured_cap_not_live_counts() {
        let manager = TenantManager::new(2);
        assert_eq!(manager.max_active_users(), 2);

        manager.on_workflow_submitted(&UserId::new("a"), 1);
        assert_eq!(manager.max_active_users(), 2);

        manager.on_workflow_submitted(&UserId::new("b"), 1);
        manager.on_workflow_submitted(&UserId::new("c"), 1);
        assert_eq!(manager.counts(), (2, 1));
        assert_eq!(manager.max_active_users(), 2);
    }

    #[test]
    fn fifo_order_is_preserved_among_queued_tenants() {
        let manager = TenantManager::new(1);
        let a = UserId::new("a");
        let b = UserId::new("b");
        let c = UserId::new("c");

        manager.on_workflow_submitted(&a, 1);
        manager.on_workflow_submitted(&b, 1);
        manager.on_workflow_submitted(&c, 1);

        assert_eq!(manager.on_job_terminal(&a), Some(b.clone()));
        assert_eq!(manager.on_job_terminal(&b), Some(c));
    }
}
