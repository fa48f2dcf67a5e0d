//! Scheduling-core configuration: the two admission caps and the event
//! bus's per-topic buffer size.

use clap::Args;
use scheduler_core::SchedulerLimits;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// CLI-configurable scheduling limits.
///
/// The runner registry is deliberately not configurable here: which job
/// tags are supported is a property of the binary's wiring, not something
/// an operator should be able to change at the command line.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct SchedulerConfig {
    /// Global ceiling on simultaneously running jobs, across every tenant.
    #[arg(long, env = "SCHEDULER_MAX_WORKERS", default_value_t = 4)]
    pub max_workers: usize,

    /// Ceiling on tenants with at least one job eligible to run at once.
    #[arg(long, env = "SCHEDULER_MAX_ACTIVE_USERS", default_value_t = 2)]
    pub max_active_users: usize,

    /// Per-topic event bus channel capacity. A subscriber that falls this
    /// far behind the publisher sees an `Overflow` marker and resumes at
    /// the next live event rather than blocking publication.
    #[arg(long, env = "SCHEDULER_EVENT_QUEUE_CAPACITY", default_value_t = 64)]
    pub event_queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_active_users: 2,
            event_queue_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Validates the configured limits.
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is zero; a zero cap would admit no
    /// workflow at all.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_workers == 0 {
            return Err(anyhow::anyhow!("max_workers must be at least 1"));
        }
        if self.max_active_users == 0 {
            return Err(anyhow::anyhow!("max_active_users must be at least 1"));
        }
        if self.event_queue_capacity == 0 {
            return Err(anyhow::anyhow!("event_queue_capacity must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub const fn limits(&self) -> SchedulerLimits {
        SchedulerLimits {
            max_workers: self.max_workers,
            max_active_users: self.max_active_users,
            event_queue_capacity: self.event_queue_capacity,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            max_workers = self.max_workers,
            max_active_users = self.max_active_users,
            event_queue_capacity = self.event_queue_capacity,
            "scheduler configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_workers() {
        let config = SchedulerConfig {
            max_workers: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_active_users() {
        let config = SchedulerConfig {
            max_active_users: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
