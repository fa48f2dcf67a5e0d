//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── server: ServerConfig          # Host, port, shutdown timeout
//! ├── scheduler: SchedulerConfig    # max_workers, max_active_users, event_queue_capacity
//! └── recovery: RecoveryConfig      # HTTP request timeout (scheduler-server middleware)
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see every available option.

mod scheduler;
mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use scheduler::SchedulerConfig;
use scheduler_server::middleware::RecoveryConfig;
use serde::{Deserialize, Serialize};
pub use server::{ServerConfig, log_server_config};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "scheduler")]
#[command(about = "Multi-tenant scheduler for large-image inference workflows")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Scheduling-core admission limits.
    #[clap(flatten)]
    pub scheduler: SchedulerConfig,

    /// HTTP request recovery configuration (timeout, panic handling).
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl Cli {
    /// Loads environment variables from a `.env` file (if enabled) and
    /// parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            "build information"
        );
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if the server or scheduler configuration is
    /// invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate().context("invalid server configuration")?;
        self.scheduler.validate().context("invalid scheduler configuration")?;
        Ok(())
    }

    /// Logs configuration at info/debug level.
    pub fn log(&self) {
        Self::log_build_info();
        log_server_config(&self.server);
        self.scheduler.log();
    }
}
