#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod runners;
mod server;

use std::process;

use scheduler_core::SchedulerCore;
use scheduler_server::prelude::*;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "scheduler_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "scheduler_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "scheduler_cli::config";
pub const TRACING_TARGET_SERVER_STARTUP: &str = "scheduler_cli::server::startup";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "scheduler shut down cleanly"
        );
        process::exit(0);
    };

    eprintln!("Error: {error:#}");
    process::exit(1);
}

/// Main application entry point: parses configuration, wires the
/// scheduling core to the HTTP adapter, and serves until a shutdown
/// signal arrives and every in-flight job has drained.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.validate()?;
    cli.log();

    let runners = runners::build_registry();
    let core = SchedulerCore::new(cli.scheduler.limits(), runners);

    let dispatch = tokio::spawn({
        let core = core.clone();
        async move { core.run_dispatch_loop().await }
    });

    let state = ServiceState::new(core.clone());
    let router = routes(state)
        .with_recovery(&cli.recovery)
        .with_observability();

    let shutdown_timeout = cli.server.shutdown_timeout();
    server::serve(router, cli.server.clone()).await?;

    // The HTTP listener has stopped accepting and drained its in-flight
    // requests; now signal every running job's cancel token and give the
    // dispatch loop up to the configured timeout to finish draining them.
    core.request_shutdown();
    if tokio::time::timeout(shutdown_timeout, dispatch).await.is_err() {
        tracing::warn!(
            target: TRACING_TARGET_SHUTDOWN,
            timeout_secs = shutdown_timeout.as_secs(),
            "dispatch loop did not drain within the shutdown timeout"
        );
    }

    Ok(())
}
