use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pairsync_daemon::config::{load_pairs, DaemonArgs};
use pairsync_daemon::manager::{Manager, ManagerSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = DaemonArgs::parse();

    let pairs = load_pairs(&args.config)
        .with_context(|| format!("loading pair configuration {}", args.config.display()))?;

    let settings = ManagerSettings {
        journal: args.journal,
        worker_bin: args.worker_bin,
        worker_limit: args.workers,
        pipe_in: args.pipe_in,
        pipe_out: args.pipe_out,
    };
    let mut manager =
        Manager::new(settings, pairs.len()).context("initializing the manager")?;

    manager.bootstrap(pairs);
    manager.run().await.context("control loop failed")?;
    Ok(())
}
