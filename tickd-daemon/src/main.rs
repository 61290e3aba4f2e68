//! Tickd Daemon
//!
//! A single-binary substitute for system cron with dynamic
//! reconfiguration and completion notifications.
//!
//! Architecture:
//! - Configuration: declarative TOML job definitions, reloadable at runtime
//! - Scheduler: tracks which job fires when, atomic reload
//! - Executor: runs one job to completion on the host or in a container
//! - Notifier: fans completed runs out to webhook/chat channels
//! - Control plane: Unix-socket protocol to list, trigger, and reload jobs
//!
//! The daemon fires due jobs from a single timing loop; each run and each
//! control connection is an independent task that never blocks the loop.

mod control;
mod executor;
mod notify;
mod scheduler;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::control::ControlServer;
use crate::notify::Notifier;
use crate::scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "tickd")]
#[command(about = "Cron-style job scheduler with a control socket", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, env = "TICKD_CONFIG", default_value = "/etc/tickd.toml")]
    config: PathBuf,

    /// Path to the Unix control socket
    #[arg(long, env = "TICKD_SOCKET", default_value = "/var/run/tickd.sock")]
    socket: PathBuf,

    /// Validate the configuration and exit without starting
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tickd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let jobs = tickd_config::load(&args.config)
        .with_context(|| format!("cannot load config {}", args.config.display()))?;
    info!(
        "loaded {} job(s) from {}",
        jobs.len(),
        args.config.display()
    );

    if args.validate {
        println!("configuration OK");
        return Ok(());
    }

    let notifier = Arc::new(Notifier::new());
    let scheduler = Scheduler::new(Arc::clone(&notifier));
    scheduler
        .reload(jobs)
        .context("cannot build initial schedule")?;

    let listener = ControlServer::bind(&args.socket)?;
    let control = ControlServer::new(
        Arc::clone(&scheduler),
        Arc::clone(&notifier),
        args.config.clone(),
    );
    tokio::spawn(control.serve(listener));
    info!("control socket listening on {}", args.socket.display());

    watch::start(args.config.clone(), Arc::clone(&scheduler));

    let firing = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    info!("shutting down");

    scheduler.stop();
    let _ = firing.await;
    let _ = std::fs::remove_file(&args.socket);

    Ok(())
}
