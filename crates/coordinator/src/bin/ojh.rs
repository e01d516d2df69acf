// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ojh`: the Coordinator's command-line entry point (§6.6). Folds what
//! the teacher splits across `oj` (CLI) and `ojd` (daemon) into one
//! binary, since this harness has no long-lived client/server split —
//! `ojh run` *is* the Coordinator process.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use harness_coordinator::{Config, ParallelCoordinator, SerialCoordinator};
use harness_core::SystemClock;
use harness_store::{InterruptGate, SessionStore, StateLayout};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ojh", version, about = "Autonomous agent harness coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Coordinator until shutdown or `--max-iterations` is reached.
    Run {
        /// Path to a YAML overrides file (default: `$OJH_STATE_DIR/harness.yaml`).
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_iterations: Option<u64>,
        /// Number of concurrent agent slots. 0 or 1 runs the serial variant.
        #[arg(long)]
        parallel_agents: Option<u32>,
    },
    /// Print the current session (serial) or agent slots (parallel).
    Status {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Clear a pending interrupt request, letting the Coordinator resume.
    Resume {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("OJH_LOG").unwrap_or_else(|_| "info".to_string()))
        .compact()
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config, max_iterations, parallel_agents } => run(config, max_iterations, parallel_agents).await,
        Command::Status { config } => status(config),
        Command::Resume { config } => resume(config),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "ojh command failed");
    }
    result
}

async fn run(config_path: Option<PathBuf>, max_iterations: Option<u64>, parallel_agents: Option<u32>) -> Result<()> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(v) = max_iterations {
        config.max_iterations = v;
    }
    if let Some(v) = parallel_agents {
        config.parallel_agents = v;
    }

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, draining in-flight session");
            shutdown_signal.cancel();
        }
    });

    if config.parallel_agents > 1 {
        let coordinator = ParallelCoordinator::new(config, SystemClock, shutdown);
        coordinator.run().await.map_err(|e| anyhow!("{e}"))
    } else {
        let coordinator = SerialCoordinator::new(config, SystemClock, shutdown);
        coordinator.run().await.map_err(|e| anyhow!("{e}"))
    }
}

fn status(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let layout = StateLayout::new(config.state_dir.clone());
    let sessions = SessionStore::new(layout.clone());

    if let Some(session) = sessions.read_current()? {
        println!("session:  {}", session.session_id);
        println!("status:   {:?}", session.status);
        println!("work_id:  {}", session.work.id);
        println!("started:  {}", session.started_at);
        return Ok(());
    }

    let agents_dir = layout.state_dir().join("agents");
    let mut printed = false;
    if let Ok(entries) = std::fs::read_dir(&agents_dir) {
        for entry in entries.flatten() {
            let Some(agent_id) = entry.file_name().into_string().ok() else { continue };
            let status_path = entry.path().join("status.json");
            let Ok(bytes) = std::fs::read(&status_path) else { continue };
            let Ok(session) = serde_json::from_slice::<harness_core::Session>(&bytes) else { continue };
            println!("agent:    {}", agent_id);
            println!("session:  {}", session.session_id);
            println!("status:   {:?}", session.status);
            println!("work_id:  {}", session.work.id);
            println!("---");
            printed = true;
        }
    }

    if !printed {
        println!("no active session");
    }
    Ok(())
}

fn resume(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let layout = StateLayout::new(config.state_dir.clone());
    let gate = InterruptGate::new(layout);
    if gate.is_asserted() {
        gate.clear().map_err(|e| anyhow!("{e}"))?;
        println!("interrupt cleared, Coordinator will resume on its next poll");
    } else {
        println!("no interrupt pending");
    }
    Ok(())
}
