// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Coordinator (C6), parallel variant (§4.8). Runs `parallel_agents`
//! independent slot workers against the same queue and state root,
//! staggers their startup, and runs a pool-maintenance task that
//! recovers slots a crashed-and-restarted Coordinator process left
//! behind. Each slot is a stable [`AgentId`] that repeatedly claims
//! work, spawns, supervises, and archives — the same per-session shape
//! the serial variant uses, generalized to run many of them at once.

use crate::config::Config;
use crate::error::CoordinatorError;
use crate::metrics;
use harness_core::{AgentId, Clock, Session, SessionStatus, WorkItem};
use harness_health::{HealthConfig, HealthRecovery};
use harness_monitor::{MonitorConfig, StreamMonitor};
use harness_queue::QueueAdapter;
use harness_spawn::{AgentSpawner, SpawnedAgent, SpawnerConfig};
use harness_store::{
    pid_is_alive, AgentFiles, CrashPreserver, FailureCounter, InterruptGate, MetricsStore, SessionLog, SessionStore,
    SlotRegistry, StateLayout,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Handles every slot worker and the maintenance task share. Cheap to
/// clone: every field is a handle onto shared filesystem state, never
/// a copy of the state itself. Slots never observe each other directly
/// (§4.8); they only interact through the filesystem, same as the
/// serial variant's single session does.
#[derive(Clone)]
struct Shared<C: Clock> {
    layout: StateLayout,
    queue: QueueAdapter,
    sessions: SessionStore,
    files: AgentFiles,
    interrupt: InterruptGate,
    failures: FailureCounter,
    crash: CrashPreserver,
    metrics_store: MetricsStore,
    spawner: AgentSpawner<C>,
    health: HealthRecovery<C>,
    slot_registry: SlotRegistry,
    clock: C,
    config: Config,
    shutdown: CancellationToken,
}

pub struct ParallelCoordinator<C: Clock> {
    shared: Shared<C>,
}

impl<C: Clock + 'static> ParallelCoordinator<C> {
    pub fn new(config: Config, clock: C, shutdown: CancellationToken) -> Self {
        let layout = StateLayout::new(config.state_dir.clone());
        let workers_root = config.workers_root.clone().unwrap_or_else(|| config.state_dir.join("workers"));
        let spawner_config = SpawnerConfig {
            binary: config.agent_binary.clone(),
            repo_root: config.repo_root.clone(),
            workers_root: Some(workers_root),
            bootstrap_template: config.bootstrap_template.clone(),
            initial_prompt: config.initial_prompt.clone(),
            tool_allowlist: config.tool_allowlist.clone(),
            max_turns: config.max_turns,
            budget_cents: config.budget_cents,
            rig: config.rig.clone(),
        };
        let health_config = HealthConfig {
            session_timeout: config.session_timeout,
            stall_threshold: config.stall_threshold,
            kill_grace_period: config.kill_grace_period,
            max_consecutive_failures: config.max_consecutive_failures,
        };
        let shared = Shared {
            queue: QueueAdapter::new(config.state_dir.clone()),
            sessions: SessionStore::new(layout.clone()),
            files: AgentFiles::new(layout.clone()),
            interrupt: InterruptGate::new(layout.clone()),
            failures: FailureCounter::new(layout.clone()),
            crash: CrashPreserver::new(layout.clone()),
            metrics_store: MetricsStore::new(layout.clone()),
            spawner: AgentSpawner::new(spawner_config, layout.clone(), clock.clone()),
            health: HealthRecovery::new(layout.clone(), clock.clone(), health_config, true),
            slot_registry: SlotRegistry::new(layout.clone()),
            layout,
            clock,
            config,
            shutdown,
        };
        Self { shared }
    }

    /// §4.8: recover any slot a prior crashed process left dangling,
    /// then launch `parallel_agents` staggered slot workers plus pool
    /// maintenance, and drain until every task has exited.
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        std::fs::create_dir_all(self.shared.layout.state_dir())
            .map_err(|e| CoordinatorError::Startup(format!("cannot create state dir: {e}")))?;
        self.shared.interrupt.clear()?;
        self.shared.queue.check()?;

        let slots = self.shared.slot_registry.load_or_init(self.shared.config.parallel_agents.max(1) as usize)?;
        for agent_id in &slots {
            recover_slot(&self.shared, agent_id)?;
        }

        let mut tasks = JoinSet::new();
        for (i, agent_id) in slots.iter().copied().enumerate() {
            if i > 0 {
                sleep_or_shutdown(&self.shared.shutdown, self.shared.config.parallel_stagger).await;
            }
            if self.shared.shutdown.is_cancelled() {
                break;
            }
            let shared = self.shared.clone();
            tasks.spawn(async move { run_slot(shared, agent_id).await });
        }

        let shared = self.shared.clone();
        let maintenance_slots = slots.clone();
        tasks.spawn(async move { maintain_pool(shared, maintenance_slots).await });

        while let Some(outcome) = tasks.join_next().await {
            if let Err(e) = outcome {
                tracing::warn!(error = %e, "slot or maintenance task panicked");
            }
        }
        Ok(())
    }
}

/// Coordinator crash recovery (§4.8): if this slot still names a
/// non-terminal session but its pid is gone or dead, the prior process
/// never got to finish it. Release the claim, preserve what's there
/// under a `crash-*` category, and leave the slot free to pick up new
/// work on its next pass.
fn recover_slot<C: Clock>(shared: &Shared<C>, agent_id: &AgentId) -> Result<(), CoordinatorError> {
    let Some(session) = shared.sessions.read_agent_status(agent_id)? else {
        return Ok(());
    };
    if session.status.is_terminal() {
        return Ok(());
    }
    let pid_alive = shared.files.read_pid(agent_id)?.map(pid_is_alive).unwrap_or(false);
    if pid_alive {
        return Ok(());
    }

    tracing::warn!(agent_id = %agent_id, session_id = %session.session_id, "recovering slot orphaned by a prior Coordinator process");
    if let Err(e) = shared.queue.release(&session.work.id) {
        tracing::warn!(agent_id = %agent_id, error = %e, "failed to release orphaned claim");
    }
    let epoch = shared.clock.epoch_ms() / 1000;
    let category = format!("crash-{epoch}");
    if let Err(e) = shared.crash.preserve(&session, agent_id, &category, "recovered after Coordinator restart") {
        tracing::warn!(agent_id = %agent_id, error = %e, "failed to preserve orphaned slot context");
    }
    Ok(())
}

/// One slot's whole lifetime: claim, spawn, supervise, archive, repeat
/// until shutdown. Mirrors the serial Coordinator's per-session flow
/// (§4.5), looped and addressed to this slot's agent-status record
/// instead of the single current-session pointer.
async fn run_slot<C: Clock>(shared: Shared<C>, agent_id: AgentId) {
    let mut iteration: u64 = 0;
    loop {
        if shared.shutdown.is_cancelled() {
            return;
        }

        if shared.interrupt.is_asserted() {
            if !crate::resume::wait_for_resume(&shared.interrupt, shared.config.interrupt_check_interval, &shared.shutdown).await {
                return;
            }
            continue;
        }

        let next = match shared.queue.next() {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(agent_id = %agent_id, error = %e, "queue read failed for slot");
                sleep_or_shutdown(&shared.shutdown, shared.config.iteration_delay).await;
                continue;
            }
        };

        match next {
            None => sleep_or_shutdown(&shared.shutdown, shared.config.iteration_delay).await,
            Some(work) => {
                match shared.queue.claim(&work.id, &agent_id) {
                    Ok(()) => {
                        if let Err(e) = run_one_session(&shared, &agent_id, &work, iteration).await {
                            tracing::error!(agent_id = %agent_id, error = %e, "slot session failed");
                        }
                        iteration += 1;
                    }
                    Err(e) => {
                        tracing::debug!(agent_id = %agent_id, work_id = %work.id, error = %e, "claim lost the race, retrying next tick");
                    }
                }
            }
        }
    }
}

async fn run_one_session<C: Clock>(
    shared: &Shared<C>,
    agent_id: &AgentId,
    work: &WorkItem,
    iteration: u64,
) -> Result<(), CoordinatorError> {
    let spawned = match shared.spawner.spawn(agent_id, work, iteration, true).await {
        Ok(spawned) => spawned,
        Err(e) => {
            tracing::error!(agent_id = %agent_id, error = %e, "agent spawn failed");
            let _ = shared.queue.release(&work.id);
            handle_spawn_failure(shared).await?;
            return Ok(());
        }
    };
    shared.failures.reset()?;
    let SpawnedAgent { session, mut child } = spawned;
    let session_id = session.session_id.clone();
    let session = Arc::new(Mutex::new(session));

    let stdout = child.stdout.take().expect("spawner pipes stdout");
    let stderr = child.stderr.take().expect("spawner pipes stderr");

    let monitor_cancel = CancellationToken::new();
    let monitor = StreamMonitor::new(
        *agent_id,
        Arc::clone(&session),
        shared.sessions.clone(),
        shared.files.clone(),
        SessionLog::new(shared.layout.clone(), session_id.clone()),
        PathBuf::from(session.lock().log_paths.transcript.clone()),
        PathBuf::from(session.lock().log_paths.stdout.clone()),
        PathBuf::from(session.lock().log_paths.stderr.clone()),
        shared.clock.clone(),
        MonitorConfig::default(),
        true,
    );
    let monitor_token = monitor_cancel.clone();
    let monitor_task = tokio::spawn(async move {
        if let Err(e) = monitor.run(stdout, stderr, monitor_token).await {
            tracing::warn!(error = %e, "stream monitor exited with an error");
        }
    });

    let files = shared.files.clone();
    let waiter_agent_id = *agent_id;
    let waiter = tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                if let Err(e) = files.write_exit(&waiter_agent_id, code) {
                    tracing::warn!(error = %e, "failed to record child exit code");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to wait on child process"),
        }
    });

    supervise(shared, agent_id, &session, &monitor_cancel).await?;

    let _ = waiter.await;
    let _ = monitor_task.await;

    finish_session(shared, agent_id, &session)?;
    Ok(())
}

async fn supervise<C: Clock>(
    shared: &Shared<C>,
    agent_id: &AgentId,
    session: &Arc<Mutex<Session>>,
    monitor_cancel: &CancellationToken,
) -> Result<(), CoordinatorError> {
    loop {
        sleep_or_shutdown(&shared.shutdown, shared.config.interrupt_check_interval).await;

        if shared.health.check(agent_id, session).await? {
            break;
        }
        if shared.interrupt.is_asserted() {
            interrupt_session(shared, agent_id, session, true).await?;
            break;
        }
        if shared.shutdown.is_cancelled() {
            interrupt_session(shared, agent_id, session, false).await?;
            break;
        }
    }
    monitor_cancel.cancel();
    Ok(())
}

async fn interrupt_session<C: Clock>(
    shared: &Shared<C>,
    agent_id: &AgentId,
    session: &Arc<Mutex<Session>>,
    wait: bool,
) -> Result<(), CoordinatorError> {
    if let Some(pid) = shared.files.read_pid(agent_id)? {
        harness_health::kill::kill(pid, shared.config.kill_grace_period).await;
    }

    let reason = shared.interrupt.reason()?.or_else(|| Some("sigterm received".to_string()));
    let now_iso = harness_core::time_fmt::iso_from_epoch_ms(shared.clock.epoch_ms());
    {
        let mut guard = session.lock();
        if let Err(e) = guard.transition(SessionStatus::Interrupted, reason.clone(), now_iso) {
            tracing::warn!(agent_id = %agent_id, error = %e, "illegal interrupted transition dropped");
        }
    }
    shared.sessions.write_agent_status(agent_id, &session.lock())?;

    let epoch = shared.clock.epoch_ms() / 1000;
    let summary = {
        let guard = session.lock();
        format!(
            "session {} interrupted: {}\nmessage_stops={} tool_calls={} errors={}\n",
            guard.session_id,
            reason.as_deref().unwrap_or("interrupted"),
            guard.progress.message_stops,
            guard.progress.tool_calls,
            guard.progress.errors,
        )
    };
    let category = format!("interrupt-{epoch}");
    if let Err(e) = shared.crash.preserve(&session.lock(), agent_id, &category, &summary) {
        tracing::warn!(agent_id = %agent_id, error = %e, "failed to preserve interrupted context");
    }

    if wait {
        let resumed = crate::resume::wait_for_resume(&shared.interrupt, shared.config.interrupt_check_interval, &shared.shutdown).await;
        if !resumed {
            tracing::info!(agent_id = %agent_id, "shutdown requested while awaiting interrupt resolution");
        }
    }
    Ok(())
}

async fn handle_spawn_failure<C: Clock>(shared: &Shared<C>) -> Result<(), CoordinatorError> {
    let count = shared.failures.increment()?;
    if count >= shared.config.max_consecutive_failures {
        shared.interrupt.assert("too many consecutive spawn failures")?;
    }
    sleep_or_shutdown(&shared.shutdown, harness_health::backoff_for(count)).await;
    Ok(())
}

fn finish_session<C: Clock>(shared: &Shared<C>, agent_id: &AgentId, session: &Arc<Mutex<Session>>) -> Result<(), CoordinatorError> {
    let guard = session.lock();
    let record = metrics::extract(&guard, &shared.layout, shared.clock.epoch_ms());
    shared.metrics_store.write(&guard.session_id, &record)?;
    shared.sessions.archive(&guard)?;
    shared.sessions.write_agent_status(agent_id, &guard)?;
    if guard.status == SessionStatus::Completed {
        shared.queue.complete(&guard.work.id)?;
    } else {
        shared.queue.release(&guard.work.id)?;
    }
    Ok(())
}

/// Pool maintenance (§4.8): at a slow cadence, re-run the same
/// orphan check startup does, catching a slot whose worker task died
/// (panicked, or its `AgentId`'s pid disappeared between iterations)
/// without restarting the whole Coordinator process. Also sweeps
/// `state/claims/*` for claims whose owning agent's heartbeat has
/// aged past `claim_timeout` — a slot can hold a claim past the point
/// where anything is still alive to finish it, and nothing else ever
/// releases those.
async fn maintain_pool<C: Clock>(shared: Shared<C>, slots: Vec<AgentId>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(shared.config.pool_maintenance_interval) => {}
            _ = shared.shutdown.cancelled() => return,
        }
        for agent_id in &slots {
            if let Err(e) = recover_slot(&shared, agent_id) {
                tracing::warn!(agent_id = %agent_id, error = %e, "pool maintenance recovery check failed");
            }
        }
        if let Err(e) = sweep_stale_claims(&shared) {
            tracing::warn!(error = %e, "pool maintenance claim sweep failed");
        }
    }
}

/// Release any claim whose owning agent's heartbeat mtime is older
/// than `claim_timeout`, or whose agent never wrote a heartbeat at
/// all (a crash before the first health check).
fn sweep_stale_claims<C: Clock>(shared: &Shared<C>) -> Result<(), CoordinatorError> {
    for (work_id, agent_id) in shared.queue.claimed_pairs()? {
        let mtime = shared.files.heartbeat_mtime(&agent_id)?;
        let stale = match mtime {
            Some(mtime) => mtime.elapsed().unwrap_or_default() > shared.config.claim_timeout,
            None => true,
        };
        if stale {
            tracing::warn!(agent_id = %agent_id, work_id = %work_id, "releasing claim stale past claim_timeout");
            shared.queue.release(&work_id)?;
        }
    }
    Ok(())
}

async fn sleep_or_shutdown(shutdown: &CancellationToken, duration: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.cancelled() => {}
    }
}

#[cfg(test)]
#[path = "parallel_tests.rs"]
mod tests;
