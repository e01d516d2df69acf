// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Coordinator (C6), serial variant (§4.5). Owns one main loop:
//! queue check, spawn, a cadenced inner monitor loop that runs Health &
//! Recovery and polls the interrupt gate, completion detection, metrics
//! extraction, and archival. Grounded in `daemon/src/lifecycle/startup.rs`'s
//! orphan reconciliation shape, reduced from WAL replay to the plain-file
//! reconciliation this harness's simpler state layout calls for.

use crate::config::Config;
use crate::error::CoordinatorError;
use crate::metrics;
use crate::resume::wait_for_resume;
use harness_core::{AgentId, Clock, Session, SessionStatus, WorkItem};
use harness_health::{HealthConfig, HealthRecovery};
use harness_monitor::{MonitorConfig, StreamMonitor};
use harness_queue::QueueAdapter;
use harness_spawn::{AgentSpawner, SpawnedAgent, SpawnerConfig};
use harness_store::{AgentFiles, CrashPreserver, FailureCounter, InterruptGate, MetricsStore, SessionLog, SessionStore, StateLayout};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SerialCoordinator<C: Clock> {
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
    clock: C,
    config: Config,
    shutdown: CancellationToken,
}

impl<C: Clock> SerialCoordinator<C> {
    pub fn new(config: Config, clock: C, shutdown: CancellationToken) -> Self {
        let layout = StateLayout::new(config.state_dir.clone());
        let spawner_config = SpawnerConfig {
            binary: config.agent_binary.clone(),
            repo_root: config.repo_root.clone(),
            workers_root: None,
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
        Self {
            queue: QueueAdapter::new(config.state_dir.clone()),
            sessions: SessionStore::new(layout.clone()),
            files: AgentFiles::new(layout.clone()),
            interrupt: InterruptGate::new(layout.clone()),
            failures: FailureCounter::new(layout.clone()),
            crash: CrashPreserver::new(layout.clone()),
            metrics_store: MetricsStore::new(layout.clone()),
            spawner: AgentSpawner::new(spawner_config, layout.clone(), clock.clone()),
            health: HealthRecovery::new(layout.clone(), clock.clone(), health_config, false),
            layout,
            clock,
            config,
            shutdown,
        }
    }

    /// §4.5 steps 1–9, looped until `max_iterations` is reached or the
    /// process is asked to shut down.
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        self.init()?;

        let mut iteration: u64 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if self.interrupt.is_asserted() {
                if !wait_for_resume(&self.interrupt, self.config.interrupt_check_interval, &self.shutdown).await {
                    break;
                }
                continue;
            }

            match self.queue.next()? {
                None => {
                    self.sleep_or_shutdown(self.config.iteration_delay).await;
                }
                Some(work) => {
                    let agent_id = AgentId::new();
                    match self.queue.claim(&work.id, &agent_id) {
                        Ok(()) => self.run_one_session(&agent_id, &work, iteration).await?,
                        Err(e) => {
                            tracing::warn!(work_id = %work.id, error = %e, "claim lost the race, retrying next tick");
                        }
                    }
                }
            }

            iteration += 1;
            if self.config.max_iterations > 0 && iteration >= self.config.max_iterations {
                break;
            }
        }
        Ok(())
    }

    fn init(&self) -> Result<(), CoordinatorError> {
        std::fs::create_dir_all(self.layout.state_dir())
            .map_err(|e| CoordinatorError::Startup(format!("cannot create state dir: {e}")))?;
        self.interrupt.clear()?;
        self.failures.reset()?;
        self.queue.check()?;
        Ok(())
    }

    async fn run_one_session(&self, agent_id: &AgentId, work: &WorkItem, iteration: u64) -> Result<(), CoordinatorError> {
        let spawned = match self.spawner.spawn(agent_id, work, iteration, false).await {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::error!(agent_id = %agent_id, error = %e, "agent spawn failed");
                let _ = self.queue.release(&work.id);
                self.handle_spawn_failure().await?;
                return Ok(());
            }
        };
        self.failures.reset()?;
        let SpawnedAgent { session, mut child } = spawned;
        let session_id = session.session_id.clone();
        let session = Arc::new(Mutex::new(session));

        let stdout = child.stdout.take().expect("spawner pipes stdout");
        let stderr = child.stderr.take().expect("spawner pipes stderr");

        let monitor_cancel = CancellationToken::new();
        let monitor = StreamMonitor::new(
            *agent_id,
            Arc::clone(&session),
            self.sessions.clone(),
            self.files.clone(),
            SessionLog::new(self.layout.clone(), session_id.clone()),
            PathBuf::from(session.lock().log_paths.transcript.clone()),
            PathBuf::from(session.lock().log_paths.stdout.clone()),
            PathBuf::from(session.lock().log_paths.stderr.clone()),
            self.clock.clone(),
            MonitorConfig::default(),
            false,
        );
        let monitor_token = monitor_cancel.clone();
        let monitor_task = tokio::spawn(async move {
            if let Err(e) = monitor.run(stdout, stderr, monitor_token).await {
                tracing::warn!(error = %e, "stream monitor exited with an error");
            }
        });

        let files = self.files.clone();
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

        self.supervise(agent_id, &session, &monitor_cancel).await?;

        let _ = waiter.await;
        let _ = monitor_task.await;

        self.finish_session(&session)?;
        Ok(())
    }

    /// The tight inner loop of §4.5 step 4: cadenced health checks plus
    /// an interrupt-gate poll, until the session goes terminal one way
    /// or another.
    async fn supervise(
        &self,
        agent_id: &AgentId,
        session: &Arc<Mutex<Session>>,
        monitor_cancel: &CancellationToken,
    ) -> Result<(), CoordinatorError> {
        loop {
            self.sleep_or_shutdown(self.config.interrupt_check_interval).await;

            if self.health.check(agent_id, session).await? {
                break;
            }
            if self.interrupt.is_asserted() {
                self.interrupt_session(agent_id, session, true).await?;
                break;
            }
            if self.shutdown.is_cancelled() {
                self.interrupt_session(agent_id, session, false).await?;
                break;
            }
        }
        monitor_cancel.cancel();
        Ok(())
    }

    /// Kill the agent gracefully, mark it `interrupted`, and preserve
    /// its context (§4.6). `wait` selects whether to then block in
    /// `wait_for_resume` (the interrupt-gate case) or return
    /// immediately (the `SIGTERM`-drain case, §4.5's signal policy).
    async fn interrupt_session(&self, agent_id: &AgentId, session: &Arc<Mutex<Session>>, wait: bool) -> Result<(), CoordinatorError> {
        if let Some(pid) = self.files.read_pid(agent_id)? {
            harness_health::kill::kill(pid, self.config.kill_grace_period).await;
        }

        let reason = self.interrupt.reason()?.or_else(|| Some("sigterm received".to_string()));
        let now_iso = iso_now(&self.clock);
        {
            let mut guard = session.lock();
            if let Err(e) = guard.transition(SessionStatus::Interrupted, reason.clone(), now_iso) {
                tracing::warn!(agent_id = %agent_id, error = %e, "illegal interrupted transition dropped");
            }
        }
        self.persist(&session.lock())?;

        let epoch = self.clock.epoch_ms() / 1000;
        let summary = {
            let guard = session.lock();
            build_summary(&guard, reason.as_deref().unwrap_or("interrupted"))
        };
        let category = format!("interrupt-{epoch}");
        if let Err(e) = self.crash.preserve(&session.lock(), agent_id, &category, &summary) {
            tracing::warn!(agent_id = %agent_id, error = %e, "failed to preserve interrupted context");
        }

        // The agent is already dead; "resuming" means unblocking the
        // Coordinator's main loop to pick up the next work item, not
        // reviving this session. It archives as `interrupted`.
        if wait {
            let resumed = wait_for_resume(&self.interrupt, self.config.interrupt_check_interval, &self.shutdown).await;
            if !resumed {
                tracing::info!(agent_id = %agent_id, "shutdown requested while awaiting interrupt resolution");
            }
        }
        Ok(())
    }

    async fn handle_spawn_failure(&self) -> Result<(), CoordinatorError> {
        let count = self.failures.increment()?;
        if count >= self.config.max_consecutive_failures {
            self.interrupt.assert("too many consecutive spawn failures")?;
        }
        self.sleep_or_shutdown(harness_health::backoff_for(count)).await;
        Ok(())
    }

    /// §4.5 steps 5–8: metrics extraction, archival, and clearing the
    /// current-session pointer. Completion/failure detection itself
    /// already happened inside `supervise` via Health & Recovery.
    fn finish_session(&self, session: &Arc<Mutex<Session>>) -> Result<(), CoordinatorError> {
        let guard = session.lock();
        let record = metrics::extract(&guard, &self.layout, self.clock.epoch_ms());
        self.metrics_store.write(&guard.session_id, &record)?;
        self.sessions.archive(&guard)?;
        // Completed work is done for good; anything else goes back to
        // the queue unclaimed so a later iteration can retry it.
        if guard.status == SessionStatus::Completed {
            self.queue.complete(&guard.work.id)?;
        } else {
            self.queue.release(&guard.work.id)?;
        }
        drop(guard);
        self.sessions.clear_current()?;
        Ok(())
    }

    fn persist(&self, session: &Session) -> Result<(), CoordinatorError> {
        self.sessions.write_current(session)?;
        Ok(())
    }

    async fn sleep_or_shutdown(&self, duration: std::time::Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }
}

fn iso_now<C: Clock>(clock: &C) -> String {
    harness_core::time_fmt::iso_from_epoch_ms(clock.epoch_ms())
}

fn build_summary(session: &Session, reason: &str) -> String {
    format!(
        "session {} interrupted: {reason}\nmessage_stops={} tool_calls={} errors={}\nresume: remove state/interrupt-request.txt and restart ojh\n",
        session.session_id, session.progress.message_stops, session.progress.tool_calls, session.progress.errors,
    )
}

#[cfg(test)]
#[path = "serial_tests.rs"]
mod tests;
