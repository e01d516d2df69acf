// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Agent Spawner (C3): materializes a worker's environment,
//! launches the child process, and records the facts Health & Recovery
//! and the Stream Monitor need. Follows §4.2's eight-step sequence.
//!
//! The Spawner does not start the Stream Monitor itself (step 7); it
//! hands the caller a live [`Child`] with piped stdout/stderr, which the
//! Coordinator attaches to a Monitor task. Keeping that wiring outside
//! this crate avoids a `harness-spawn -> harness-monitor` dependency
//! neither component otherwise needs.

use crate::error::SpawnError;
use crate::invocation::{bootstrap_temp_path, InvocationSpec};
use crate::template;
use harness_core::{
    AgentId, Clock, HeartbeatState, LogPaths, ProgressState, Session, SessionId, SessionStatus, SessionWork, WorkItem,
};
use harness_store::{AgentFiles, SessionStore, StateLayout};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Child;

/// Everything the Spawner needs that doesn't vary per call.
#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    pub binary: PathBuf,
    pub repo_root: PathBuf,
    /// `Some` enables worktree isolation (the parallel variant);
    /// `None` runs the child directly in `repo_root` (serial variant).
    pub workers_root: Option<PathBuf>,
    pub bootstrap_template: String,
    pub initial_prompt: String,
    pub tool_allowlist: Vec<String>,
    pub max_turns: Option<u32>,
    pub budget_cents: Option<u64>,
    pub rig: String,
}

/// Result of a successful spawn: the durable session record plus the
/// live child handle for the caller to wire into monitoring.
pub struct SpawnedAgent {
    pub session: Session,
    pub child: Child,
}

#[derive(Clone)]
pub struct AgentSpawner<C: Clock> {
    config: SpawnerConfig,
    layout: StateLayout,
    sessions: SessionStore,
    files: AgentFiles,
    clock: C,
}

impl<C: Clock> AgentSpawner<C> {
    pub fn new(config: SpawnerConfig, layout: StateLayout, clock: C) -> Self {
        let sessions = SessionStore::new(layout.clone());
        let files = AgentFiles::new(layout.clone());
        Self { config, layout, sessions, files, clock }
    }

    /// Run the spawn sequence for one work item on `agent_id`.
    /// `iteration` feeds the `{{ITERATION}}` placeholder; `parallel`
    /// selects whether the session record is published as the single
    /// "current session" or to the agent's own status slot.
    pub async fn spawn(
        &self,
        agent_id: &AgentId,
        work: &WorkItem,
        iteration: u64,
        parallel: bool,
    ) -> Result<SpawnedAgent, SpawnError> {
        let session_id = SessionId::generate();
        let now_iso = iso_now(&self.clock);
        let start_epoch = self.clock.epoch_ms() / 1000;

        let worktree_path = if parallel {
            let root = self.config.workers_root.as_ref().cloned().unwrap_or_else(|| self.config.repo_root.clone());
            let path = root.join(agent_id.as_str());
            let branch = format!("agent/{}", agent_id.as_str());
            crate::worktree::create(&self.config.repo_root, &path, &branch, "HEAD", agent_id.as_str()).await?;
            Some(path)
        } else {
            None
        };
        let cwd = worktree_path.clone().unwrap_or_else(|| self.config.repo_root.clone());

        let bootstrap_path = bootstrap_temp_path(&self.layout.state_dir(), &session_id);
        let rendered = self.render_bootstrap(&session_id, work, iteration);
        if let Err(e) = tokio::fs::create_dir_all(self.layout.state_dir()).await {
            return Err(SpawnError::Io(e.to_string()));
        }
        if let Err(e) = tokio::fs::write(&bootstrap_path, rendered).await {
            if let Some(path) = &worktree_path {
                crate::worktree::remove(path).await;
            }
            return Err(SpawnError::Io(e.to_string()));
        }

        let mut session = Session {
            session_id: session_id.clone(),
            started_at: now_iso.clone(),
            start_epoch,
            status: SessionStatus::Spawning,
            ended_at: None,
            exit_code: None,
            pid: None,
            work: SessionWork { id: work.id, details: work.details.clone() },
            heartbeat: HeartbeatState::default(),
            progress: ProgressState::default(),
            log_paths: LogPaths {
                stdout: self.layout.docs_stdout_path(&session_id).display().to_string(),
                stderr: self.layout.docs_stderr_path(&session_id).display().to_string(),
                transcript: cwd.join(".claude-transcript.jsonl").display().to_string(),
            },
            status_reason: None,
            status_updated_at: now_iso.clone(),
        };
        self.write_session(agent_id, &session, parallel)?;

        let invocation = InvocationSpec {
            binary: self.config.binary.clone(),
            cwd,
            bootstrap_path,
            initial_prompt: self.config.initial_prompt.clone(),
            session_id: session_id.clone(),
            tool_allowlist: self.config.tool_allowlist.clone(),
            max_turns: self.config.max_turns,
            budget_cents: self.config.budget_cents,
        };

        let child = match invocation.spawn() {
            Ok(child) => child,
            Err(e) => {
                if let Some(path) = &worktree_path {
                    crate::worktree::remove(path).await;
                }
                return Err(SpawnError::Launch(e.to_string()));
            }
        };

        if let Some(pid) = child.id() {
            self.files.write_pid(agent_id, pid)?;
            session.pid = Some(pid);
        }
        session
            .transition(SessionStatus::Running, None, iso_now(&self.clock))
            .unwrap_or_else(|e| tracing::warn!(error = %e, "unreachable spawn transition rejected"));
        self.write_session(agent_id, &session, parallel)?;

        Ok(SpawnedAgent { session, child })
    }

    fn write_session(&self, agent_id: &AgentId, session: &Session, parallel: bool) -> Result<(), SpawnError> {
        if parallel {
            self.sessions.write_agent_status(agent_id, session)?;
        } else {
            self.sessions.write_current(session)?;
        }
        Ok(())
    }

    fn render_bootstrap(&self, session_id: &SessionId, work: &WorkItem, iteration: u64) -> String {
        let mut vars = HashMap::new();
        vars.insert("SESSION_ID".to_string(), session_id.as_str().to_string());
        vars.insert("ITERATION".to_string(), iteration.to_string());
        vars.insert("WORK_ITEM".to_string(), work.details.to_string());
        vars.insert("RIG".to_string(), self.config.rig.clone());
        template::render(&self.config.bootstrap_template, &vars)
    }
}

fn iso_now<C: Clock>(clock: &C) -> String {
    harness_core::time_fmt::iso_from_epoch_ms(clock.epoch_ms())
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
