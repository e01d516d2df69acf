// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path layout for the stable on-disk state tree (§6.4). One
//! `StateLayout` is constructed per process from a single base
//! directory; every artifact path is derived from it so no other part
//! of the harness ever hardcodes a path literal.
//!
//! `queue/` and `claims/` are deliberately absent here — the Work Queue
//! Adapter (`harness-queue`) owns those paths exclusively.

use harness_core::{AgentId, SessionId};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StateLayout {
    base: PathBuf,
}

impl StateLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn state(&self) -> PathBuf {
        self.base.join("state")
    }

    /// The `state/` root itself, for callers that stage ephemeral files
    /// (e.g. a per-session bootstrap prompt) without a dedicated
    /// accessor of their own.
    pub fn state_dir(&self) -> PathBuf {
        self.state()
    }

    fn docs_sessions(&self) -> PathBuf {
        self.base.join("docs").join("sessions")
    }

    pub fn current_session_path(&self) -> PathBuf {
        self.state().join("current-session.json")
    }

    pub fn agent_dir(&self, agent_id: &AgentId) -> PathBuf {
        self.state().join("agents").join(agent_id.as_str())
    }

    pub fn agent_status_path(&self, agent_id: &AgentId) -> PathBuf {
        self.agent_dir(agent_id).join("status.json")
    }

    pub fn agent_heartbeat_path(&self, agent_id: &AgentId) -> PathBuf {
        self.agent_dir(agent_id).join("heartbeat")
    }

    pub fn agent_pid_path(&self, agent_id: &AgentId) -> PathBuf {
        self.agent_dir(agent_id).join("pid")
    }

    pub fn agent_exit_path(&self, agent_id: &AgentId) -> PathBuf {
        self.agent_dir(agent_id).join("exit")
    }

    /// Explicit error marker (§4.4 check 2): the agent (or a wrapper
    /// script) writes a reason here to short-circuit the normal
    /// liveness/timeout/stall ordering.
    pub fn agent_error_path(&self, agent_id: &AgentId) -> PathBuf {
        self.agent_dir(agent_id).join("error")
    }

    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.state().join("sessions").join(session_id.as_str())
    }

    pub fn events_log_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("events.jsonl")
    }

    pub fn errors_log_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("errors.jsonl")
    }

    pub fn metrics_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("metrics.json")
    }

    pub fn interrupt_request_path(&self) -> PathBuf {
        self.state().join("interrupt-request.txt")
    }

    pub fn failure_count_path(&self) -> PathBuf {
        self.state().join("failure-count")
    }

    /// The parallel variant's persisted slot-id set (§4.8), written once
    /// on first run and read back on every restart so `recover_slot` has
    /// stable ids to look up.
    pub fn slots_path(&self) -> PathBuf {
        self.state().join("slots.json")
    }

    pub fn iteration_log_path(&self) -> PathBuf {
        self.state().join("iteration.log")
    }

    pub fn docs_stdout_path(&self, session_id: &SessionId) -> PathBuf {
        self.docs_sessions().join(format!("{}.log", session_id.as_str()))
    }

    pub fn docs_stderr_path(&self, session_id: &SessionId) -> PathBuf {
        self.docs_sessions().join(format!("{}.err", session_id.as_str()))
    }

    pub fn docs_archive_path(&self, session_id: &SessionId) -> PathBuf {
        self.docs_sessions().join(format!("{}.json", session_id.as_str()))
    }

    /// Preserved-context directory for a crash/interrupt, keyed by
    /// category (`crash-<epoch>` or `interrupt-<epoch>`) per §4.6.
    pub fn crash_dir(&self, agent_id: &AgentId, category: &str) -> PathBuf {
        self.docs_sessions().join(agent_id.as_str()).join(category)
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
