// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process invocation (§4.2 step 5). Built the way
//! `ClaudeCodeRunner::run_turn` builds its `claude` invocation: piped
//! stdout/stderr, stdin closed, a fixed set of non-interactive flags.

use harness_core::SessionId;
use std::path::{Path, PathBuf};
use tokio::process::{Child, Command};

/// Tool names auto-permitted for the child. Destructive tools (e.g. a
/// raw `rm` shell tool) are never included by default; callers opt in
/// explicitly per deployment.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    /// Path to the LLM CLI binary (e.g. `claude`).
    pub binary: PathBuf,
    /// Working directory for the child (repo root or worktree path).
    pub cwd: PathBuf,
    /// Bootstrap file appended as a system prompt.
    pub bootstrap_path: PathBuf,
    /// Fixed initial user prompt directing the agent to its session context.
    pub initial_prompt: String,
    pub session_id: SessionId,
    pub tool_allowlist: Vec<String>,
    pub max_turns: Option<u32>,
    pub budget_cents: Option<u64>,
}

impl InvocationSpec {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.cwd);
        cmd.arg("--output-format").arg("stream-json");
        cmd.arg("-p").arg(&self.initial_prompt);
        cmd.arg("--session-id").arg(self.session_id.as_str());
        cmd.arg("--append-system-prompt-file").arg(&self.bootstrap_path);

        if !self.tool_allowlist.is_empty() {
            cmd.arg("--allowed-tools").arg(self.tool_allowlist.join(","));
        }
        if let Some(max_turns) = self.max_turns {
            cmd.arg("--max-turns").arg(max_turns.to_string());
        }
        if let Some(budget_cents) = self.budget_cents {
            cmd.arg("--max-budget-cents").arg(budget_cents.to_string());
        }

        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd
    }

    /// Spawn the child. Stdout/stderr are piped so the caller can wire
    /// them into a Stream Monitor and the session's raw log files.
    pub fn spawn(&self) -> std::io::Result<Child> {
        self.command().spawn()
    }
}

pub fn bootstrap_temp_path(state_dir: &Path, session_id: &SessionId) -> PathBuf {
    state_dir.join(format!("{}.bootstrap.md", session_id.as_str()))
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
