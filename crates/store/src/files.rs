// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pid, exit-code, and heartbeat files for one agent slot.
//!
//! Liveness uses `kill(pid, None)` (no signal sent, just an ESRCH
//! check), the same idiom the teacher's PTY child cleanup relies on
//! (`adapters/agent/coop/...PtyProcess::drop`), generalized from
//! "kill on drop" to "probe without killing."

use crate::atomic::{append_line, read_string_opt, write_atomic};
use crate::error::StoreError;
use crate::layout::StateLayout;
use harness_core::AgentId;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct AgentFiles {
    layout: StateLayout,
}

impl AgentFiles {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn write_pid(&self, agent_id: &AgentId, pid: u32) -> Result<(), StoreError> {
        write_atomic(&self.layout.agent_pid_path(agent_id), pid.to_string().as_bytes())
    }

    pub fn read_pid(&self, agent_id: &AgentId) -> Result<Option<u32>, StoreError> {
        let raw = read_string_opt(&self.layout.agent_pid_path(agent_id))?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    pub fn write_exit(&self, agent_id: &AgentId, code: i32) -> Result<(), StoreError> {
        write_atomic(&self.layout.agent_exit_path(agent_id), code.to_string().as_bytes())
    }

    pub fn read_exit(&self, agent_id: &AgentId) -> Result<Option<i32>, StoreError> {
        let raw = read_string_opt(&self.layout.agent_exit_path(agent_id))?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    pub fn write_heartbeat(&self, agent_id: &AgentId, iso_timestamp: &str) -> Result<(), StoreError> {
        write_atomic(&self.layout.agent_heartbeat_path(agent_id), iso_timestamp.as_bytes())
    }

    pub fn read_heartbeat(&self, agent_id: &AgentId) -> Result<Option<String>, StoreError> {
        read_string_opt(&self.layout.agent_heartbeat_path(agent_id))
    }

    /// The heartbeat file's mtime, authoritative for liveness age per
    /// §3 ("its *mtime* is authoritative for liveness"). `None` if the
    /// heartbeat hasn't been written yet.
    pub fn heartbeat_mtime(&self, agent_id: &AgentId) -> Result<Option<SystemTime>, StoreError> {
        file_mtime(&self.layout.agent_heartbeat_path(agent_id))
    }

    pub fn append_iteration_log(&self, line: &str) -> Result<(), StoreError> {
        append_line(&self.layout.iteration_log_path(), line)
    }

    /// §4.4 check 2: a well-known error file short-circuits the normal
    /// liveness/timeout/stall ordering when present.
    pub fn read_error_marker(&self, agent_id: &AgentId) -> Result<Option<String>, StoreError> {
        read_string_opt(&self.layout.agent_error_path(agent_id))
    }

    pub fn clear_error_marker(&self, agent_id: &AgentId) -> Result<(), StoreError> {
        match fs::remove_file(self.layout.agent_error_path(agent_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(self.layout.agent_error_path(agent_id).display().to_string(), e)),
        }
    }
}

fn file_mtime(path: &Path) -> Result<Option<SystemTime>, StoreError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(
            meta.modified().map_err(|e| StoreError::io(path.display().to_string(), e))?,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path.display().to_string(), e)),
    }
}

/// Returns `true` if a process with this pid exists and is signalable
/// by us. Sends no signal (`kill(pid, None)`); a dead or reparented pid
/// reports `false`.
pub fn pid_is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
