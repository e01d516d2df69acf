// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context preservation on interrupt or crash (§4.6). Best-effort: a
//! missing artifact (e.g. no transcript yet) is skipped, never an
//! error, matching the teacher's snapshot module's tolerance for a
//! partially-populated state tree.

use crate::atomic::write_atomic;
use crate::error::StoreError;
use crate::layout::StateLayout;
use harness_core::{AgentId, Session};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CrashPreserver {
    layout: StateLayout,
}

impl CrashPreserver {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    /// Copy the session record, its logs, and a human-readable summary
    /// into `docs/sessions/<agent_id>/<category>/`, returning that
    /// directory. `category` is `crash-<epoch>` or `interrupt-<epoch>`.
    pub fn preserve(
        &self,
        session: &Session,
        agent_id: &AgentId,
        category: &str,
        summary: &str,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.layout.crash_dir(agent_id, category);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(dir.display().to_string(), e))?;

        crate::atomic::write_json_atomic(&dir.join("session.json"), session)?;
        write_atomic(&dir.join("summary.txt"), summary.as_bytes())?;

        copy_if_present(&self.layout.events_log_path(&session.session_id), &dir.join("events.jsonl"));
        copy_if_present(&self.layout.errors_log_path(&session.session_id), &dir.join("errors.jsonl"));
        copy_if_present(&self.layout.docs_stdout_path(&session.session_id), &dir.join("stdout.log"));
        copy_if_present(&self.layout.docs_stderr_path(&session.session_id), &dir.join("stderr.log"));

        Ok(dir)
    }
}

fn copy_if_present(src: &std::path::Path, dst: &std::path::Path) {
    if src.exists() {
        if let Err(e) = fs::copy(src, dst) {
            tracing::warn!(src = %src.display(), error = %e, "failed to preserve artifact");
        }
    }
}

#[cfg(test)]
#[path = "crash_tests.rs"]
mod tests;
