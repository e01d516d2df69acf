// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree isolation for the parallel variant (§4.2 step 4). Each
//! agent slot gets a dedicated worktree at a deterministic path so two
//! workers never touch the same checkout.

use crate::error::SpawnError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(60);

/// Create a worktree at `path`, branching `branch` from `start_point`
/// inside `repo_root`, and give it its own `user.name`/`user.email`
/// derived from `agent_id` so commits made inside this worktree never
/// share an identity with any other slot. Concurrent-safe: `git
/// worktree add` takes its own lock on the repo's worktree list, so two
/// slots racing on distinct paths and branches never corrupt each
/// other.
pub async fn create(repo_root: &Path, path: &Path, branch: &str, start_point: &str, agent_id: &str) -> Result<(), SpawnError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SpawnError::worktree(path, e.to_string()))?;
    }

    let mut cmd = Command::new("git");
    cmd.args(["-C", &repo_root.display().to_string(), "worktree", "add", "-b", branch])
        .arg(path)
        .arg(start_point)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");

    let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpawnError::worktree(path, stderr.trim().to_string()));
    }

    // Per-worktree config requires the repo to opt into it; enabling it
    // is idempotent, so just always ask for it before writing identity.
    run_git(repo_root, &["config", "extensions.worktreeConfig", "true"]).await?;
    run_git(path, &["config", "--worktree", "user.name", agent_id]).await?;
    run_git(path, &["config", "--worktree", "user.email", &format!("{agent_id}@harness.local")]).await?;
    Ok(())
}

async fn run_git(cwd: &Path, args: &[&str]) -> Result<(), SpawnError> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(cwd).args(args);
    let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpawnError::worktree(cwd, stderr.trim().to_string()));
    }
    Ok(())
}

/// Best-effort teardown: unregister the worktree, then remove whatever
/// directory remains. Never fails the caller — cleanup runs on crash
/// paths where the repo may already be half gone.
pub async fn remove(path: &Path) {
    let dot_git = path.join(".git");
    if tokio::fs::try_exists(&dot_git).await.unwrap_or(false) {
        let mut cmd = Command::new("git");
        cmd.args(["worktree", "remove", "--force"]).arg(path).current_dir(path);
        if let Err(e) = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT).await {
            tracing::warn!(path = %path.display(), error = %e, "git worktree remove failed");
        }
    }

    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_dir_all(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove worktree directory");
        }
    }
}

async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<std::process::Output, SpawnError> {
    let child = cmd
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| SpawnError::Io(e.to_string()))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| SpawnError::Io(e.to_string())),
        Err(_) => Err(SpawnError::Io(format!("git command timed out after {timeout:?}"))),
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
