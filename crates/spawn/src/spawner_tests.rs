// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::{AgentId, FakeClock, SessionStatus, WorkItem};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use tempfile::tempdir;

/// A stand-in for the `claude` binary: a shell script that immediately
/// exits 0 without producing output, just enough to exercise the spawn
/// sequence's process-handling without depending on a real LLM CLI.
fn fake_binary(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("fake-claude.sh");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn config(base: &std::path::Path) -> SpawnerConfig {
    SpawnerConfig {
        binary: fake_binary(base),
        repo_root: base.to_path_buf(),
        workers_root: None,
        bootstrap_template: "session {{SESSION_ID}} iteration {{ITERATION}} rig {{RIG}}".into(),
        initial_prompt: "consult your session context".into(),
        tool_allowlist: vec!["fs".into()],
        max_turns: Some(10),
        budget_cents: None,
        rig: "test-rig".into(),
    }
}

#[tokio::test]
async fn spawn_writes_running_session_with_pid() {
    let base = tempdir().unwrap();
    let layout = StateLayout::new(base.path());
    let clock = FakeClock::new();
    let spawner = AgentSpawner::new(config(base.path()), layout.clone(), clock);
    let agent_id = AgentId::new();
    let work = WorkItem::new(0, 0, json!({"issue": 7}));

    let mut spawned = spawner.spawn(&agent_id, &work, 1, false).await.unwrap();
    let exit = spawned.child.wait().await.unwrap();
    assert!(exit.success());

    assert_eq!(spawned.session.status, SessionStatus::Running);
    assert!(spawned.session.pid.is_some());

    let sessions = SessionStore::new(layout);
    let current = sessions.read_current().unwrap().unwrap();
    assert_eq!(current.session_id, spawned.session.session_id);
    assert_eq!(current.status, SessionStatus::Running);
}

#[tokio::test]
async fn spawn_renders_bootstrap_placeholders_into_temp_file() {
    let base = tempdir().unwrap();
    let layout = StateLayout::new(base.path());
    let clock = FakeClock::new();
    let spawner = AgentSpawner::new(config(base.path()), layout, clock);
    let agent_id = AgentId::new();
    let work = WorkItem::new(0, 0, json!({}));

    let spawned = spawner.spawn(&agent_id, &work, 3, false).await.unwrap();
    let bootstrap_path = bootstrap_temp_path(&base.path().join("state"), &spawned.session.session_id);
    let contents = std::fs::read_to_string(bootstrap_path).unwrap();

    assert!(contents.contains(&spawned.session.session_id.as_str().to_string()));
    assert!(contents.contains("iteration 3"));
    assert!(contents.contains("rig test-rig"));
}

#[tokio::test]
async fn spawn_in_parallel_mode_writes_agent_status_slot() {
    let base = tempdir().unwrap();
    let layout = StateLayout::new(base.path());
    let clock = FakeClock::new();
    let mut cfg = config(base.path());
    cfg.workers_root = Some(base.path().join("workers"));
    let spawner = AgentSpawner::new(cfg, layout.clone(), clock);
    let agent_id = AgentId::new();
    let work = WorkItem::new(0, 0, json!({}));

    // repo_root must itself be a git repo for worktree creation.
    let status = std::process::Command::new("git")
        .args(["init", "-q", "-b", "main"])
        .current_dir(base.path())
        .status()
        .unwrap();
    assert!(status.success());
    std::fs::write(base.path().join("README.md"), "seed\n").unwrap();
    for args in [vec!["add", "."], vec!["-c", "user.email=t@test", "-c", "user.name=t", "commit", "-q", "-m", "seed"]] {
        std::process::Command::new("git").args(&args).current_dir(base.path()).status().unwrap();
    }

    let spawned = spawner.spawn(&agent_id, &work, 1, true).await.unwrap();
    assert_eq!(spawned.session.status, SessionStatus::Running);

    let sessions = SessionStore::new(layout);
    let status = sessions.read_agent_status(&agent_id).unwrap().unwrap();
    assert_eq!(status.session_id, spawned.session.session_id);
    assert!(base.path().join("workers").join(agent_id.as_str()).join(".git").exists());
}
