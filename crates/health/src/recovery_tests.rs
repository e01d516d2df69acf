// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::{FakeClock, HeartbeatState, LogPaths, ProgressState, SessionId, SessionWork, WorkItem};
use serde_json::json;
use tempfile::tempdir;

fn running_session(start_epoch: u64) -> Session {
    let work = WorkItem::new(0, 0, json!({}));
    Session {
        session_id: SessionId::new("ses_test"),
        started_at: "2026-01-01T00:00:00Z".into(),
        start_epoch,
        status: SessionStatus::Running,
        ended_at: None,
        exit_code: None,
        pid: Some(0),
        work: SessionWork { id: work.id, details: work.details },
        heartbeat: HeartbeatState::default(),
        progress: ProgressState::default(),
        log_paths: LogPaths { stdout: "o".into(), stderr: "e".into(), transcript: "t".into() },
        status_reason: None,
        status_updated_at: "2026-01-01T00:00:00Z".into(),
    }
}

fn recovery(base: &std::path::Path, clock: FakeClock, config: HealthConfig) -> HealthRecovery<FakeClock> {
    HealthRecovery::new(StateLayout::new(base), clock, config, false)
}

#[tokio::test]
async fn healthy_pid_leaves_session_untouched() {
    let base = tempdir().unwrap();
    let files = AgentFiles::new(StateLayout::new(base.path()));
    let agent_id = AgentId::new();
    let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    files.write_pid(&agent_id, child.id()).unwrap();

    let session = Arc::new(Mutex::new(running_session(0)));
    let clock = FakeClock::new();
    clock.set_epoch_ms(500);
    let recovery = recovery(base.path(), clock, HealthConfig::default());

    let became_terminal = recovery.check(&agent_id, &session).await.unwrap();

    assert!(!became_terminal);
    assert_eq!(session.lock().status, SessionStatus::Running);

    let mut child = child;
    let _ = child.kill();
}

#[tokio::test]
async fn clean_exit_marks_completed_and_resets_failure_counter() {
    let base = tempdir().unwrap();
    let files = AgentFiles::new(StateLayout::new(base.path()));
    let layout = StateLayout::new(base.path());
    let agent_id = AgentId::new();
    files.write_exit(&agent_id, 0).unwrap();
    FailureCounter::new(layout.clone()).increment().unwrap();

    let session = Arc::new(Mutex::new(running_session(0)));
    let recovery = recovery(base.path(), FakeClock::new(), HealthConfig::default());

    let became_terminal = recovery.check(&agent_id, &session).await.unwrap();

    assert!(became_terminal);
    assert_eq!(session.lock().status, SessionStatus::Completed);
    assert_eq!(FailureCounter::new(layout).read().unwrap(), 0);
}

#[tokio::test]
async fn nonzero_exit_marks_failed_and_increments_counter() {
    let base = tempdir().unwrap();
    let files = AgentFiles::new(StateLayout::new(base.path()));
    let layout = StateLayout::new(base.path());
    let agent_id = AgentId::new();
    files.write_exit(&agent_id, 42).unwrap();

    let session = Arc::new(Mutex::new(running_session(0)));
    let recovery = recovery(base.path(), FakeClock::new(), HealthConfig::default());

    let became_terminal = recovery.check(&agent_id, &session).await.unwrap();

    assert!(became_terminal);
    let guard = session.lock();
    assert_eq!(guard.status, SessionStatus::Failed);
    assert_eq!(guard.status_reason.as_deref(), Some("exit 42"));
    drop(guard);
    assert_eq!(FailureCounter::new(layout).read().unwrap(), 1);
}

#[tokio::test]
async fn error_marker_kills_agent_and_clears_marker() {
    let base = tempdir().unwrap();
    let files = AgentFiles::new(StateLayout::new(base.path()));
    let agent_id = AgentId::new();
    let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    files.write_pid(&agent_id, child.id()).unwrap();
    std::fs::create_dir_all(StateLayout::new(base.path()).agent_dir(&agent_id)).unwrap();
    std::fs::write(StateLayout::new(base.path()).agent_error_path(&agent_id), "gpu oom").unwrap();

    let session = Arc::new(Mutex::new(running_session(0)));
    let config = HealthConfig { kill_grace_period: std::time::Duration::from_millis(500), ..HealthConfig::default() };
    let recovery = recovery(base.path(), FakeClock::new(), config);

    let became_terminal = recovery.check(&agent_id, &session).await.unwrap();

    assert!(became_terminal);
    let guard = session.lock();
    assert_eq!(guard.status, SessionStatus::Failed);
    assert_eq!(guard.status_reason.as_deref(), Some("gpu oom"));
    drop(guard);
    assert_eq!(files.read_error_marker(&agent_id).unwrap(), None);
    assert!(!pid_is_alive(child.id()));
}

#[tokio::test]
async fn consecutive_failures_assert_the_interrupt_gate_at_threshold() {
    let base = tempdir().unwrap();
    let files = AgentFiles::new(StateLayout::new(base.path()));
    let layout = StateLayout::new(base.path());
    let config = HealthConfig { max_consecutive_failures: 2, ..HealthConfig::default() };
    let gate = InterruptGate::new(layout.clone());

    for i in 0..2 {
        let agent_id = AgentId::new();
        files.write_exit(&agent_id, 1).unwrap();
        let session = Arc::new(Mutex::new(running_session(0)));
        let recovery = recovery(base.path(), FakeClock::new(), config.clone());
        recovery.check(&agent_id, &session).await.unwrap();
        if i == 0 {
            assert!(!gate.is_asserted());
        }
    }

    assert!(gate.is_asserted());
    assert_eq!(gate.reason().unwrap().as_deref(), Some("too many consecutive failures"));
}
