// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::{HeartbeatState, LogPaths, ProgressState, SessionId, SessionStatus, SessionWork, WorkId};
use serde_json::json;
use tempfile::tempdir;

fn sample_session() -> Session {
    Session {
        session_id: SessionId::new("ses_a"),
        started_at: "2026-07-28T00:00:00Z".into(),
        start_epoch: 1000,
        status: SessionStatus::Interrupted,
        ended_at: Some("2026-07-28T00:05:00Z".into()),
        exit_code: None,
        pid: Some(111),
        work: SessionWork { id: WorkId::new(), details: json!({"issue": 1}) },
        heartbeat: HeartbeatState::default(),
        progress: ProgressState::default(),
        log_paths: LogPaths {
            stdout: "docs/sessions/ses_a.log".into(),
            stderr: "docs/sessions/ses_a.err".into(),
            transcript: "docs/sessions/ses_a.transcript".into(),
        },
        status_reason: Some("human request".into()),
        status_updated_at: "2026-07-28T00:05:00Z".into(),
    }
}

#[test]
fn preserve_writes_session_and_summary() {
    let dir = tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    let preserver = CrashPreserver::new(layout);
    let agent_id = AgentId::new();
    let session = sample_session();

    let out_dir = preserver
        .preserve(&session, &agent_id, "interrupt-1000", "interrupted by human request")
        .unwrap();

    assert!(out_dir.join("session.json").exists());
    let summary = std::fs::read_to_string(out_dir.join("summary.txt")).unwrap();
    assert!(summary.contains("interrupted by human request"));
}

#[test]
fn preserve_skips_missing_logs_without_erroring() {
    let dir = tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    let preserver = CrashPreserver::new(layout);
    let agent_id = AgentId::new();
    let session = sample_session();

    let out_dir = preserver.preserve(&session, &agent_id, "crash-2000", "crash").unwrap();

    assert!(!out_dir.join("events.jsonl").exists());
    assert!(!out_dir.join("stdout.log").exists());
}

#[test]
fn preserve_copies_present_logs() {
    let dir = tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    let session = sample_session();

    std::fs::create_dir_all(layout.events_log_path(&session.session_id).parent().unwrap()).unwrap();
    std::fs::write(layout.events_log_path(&session.session_id), "{\"type\":\"message_start\"}\n").unwrap();

    let preserver = CrashPreserver::new(layout);
    let agent_id = AgentId::new();
    let out_dir = preserver.preserve(&session, &agent_id, "crash-3000", "crash").unwrap();

    assert!(out_dir.join("events.jsonl").exists());
}
