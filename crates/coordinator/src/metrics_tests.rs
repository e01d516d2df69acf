// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::{HeartbeatState, LogPaths, ProgressState, SessionId, SessionStatus, SessionWork, WorkItem};
use harness_store::SessionLog;
use serde_json::json;
use tempfile::tempdir;

fn session_with(base: &std::path::Path, transcript: &std::path::Path) -> Session {
    let work = WorkItem::new(0, 0, json!({}));
    Session {
        session_id: SessionId::new("ses_metrics"),
        started_at: "2026-01-01T00:00:00Z".into(),
        start_epoch: 1_000,
        status: SessionStatus::Completing,
        ended_at: None,
        exit_code: None,
        pid: None,
        work: SessionWork { id: work.id, details: work.details },
        heartbeat: HeartbeatState::default(),
        progress: ProgressState::default(),
        log_paths: LogPaths {
            stdout: base.join("stdout.log").display().to_string(),
            stderr: base.join("stderr.log").display().to_string(),
            transcript: transcript.display().to_string(),
        },
        status_reason: None,
        status_updated_at: "2026-01-01T00:00:00Z".into(),
    }
}

#[test]
fn counts_turns_tool_calls_and_latest_token_usage() {
    let base = tempdir().unwrap();
    let layout = StateLayout::new(base.path());

    let transcript = base.path().join("transcript.jsonl");
    std::fs::write(
        &transcript,
        concat!(
            "{\"type\":\"message_start\",\"timestamp\":\"t\"}\n",
            "{\"type\":\"message_stop\",\"timestamp\":\"t\"}\n",
            "{\"type\":\"message_stop\",\"timestamp\":\"t\"}\n",
        ),
    )
    .unwrap();

    let session = session_with(base.path(), &transcript);
    let log = SessionLog::new(layout.clone(), session.session_id.clone());
    log.append_event(&json!({"type": "tool_use", "name": "bash", "timestamp": "t"})).unwrap();
    log.append_event(&json!({"type": "tool_use", "name": "bash", "timestamp": "t"})).unwrap();
    log.append_event(&json!({"type": "tool_use", "name": "edit", "timestamp": "t"})).unwrap();
    log.append_event(&json!({
        "type": "message_delta",
        "timestamp": "t",
        "delta": {"usage": {"input_tokens": 100, "output_tokens": 20}}
    }))
    .unwrap();
    log.append_event(&json!({
        "type": "message_delta",
        "timestamp": "t",
        "delta": {"usage": {"input_tokens": 140, "output_tokens": 35}}
    }))
    .unwrap();

    let record = extract(&session, &layout, 1_600_000);

    assert_eq!(record.session_id, "ses_metrics");
    assert_eq!(record.session_metrics.turns, 2);
    assert_eq!(record.session_metrics.duration_seconds, 1_600 - 1_000);
    assert_eq!(record.tool_usage.total_calls, 3);
    assert_eq!(record.tool_usage.breakdown.get("bash"), Some(&2));
    assert_eq!(record.tool_usage.breakdown.get("edit"), Some(&1));
    assert_eq!(record.api_usage.input_tokens, 140);
    assert_eq!(record.api_usage.output_tokens, 35);
}

#[test]
fn missing_transcript_and_log_degrade_to_zero() {
    let base = tempdir().unwrap();
    let layout = StateLayout::new(base.path());
    let session = session_with(base.path(), &base.path().join("absent.jsonl"));

    let record = extract(&session, &layout, 1_000_000);

    assert_eq!(record.session_metrics.turns, 0);
    assert_eq!(record.tool_usage.total_calls, 0);
    assert_eq!(record.api_usage.input_tokens, 0);
}
