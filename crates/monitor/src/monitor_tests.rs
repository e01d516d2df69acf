// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::{FakeClock, HeartbeatState, LogPaths, ProgressState, SessionWork, WorkItem};
use serde_json::json;
use std::io::Cursor;
use tempfile::tempdir;

fn fresh_session(status: SessionStatus) -> harness_core::Session {
    let work = WorkItem::new(0, 0, json!({}));
    harness_core::Session {
        session_id: SessionId::new("ses_test"),
        started_at: "2026-01-01T00:00:00Z".into(),
        start_epoch: 1_000,
        status,
        ended_at: None,
        exit_code: None,
        pid: Some(4242),
        work: SessionWork { id: work.id, details: work.details },
        heartbeat: HeartbeatState::default(),
        progress: ProgressState::default(),
        log_paths: LogPaths { stdout: "stdout.log".into(), stderr: "stderr.log".into(), transcript: "transcript.jsonl".into() },
        status_reason: None,
        status_updated_at: "2026-01-01T00:00:00Z".into(),
    }
}

struct Fixture {
    monitor: StreamMonitor<FakeClock>,
    session: Arc<Mutex<harness_core::Session>>,
    base: tempfile::TempDir,
    session_id: SessionId,
}

fn fixture(status: SessionStatus) -> Fixture {
    fixture_with_config(status, MonitorConfig::default())
}

fn fixture_with_config(status: SessionStatus, config: MonitorConfig) -> Fixture {
    let base = tempdir().unwrap();
    let layout = harness_store::StateLayout::new(base.path());
    let sessions = SessionStore::new(layout.clone());
    let files = AgentFiles::new(layout.clone());
    let agent_id = AgentId::new();
    let session = fresh_session(status);
    let session_id = session.session_id.clone();
    let log = SessionLog::new(layout.clone(), session_id.clone());
    let session = Arc::new(Mutex::new(session));
    let monitor = StreamMonitor::new(
        agent_id,
        session.clone(),
        sessions,
        files,
        log,
        base.path().join("transcript.jsonl"),
        base.path().join("stdout.log"),
        base.path().join("stderr.log"),
        FakeClock::new(),
        config,
        false,
    );
    Fixture { monitor, session, base, session_id }
}

fn events_log(f: &Fixture) -> String {
    let layout = harness_store::StateLayout::new(f.base.path());
    std::fs::read_to_string(layout.events_log_path(&f.session_id)).unwrap_or_default()
}

fn errors_log(f: &Fixture) -> String {
    let layout = harness_store::StateLayout::new(f.base.path());
    std::fs::read_to_string(layout.errors_log_path(&f.session_id)).unwrap_or_default()
}

#[tokio::test]
async fn message_stop_refreshes_heartbeat_and_progress() {
    let f = fixture(SessionStatus::Running);
    let stdout = Cursor::new(b"{\"type\":\"message_start\"}\n{\"type\":\"message_stop\"}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    let session = f.session.lock();
    assert_eq!(session.progress.message_starts, 1);
    assert_eq!(session.progress.message_stops, 1);
    assert!(session.heartbeat.last_check_epoch_ms > 0);
    assert!(events_log(&f).contains("message_start"));
    assert!(events_log(&f).contains("message_stop"));
}

#[tokio::test]
async fn tool_use_increments_progress_counter() {
    let f = fixture(SessionStatus::Running);
    let stdout = Cursor::new(b"{\"type\":\"tool_use\",\"name\":\"fs_read\"}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    assert_eq!(f.session.lock().progress.tool_calls, 1);
    assert!(events_log(&f).contains("tool_use"));
}

#[tokio::test]
async fn error_event_is_appended_to_errors_log_and_counted() {
    let f = fixture(SessionStatus::Running);
    let stdout = Cursor::new(b"{\"type\":\"error\",\"error\":{\"message\":\"boom\"}}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    assert_eq!(f.session.lock().progress.errors, 1);
    assert!(errors_log(&f).contains("boom"));
    assert!(events_log(&f).contains("boom"));
}

#[tokio::test]
async fn unknown_event_type_is_logged_verbatim_without_counters() {
    let f = fixture(SessionStatus::Running);
    let stdout = Cursor::new(b"{\"type\":\"custom_banner\",\"text\":\"hi\"}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    let session = f.session.lock();
    assert_eq!(session.progress.message_starts, 0);
    assert_eq!(session.progress.tool_calls, 0);
    assert!(events_log(&f).contains("custom_banner"));
}

#[tokio::test]
async fn non_json_lines_are_silently_ignored() {
    let f = fixture(SessionStatus::Running);
    let stdout = Cursor::new(b"Loading model weights...\nwarning: deprecated flag\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    assert_eq!(events_log(&f), "");
}

#[tokio::test]
async fn oversized_line_is_discarded_with_marker() {
    let f = fixture_with_config(SessionStatus::Running, MonitorConfig { max_event_bytes: 16 });

    let huge = format!("{{\"type\":\"message_delta\",\"pad\":\"{}\"}}\n", "x".repeat(200));
    let stdout = Cursor::new(huge.into_bytes());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    let log = events_log(&f);
    assert!(log.contains("oversized_event"));
    assert!(!log.contains("message_delta"));
}

#[tokio::test]
async fn stops_immediately_when_session_is_already_terminal() {
    let f = fixture(SessionStatus::Completed);
    let stdout = Cursor::new(b"{\"type\":\"message_start\"}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    assert_eq!(f.session.lock().progress.message_starts, 0);
    assert_eq!(events_log(&f), "");
}

#[tokio::test]
async fn cancellation_token_stops_the_loop() {
    let f = fixture(SessionStatus::Running);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let stdout = Cursor::new(b"{\"type\":\"message_start\"}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), cancel).await.unwrap();

    assert_eq!(f.session.lock().progress.message_starts, 0);
}

#[tokio::test]
async fn refresh_heartbeat_counts_transcript_independently_of_stream() {
    let f = fixture(SessionStatus::Running);
    let transcript = "{\"type\":\"message_stop\"}\n{\"type\":\"tool_use\",\"name\":\"fs_read\"}\n{\"type\":\"tool_use\",\"name\":\"fs_write\"}\n";
    std::fs::write(f.base.path().join("transcript.jsonl"), transcript).unwrap();

    let stdout = Cursor::new(b"{\"type\":\"message_stop\"}\n".to_vec());
    f.monitor.run(stdout, Cursor::new(Vec::new()), CancellationToken::new()).await.unwrap();

    let session = f.session.lock();
    assert_eq!(session.heartbeat.message_count, 1);
    assert_eq!(session.heartbeat.tool_calls, 2);
}
