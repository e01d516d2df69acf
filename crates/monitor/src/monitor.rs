// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Stream Monitor (C4): tails a child's piped stdout, parses each
//! line against the event contract, and applies the side effects §4.3
//! describes. Grounded in `ClaudeCodeRunner::event_loop`'s
//! read-line-then-dispatch shape (the same file that grounds
//! harness-spawn's invocation logic), generalized from a typed
//! `ClaudeEvent` match to the raw-plus-typed `EventEnvelope` this
//! harness uses so unknown event types still round-trip into the log.

use crate::error::MonitorError;
use harness_core::{AgentId, Clock, Event, EventEnvelope, SessionId, SessionStatus};
use harness_store::{AgentFiles, SessionLog, SessionStore};
use parking_lot::Mutex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Tunables independent of any one session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Lines larger than this are not buffered in full; their content
    /// is discarded and a marker record is logged instead (§4.3
    /// back-pressure).
    pub max_event_bytes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { max_event_bytes: 256 * 1024 }
    }
}

/// Outcome of reading one line under the byte cap.
enum LineOutcome {
    Line(String),
    Oversized { byte_len: usize },
}

pub struct StreamMonitor<C: Clock> {
    agent_id: AgentId,
    session_id: SessionId,
    /// Shared with Health & Recovery; both sides lock briefly, mutate
    /// their own fields, and persist. The Monitor only ever touches
    /// `heartbeat` and `progress`, never `status`.
    session: Arc<Mutex<harness_core::Session>>,
    sessions: SessionStore,
    files: AgentFiles,
    log: SessionLog,
    transcript_path: PathBuf,
    raw_stdout_path: PathBuf,
    raw_stderr_path: PathBuf,
    clock: C,
    config: MonitorConfig,
    parallel: bool,
}

impl<C: Clock> StreamMonitor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: AgentId,
        session: Arc<Mutex<harness_core::Session>>,
        sessions: SessionStore,
        files: AgentFiles,
        log: SessionLog,
        transcript_path: PathBuf,
        raw_stdout_path: PathBuf,
        raw_stderr_path: PathBuf,
        clock: C,
        config: MonitorConfig,
        parallel: bool,
    ) -> Self {
        let session_id = session.lock().session_id.clone();
        Self {
            agent_id,
            session_id,
            session,
            sessions,
            files,
            log,
            transcript_path,
            raw_stdout_path,
            raw_stderr_path,
            clock,
            config,
            parallel,
        }
    }

    /// Drive the event loop until the child's stdout closes, the
    /// session leaves `{running, completing}`, or `cancel` fires.
    /// `stderr` is drained concurrently and copied verbatim to the
    /// session's stderr log; an unread stderr pipe would otherwise
    /// block the child once the OS pipe buffer fills.
    pub async fn run<R1, R2>(&self, stdout: R1, stderr: R2, cancel: CancellationToken) -> Result<(), MonitorError>
    where
        R1: AsyncRead + Unpin,
        R2: AsyncRead + Unpin,
    {
        let (stdout_result, ()) = tokio::join!(self.dispatch_stdout(stdout, cancel), Self::drain_stderr(stderr, &self.raw_stderr_path));
        stdout_result
    }

    async fn dispatch_stdout<R: AsyncRead + Unpin>(&self, stdout: R, cancel: CancellationToken) -> Result<(), MonitorError> {
        let mut reader = BufReader::new(stdout);
        let mut raw_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.raw_stdout_path)
            .await
            .map_err(|e| MonitorError::io(&self.raw_stdout_path, e))?;

        loop {
            if !self.session_is_live() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = read_capped_line(&mut reader, self.config.max_event_bytes) => {
                    outcome.map_err(|e| MonitorError::io(&self.raw_stdout_path, e))?
                }
            };

            let Some(outcome) = outcome else { break };

            match outcome {
                LineOutcome::Line(line) => {
                    raw_file.write_all(line.as_bytes()).await.map_err(|e| MonitorError::io(&self.raw_stdout_path, e))?;
                    raw_file.write_all(b"\n").await.map_err(|e| MonitorError::io(&self.raw_stdout_path, e))?;
                    self.process_line(&line)?;
                }
                LineOutcome::Oversized { byte_len } => {
                    self.process_oversized(byte_len)?;
                }
            }
        }
        Ok(())
    }

    async fn drain_stderr<R: AsyncRead + Unpin>(stderr: R, path: &std::path::Path) {
        let Ok(mut file) = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await else {
            tracing::warn!(path = %path.display(), "failed to open stderr log for append");
            return;
        };
        let mut reader = stderr;
        if let Err(e) = tokio::io::copy(&mut reader, &mut file).await {
            tracing::warn!(path = %path.display(), error = %e, "stderr drain failed");
        }
    }

    fn session_is_live(&self) -> bool {
        matches!(self.session.lock().status, SessionStatus::Running | SessionStatus::Completing)
    }

    fn process_line(&self, line: &str) -> Result<(), MonitorError> {
        let now_iso = || harness_core::time_fmt::iso_from_epoch_ms(self.clock.epoch_ms());
        let Some(envelope) = EventEnvelope::parse_line(line, now_iso) else {
            // Not a recognized event at all (§4.3): not JSON, or no
            // `type` field. Silently ignored, no counter advances.
            return Ok(());
        };

        self.log.append_event(&envelope.raw)?;

        match &envelope.event {
            Event::MessageStart => {
                self.with_progress(|p| p.message_starts += 1);
            }
            Event::MessageStop => {
                self.refresh_heartbeat();
                self.with_progress(|p| p.message_stops += 1);
            }
            Event::ToolUse(_) => {
                self.with_progress(|p| p.tool_calls += 1);
            }
            Event::Error(_) => {
                self.log.append_error(&envelope.raw)?;
                self.with_progress(|p| p.errors += 1);
            }
            Event::MessageDelta(_) | Event::Unknown(_) => {
                // Usage accumulation for `message_delta` and verbatim
                // logging for unknowns both happen via the raw append
                // above; neither touches a counter (§4.3).
            }
        }
        Ok(())
    }

    /// An event line exceeded the byte cap. Its content is discarded;
    /// only a minimal marker is recorded, and no counter is touched.
    fn process_oversized(&self, byte_len: usize) -> Result<(), MonitorError> {
        let marker = json!({
            "type": "oversized_event",
            "byte_len": byte_len,
            "timestamp": harness_core::time_fmt::iso_from_epoch_ms(self.clock.epoch_ms()),
        });
        self.log.append_event(&marker)?;
        Ok(())
    }

    fn with_progress(&self, f: impl FnOnce(&mut harness_core::ProgressState)) {
        let mut session = self.session.lock();
        f(&mut session.progress);
        session.progress.last_updated_epoch_ms = self.clock.epoch_ms();
        self.persist(&session);
    }

    /// Re-derives the heartbeat counters from the transcript file
    /// (§4.4's "heartbeat source"), then rewrites both the mtime-bearing
    /// heartbeat file Health & Recovery polls and the Session record's
    /// own `heartbeat` field.
    fn refresh_heartbeat(&self) {
        let (message_count, tool_calls) = self.count_transcript();
        let now_iso = harness_core::time_fmt::iso_from_epoch_ms(self.clock.epoch_ms());
        if let Err(e) = self.files.write_heartbeat(&self.agent_id, &now_iso) {
            tracing::warn!(agent_id = %self.agent_id, error = %e, "failed to write heartbeat file");
        }

        let mut session = self.session.lock();
        session.heartbeat.last_check_epoch_ms = self.clock.epoch_ms();
        session.heartbeat.message_count = message_count;
        session.heartbeat.tool_calls = tool_calls;
        self.persist(&session);
    }

    /// Best-effort count of assistant turns and tool uses recorded in
    /// the child's own transcript file. The transcript is newline
    /// delimited JSON from the same CLI that produces the stdout event
    /// stream, so it is parsed with the same [`EventEnvelope`] rules; a
    /// missing or unreadable transcript counts as zero rather than
    /// failing the refresh.
    fn count_transcript(&self) -> (u64, u64) {
        let Ok(contents) = std::fs::read_to_string(&self.transcript_path) else {
            return (0, 0);
        };
        let now_iso = || harness_core::time_fmt::iso_from_epoch_ms(self.clock.epoch_ms());
        let mut message_count = 0u64;
        let mut tool_calls = 0u64;
        for line in contents.lines() {
            match EventEnvelope::parse_line(line, now_iso).map(|e| e.event) {
                Some(Event::MessageStop) => message_count += 1,
                Some(Event::ToolUse(_)) => tool_calls += 1,
                _ => {}
            }
        }
        (message_count, tool_calls)
    }

    fn persist(&self, session: &harness_core::Session) {
        let result = if self.parallel {
            self.sessions.write_agent_status(&self.agent_id, session)
        } else {
            self.sessions.write_current(session)
        };
        if let Err(e) = result {
            tracing::warn!(session_id = %self.session_id, error = %e, "failed to persist session record");
        }
    }
}

/// Read one line, capped at `max_bytes`. Lines under the cap are
/// returned whole; lines over it have their content discarded but are
/// still consumed to keep the stream in sync, per §4.3's "must not
/// buffer unboundedly."
async fn read_capped_line<R: AsyncBufRead + Unpin>(reader: &mut R, max_bytes: usize) -> std::io::Result<Option<LineOutcome>> {
    let mut buf: Vec<u8> = Vec::new();
    let mut total = 0usize;
    let mut truncated = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if total == 0 {
                return Ok(None);
            }
            break;
        }

        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            if !truncated {
                if buf.len() + pos <= max_bytes {
                    buf.extend_from_slice(&available[..pos]);
                } else {
                    truncated = true;
                }
            }
            total += pos;
            reader.consume(pos + 1);
            break;
        }

        if !truncated {
            if buf.len() + available.len() <= max_bytes {
                buf.extend_from_slice(available);
            } else {
                truncated = true;
            }
        }
        total += available.len();
        let n = available.len();
        reader.consume(n);
    }

    if truncated {
        Ok(Some(LineOutcome::Oversized { byte_len: total }))
    } else {
        Ok(Some(LineOutcome::Line(String::from_utf8_lossy(&buf).into_owned())))
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
