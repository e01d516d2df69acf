// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record: the durable state of one launch of the child agent.
//!
//! `SessionId` is kept as a plain string newtype rather than the
//! [`crate::define_id!`]-generated fixed-prefix ids, because its wire
//! format (`ses_<nanoid>`) is pinned by the external contract rather than
//! chosen by us.

use crate::work::WorkId;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for an agent session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh `ses_<nanoid>` session id.
    pub fn generate() -> Self {
        Self(format!("ses_{}", nanoid::nanoid!(16)))
    }

    /// Get the string value of this SessionId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a session. Health & Recovery is the sole writer
/// once a session leaves `spawning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Spawning,
    Running,
    Completing,
    Completed,
    Failed,
    Timeout,
    Interrupted,
}

crate::simple_display! {
    SessionStatus {
        Spawning => "spawning",
        Running => "running",
        Completing => "completing",
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
        Interrupted => "interrupted",
    }
}

impl SessionStatus {
    /// Terminal for the purposes of the post-run archive/metrics step.
    /// `Interrupted` is terminal in this sense even though the state
    /// machine permits `interrupted -> running` on resume.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Interrupted
        )
    }

    /// `pid` is non-null iff the session is in one of these states.
    pub fn expects_pid(self) -> bool {
        matches!(
            self,
            Self::Spawning | Self::Running | Self::Completing | Self::Interrupted
        )
    }

    /// Whether `from -> self` is a permitted transition per the state
    /// table. Used by Health & Recovery before writing a new status;
    /// illegal transitions are logged and dropped, never aborted on.
    pub fn can_transition_from(self, from: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (from, self),
            (Spawning, Running)
                | (Spawning, Failed)
                | (Running, Completing)
                | (Running, Failed)
                | (Running, Timeout)
                | (Running, Interrupted)
                | (Completing, Completed)
                | (Completing, Failed)
                | (Interrupted, Running)
                | (Interrupted, Failed)
        )
    }
}

/// Raised when a caller attempts to record an illegal status transition.
/// Per spec, Health & Recovery logs and drops these rather than treating
/// them as fatal — this type exists so callers can choose that policy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("illegal session status transition: {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// Heartbeat state, refreshed by the Stream Monitor on `message_stop`.
/// Its freshness (not its content) is what Health & Recovery relies on
/// for stall detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatState {
    pub last_check_epoch_ms: u64,
    pub message_count: u64,
    pub tool_calls: u64,
}

/// Observational progress counters. Never drive status decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressState {
    pub message_starts: u64,
    pub message_stops: u64,
    pub tool_calls: u64,
    pub errors: u64,
    pub last_updated_epoch_ms: u64,
}

/// Paths to the session's three log artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPaths {
    pub stdout: String,
    pub stderr: String,
    pub transcript: String,
}

/// A reference to the work item a session is draining. `details` is the
/// opaque blob handed down from the queue, carried here so archives are
/// self-describing without a join back to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWork {
    pub id: WorkId,
    pub details: serde_json::Value,
}

/// The durable record of one launch of the child agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub started_at: String,
    pub start_epoch: u64,
    pub status: SessionStatus,
    pub ended_at: Option<String>,
    pub exit_code: Option<i32>,
    pub pid: Option<u32>,
    pub work: SessionWork,
    pub heartbeat: HeartbeatState,
    pub progress: ProgressState,
    pub log_paths: LogPaths,
    pub status_reason: Option<String>,
    pub status_updated_at: String,
}

impl Session {
    /// Apply a new status if the transition is legal, stamping
    /// `status_updated_at`/`ended_at`/`status_reason` consistently.
    /// Returns the rejected transition as an `Err` without mutating
    /// `self` — callers decide whether to log-and-drop or propagate.
    pub fn transition(
        &mut self,
        to: SessionStatus,
        reason: Option<String>,
        now_iso: impl Into<String>,
    ) -> Result<(), StatusTransitionError> {
        if !to.can_transition_from(self.status) {
            return Err(StatusTransitionError { from: self.status, to });
        }
        let now_iso = now_iso.into();
        self.status = to;
        self.status_reason = reason;
        self.status_updated_at = now_iso.clone();
        if to.is_terminal() {
            self.ended_at = Some(now_iso);
        }
        if !to.expects_pid() {
            self.pid = None;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
