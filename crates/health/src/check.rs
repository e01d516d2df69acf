// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ordered health checks (§4.4): process liveness, explicit error
//! marker, timeout, stall — first match wins. Kept pure (no I/O) so
//! the ordering itself is exhaustively testable; [`crate::recovery`]
//! gathers the facts these functions consume and applies the outcome.

use harness_core::{Session, SessionStatus};
use std::time::Duration;

/// Tunables for checks 3 and 4. Defaults are operational guesses, not
/// pinned by the contract.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub session_timeout: Duration,
    pub stall_threshold: Duration,
    pub kill_grace_period: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(2 * 60 * 60),
            stall_threshold: Duration::from_secs(10 * 60),
            kill_grace_period: Duration::from_secs(30),
            max_consecutive_failures: 5,
        }
    }
}

/// What the liveness probe found for a PID before any check runs.
#[derive(Debug, Clone, Copy)]
pub struct LivenessFacts {
    pub pid_present: bool,
    pub pid_alive: bool,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOutcome {
    pub status: SessionStatus,
    pub reason: Option<String>,
    /// Whether the caller must still send a kill signal. `false` when
    /// the process is already confirmed gone (check 1).
    pub kill: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Healthy,
    Terminal(TerminalOutcome),
}

/// Run the four checks in order against one session, returning the
/// first terminal verdict or `Healthy` if none fire.
pub fn evaluate(
    session: &Session,
    liveness: LivenessFacts,
    error_marker: Option<&str>,
    now_epoch_ms: u64,
    config: &HealthConfig,
) -> CheckOutcome {
    if !liveness.pid_present || !liveness.pid_alive {
        let (status, reason) = match liveness.exit_code {
            Some(0) => (SessionStatus::Completed, None),
            Some(code) => (SessionStatus::Failed, Some(format!("exit {code}"))),
            None => (SessionStatus::Failed, Some("crash".to_string())),
        };
        return CheckOutcome::Terminal(TerminalOutcome { status, reason, kill: false });
    }

    if let Some(marker) = error_marker {
        return CheckOutcome::Terminal(TerminalOutcome {
            status: SessionStatus::Failed,
            reason: Some(marker.to_string()),
            kill: true,
        });
    }

    let now_epoch_s = now_epoch_ms / 1000;
    if now_epoch_s.saturating_sub(session.start_epoch) > config.session_timeout.as_secs() {
        return CheckOutcome::Terminal(TerminalOutcome {
            status: SessionStatus::Timeout,
            reason: Some("exceeded time limit".to_string()),
            kill: true,
        });
    }

    let reference_ms = if session.heartbeat.last_check_epoch_ms > 0 {
        session.heartbeat.last_check_epoch_ms
    } else {
        session.start_epoch * 1000
    };
    let age = Duration::from_millis(now_epoch_ms.saturating_sub(reference_ms));
    if age > config.stall_threshold {
        return CheckOutcome::Terminal(TerminalOutcome {
            status: SessionStatus::Failed,
            reason: Some("stalled".to_string()),
            kill: true,
        });
    }

    CheckOutcome::Healthy
}

/// Exponential backoff for the next spawn attempt after a terminal
/// failure: `min(2^k seconds, 5 min)`.
pub fn backoff_for(consecutive_failures: u32) -> Duration {
    let capped_exp = consecutive_failures.min(32);
    let secs = 2u64.saturating_pow(capped_exp).min(300);
    Duration::from_secs(secs)
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
