// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health & Recovery (C5): runs the ordered checks against a live
//! session, kills the agent when a check demands it, applies the
//! resulting status transition, and drives the failure-counter/
//! interrupt-gate cascade (§4.4's "failure counter & interrupt
//! threshold"). Never writes `Interrupted` — that belongs to the
//! Coordinator's own interrupt-gate poll (§4.5 step 4).

use crate::check::{self, CheckOutcome, HealthConfig, LivenessFacts, TerminalOutcome};
use crate::error::HealthError;
use harness_core::{AgentId, Clock, Session, SessionStatus, StatusTransitionError};
use harness_store::{pid_is_alive, AgentFiles, FailureCounter, InterruptGate, SessionStore, StateLayout};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
pub struct HealthRecovery<C: Clock> {
    files: AgentFiles,
    sessions: SessionStore,
    failures: FailureCounter,
    interrupt: InterruptGate,
    clock: C,
    config: HealthConfig,
    parallel: bool,
}

impl<C: Clock> HealthRecovery<C> {
    pub fn new(layout: StateLayout, clock: C, config: HealthConfig, parallel: bool) -> Self {
        Self {
            files: AgentFiles::new(layout.clone()),
            sessions: SessionStore::new(layout.clone()),
            failures: FailureCounter::new(layout.clone()),
            interrupt: InterruptGate::new(layout),
            clock,
            config,
            parallel,
        }
    }

    /// Evaluate one session. Returns `true` if it became terminal
    /// (the caller should stop its monitoring loop for this slot).
    pub async fn check(&self, agent_id: &AgentId, session: &Arc<Mutex<Session>>) -> Result<bool, HealthError> {
        let liveness = self.gather_liveness(agent_id)?;
        let error_marker = self.files.read_error_marker(agent_id)?;
        let now = self.clock.epoch_ms();

        let outcome = {
            let guard = session.lock();
            check::evaluate(&guard, liveness, error_marker.as_deref(), now, &self.config)
        };

        let CheckOutcome::Terminal(terminal) = outcome else {
            return Ok(false);
        };

        if terminal.kill {
            if let Some(pid) = self.files.read_pid(agent_id)? {
                crate::kill::kill(pid, self.config.kill_grace_period).await;
            }
            if matches!(self.files.read_exit(agent_id), Ok(None)) {
                tracing::debug!(agent_id = %agent_id, "no exit code recorded after kill");
            }
        }

        if error_marker.is_some() {
            self.files.clear_error_marker(agent_id)?;
        }

        self.apply(agent_id, session, terminal)?;
        Ok(true)
    }

    fn gather_liveness(&self, agent_id: &AgentId) -> Result<LivenessFacts, HealthError> {
        let pid = self.files.read_pid(agent_id)?;
        let pid_alive = pid.map(pid_is_alive).unwrap_or(false);
        let exit_code = self.files.read_exit(agent_id)?;
        Ok(LivenessFacts { pid_present: pid.is_some(), pid_alive, exit_code })
    }

    fn apply(&self, agent_id: &AgentId, session: &Arc<Mutex<Session>>, terminal: TerminalOutcome) -> Result<(), HealthError> {
        let now_iso = harness_core::time_fmt::iso_from_epoch_ms(self.clock.epoch_ms());

        {
            let mut guard = session.lock();
            if let Err(e) = transition_through(&mut guard, terminal.status, terminal.reason.clone(), &now_iso) {
                tracing::warn!(agent_id = %agent_id, error = %e, "illegal health transition dropped");
                return Ok(());
            }
        }
        self.persist(agent_id, session)?;

        match terminal.status {
            SessionStatus::Completed => {
                self.failures.reset()?;
            }
            SessionStatus::Failed | SessionStatus::Timeout => {
                let count = self.failures.increment()?;
                if count >= self.config.max_consecutive_failures {
                    self.interrupt.assert("too many consecutive failures")?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn persist(&self, agent_id: &AgentId, session: &Arc<Mutex<Session>>) -> Result<(), HealthError> {
        let guard = session.lock();
        if self.parallel {
            self.sessions.write_agent_status(agent_id, &guard)?;
        } else {
            self.sessions.write_current(&guard)?;
        }
        Ok(())
    }
}

/// `evaluate` can name `Completed` directly (§4.4 check 1), but the
/// transition table only allows reaching it via `completing`. Hop
/// through `completing` first when coming from `running` so the
/// already-built state machine never needs a running→completed edge.
fn transition_through(
    session: &mut Session,
    to: SessionStatus,
    reason: Option<String>,
    now_iso: &str,
) -> Result<(), StatusTransitionError> {
    if to == SessionStatus::Completed && session.status == SessionStatus::Running {
        session.transition(SessionStatus::Completing, None, now_iso.to_string())?;
    }
    session.transition(to, reason, now_iso.to_string())
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
