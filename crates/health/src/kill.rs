// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kill protocol (§4.4): graceful signal, bounded grace period, then an
//! unconditional kill. Generalizes the coop adapter's
//! request-then-escalate shape (`kill_agent` in
//! `adapters/agent/coop/adapter.rs`) from an HTTP shutdown request to a
//! raw POSIX signal, since this harness owns the child's PID directly
//! rather than talking to it over a socket.

use harness_store::pid_is_alive;
use nix::sys::signal::{kill as send_signal, Signal};
use nix::unistd::Pid;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Idempotent: a pid that's already gone is a no-op success.
pub async fn kill(pid: u32, grace_period: Duration) {
    if !pid_is_alive(pid) {
        return;
    }

    if send_signal(Pid::from_raw(pid as i32), Signal::SIGTERM).is_err() {
        // ESRCH: it died between the check above and here. Nothing left to do.
        return;
    }

    let deadline = tokio::time::Instant::now() + grace_period;
    while tokio::time::Instant::now() < deadline {
        if !pid_is_alive(pid) {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    if pid_is_alive(pid) {
        tracing::warn!(pid, "agent ignored SIGTERM past grace period, sending SIGKILL");
        let _ = send_signal(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
}

#[cfg(test)]
#[path = "kill_tests.rs"]
mod tests;
