// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wait_for_resume` (§4.6): blocks an interrupted Coordinator until a
//! human clears the interrupt gate, but must also wake on `SIGTERM` so
//! orderly shutdown is never stuck behind a pending interrupt. Polling
//! rather than a filesystem watch follows the rest of this harness's
//! plain-file conventions (no `notify` dependency the way the teacher's
//! CLI crate pulls one in for its own purposes).

use harness_store::InterruptGate;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll `gate` every `poll_interval` until it clears, or return early
/// if `shutdown` fires. Returns `true` if the gate cleared, `false` if
/// woken by shutdown with the gate still asserted.
pub async fn wait_for_resume(gate: &InterruptGate, poll_interval: Duration, shutdown: &CancellationToken) -> bool {
    loop {
        if !gate.is_asserted() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.cancelled() => return false,
        }
    }
}

#[cfg(test)]
#[path = "resume_tests.rs"]
mod tests;
