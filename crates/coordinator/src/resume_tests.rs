// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_store::StateLayout;
use tempfile::tempdir;

#[tokio::test(start_paused = true)]
async fn returns_immediately_when_gate_already_clear() {
    let base = tempdir().unwrap();
    let gate = InterruptGate::new(StateLayout::new(base.path()));
    let shutdown = CancellationToken::new();

    let resumed = wait_for_resume(&gate, Duration::from_secs(30), &shutdown).await;

    assert!(resumed);
}

#[tokio::test(start_paused = true)]
async fn unblocks_once_gate_is_cleared() {
    let base = tempdir().unwrap();
    let gate = InterruptGate::new(StateLayout::new(base.path()));
    gate.assert("human review pending").unwrap();
    let shutdown = CancellationToken::new();

    let gate_clone = gate.clone();
    let clearer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        gate_clone.clear().unwrap();
    });

    let resumed = wait_for_resume(&gate, Duration::from_millis(500), &shutdown).await;

    assert!(resumed);
    clearer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn wakes_on_shutdown_even_if_gate_still_set() {
    let base = tempdir().unwrap();
    let gate = InterruptGate::new(StateLayout::new(base.path()));
    gate.assert("stuck").unwrap();
    let shutdown = CancellationToken::new();

    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown_clone.cancel();
    });

    let resumed = wait_for_resume(&gate, Duration::from_secs(30), &shutdown).await;

    assert!(!resumed);
    assert!(gate.is_asserted());
}
