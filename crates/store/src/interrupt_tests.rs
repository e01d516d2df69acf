// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn gate_starts_clear() {
    let dir = tempdir().unwrap();
    let gate = InterruptGate::new(StateLayout::new(dir.path()));
    assert!(!gate.is_asserted());
    assert_eq!(gate.reason().unwrap(), None);
}

#[test]
fn assert_then_clear_round_trips() {
    let dir = tempdir().unwrap();
    let gate = InterruptGate::new(StateLayout::new(dir.path()));

    gate.assert("too many consecutive failures").unwrap();
    assert!(gate.is_asserted());
    assert_eq!(gate.reason().unwrap().as_deref(), Some("too many consecutive failures"));

    gate.clear().unwrap();
    assert!(!gate.is_asserted());
}

#[test]
fn clear_is_idempotent() {
    let dir = tempdir().unwrap();
    let gate = InterruptGate::new(StateLayout::new(dir.path()));
    gate.clear().unwrap();
    gate.clear().unwrap();
}

#[test]
fn failure_counter_starts_at_zero() {
    let dir = tempdir().unwrap();
    let counter = FailureCounter::new(StateLayout::new(dir.path()));
    assert_eq!(counter.read().unwrap(), 0);
}

#[test]
fn failure_counter_increments_and_resets() {
    let dir = tempdir().unwrap();
    let counter = FailureCounter::new(StateLayout::new(dir.path()));

    assert_eq!(counter.increment().unwrap(), 1);
    assert_eq!(counter.increment().unwrap(), 2);
    assert_eq!(counter.increment().unwrap(), 3);
    assert_eq!(counter.read().unwrap(), 3);

    counter.reset().unwrap();
    assert_eq!(counter.read().unwrap(), 0);
}
