// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interrupt gate and the consecutive-failure counter — the two
//! pieces of global mutable state besides the current-session pointer
//! (§9). Both are single-file, single-writer.

use crate::atomic::{read_string_opt, write_atomic};
use crate::error::StoreError;
use crate::layout::StateLayout;
use std::fs;

/// A single-file switch: its *existence* gates the Coordinator (I6).
#[derive(Debug, Clone)]
pub struct InterruptGate {
    layout: StateLayout,
}

impl InterruptGate {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn is_asserted(&self) -> bool {
        self.layout.interrupt_request_path().exists()
    }

    /// Create the gate file with a free-form human-readable reason.
    /// Idempotent: asserting twice just overwrites the reason.
    pub fn assert(&self, reason: &str) -> Result<(), StoreError> {
        write_atomic(&self.layout.interrupt_request_path(), reason.as_bytes())
    }

    pub fn reason(&self) -> Result<Option<String>, StoreError> {
        read_string_opt(&self.layout.interrupt_request_path())
    }

    /// Remove the gate file. Idempotent.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.layout.interrupt_request_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(
                self.layout.interrupt_request_path().display().to_string(),
                e,
            )),
        }
    }
}

/// Monotonic counter of consecutive spawn/run failures (I5). Reset iff
/// a spawn succeeds; incremented on every terminal failure.
#[derive(Debug, Clone)]
pub struct FailureCounter {
    layout: StateLayout,
}

impl FailureCounter {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn read(&self) -> Result<u32, StoreError> {
        let raw = read_string_opt(&self.layout.failure_count_path())?;
        Ok(raw.and_then(|s| s.parse().ok()).unwrap_or(0))
    }

    /// Increment and return the new value.
    pub fn increment(&self) -> Result<u32, StoreError> {
        let next = self.read()?.saturating_add(1);
        write_atomic(&self.layout.failure_count_path(), next.to_string().as_bytes())?;
        Ok(next)
    }

    pub fn reset(&self) -> Result<(), StoreError> {
        write_atomic(&self.layout.failure_count_path(), b"0")
    }
}

#[cfg(test)]
#[path = "interrupt_tests.rs"]
mod tests;
