// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The parallel variant's slot-id registry (§4.8). A Coordinator
//! process that dies and restarts must rediscover the same
//! [`AgentId`]s it was using before, or `recover_slot` has nothing to
//! match against `state/agents/<id>/status.json`. Single-file,
//! single-writer, same shape as [`crate::interrupt::FailureCounter`].

use crate::atomic::{read_json_opt, write_json_atomic};
use crate::error::StoreError;
use crate::layout::StateLayout;
use harness_core::AgentId;

#[derive(Debug, Clone)]
pub struct SlotRegistry {
    layout: StateLayout,
}

impl SlotRegistry {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn read(&self) -> Result<Option<Vec<AgentId>>, StoreError> {
        read_json_opt(&self.layout.slots_path())
    }

    pub fn write(&self, slots: &[AgentId]) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.slots_path(), &slots)
    }

    /// Load the persisted slot set, growing or shrinking it to `count`
    /// slots and persisting the result if it changed. A process
    /// restarted with the same `parallel_agents` count gets back
    /// exactly the ids it had before; a changed count keeps the
    /// existing ids and extends or truncates from there, so slots that
    /// survive a resize keep their identity.
    pub fn load_or_init(&self, count: usize) -> Result<Vec<AgentId>, StoreError> {
        let existing = self.read()?;
        let mut slots = existing.clone().unwrap_or_default();
        let changed = existing.is_none() || slots.len() != count;
        if slots.len() < count {
            slots.extend((slots.len()..count).map(|_| AgentId::new()));
        } else {
            slots.truncate(count);
        }
        if changed {
            self.write(&slots)?;
        }
        Ok(slots)
    }
}

#[cfg(test)]
#[path = "slots_tests.rs"]
mod tests;
