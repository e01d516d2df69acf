// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work item and agent slot identifiers, and the opaque work blob the
//! Work Queue Adapter hands to the Spawner.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifies one unit of external work. Opaque to the core beyond
    /// ordering and claim binding.
    pub struct WorkId("wrk-");
}

crate::define_id! {
    /// Stable identity of an agent slot (parallel variant) or the single
    /// worker (serial variant) that supervises one live child at a time.
    pub struct AgentId("agt-");
}

/// A unit of work as read from the queue. `details` is opaque to the
/// core — it is handed to the bootstrap template and otherwise never
/// interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkId,
    pub priority: i64,
    pub created_at_epoch: u64,
    pub details: serde_json::Value,
}

impl WorkItem {
    pub fn new(priority: i64, created_at_epoch: u64, details: serde_json::Value) -> Self {
        Self { id: WorkId::new(), priority, created_at_epoch, details }
    }
}

#[cfg(test)]
#[path = "work_tests.rs"]
mod tests;
