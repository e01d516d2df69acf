// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-session metrics record (§3, §4.7). Derived once at iteration
//! close; best-effort, missing inputs default to zero rather than error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub total_calls: u64,
    pub breakdown: HashMap<String, u64>,
}

impl ToolUsage {
    pub fn record_call(&mut self, tool_name: &str) {
        self.total_calls += 1;
        *self.breakdown.entry(tool_name.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub duration_seconds: u64,
    pub turns: u64,
}

/// Metrics aggregated for one session, emitted once at iteration close
/// and written beside the session archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub session_id: String,
    pub api_usage: ApiUsage,
    pub tool_usage: ToolUsage,
    pub session_metrics: SessionMetrics,
    pub collected_at: String,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
