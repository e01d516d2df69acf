// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session append-only event/error logs. The Stream Monitor is the
//! exclusive writer (§3 ownership rules); nothing here ever rewrites a
//! previously appended line.

use crate::atomic::append_line;
use crate::error::StoreError;
use crate::layout::StateLayout;
use harness_core::SessionId;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SessionLog {
    layout: StateLayout,
    session_id: SessionId,
}

impl SessionLog {
    pub fn new(layout: StateLayout, session_id: SessionId) -> Self {
        Self { layout, session_id }
    }

    /// Append one well-formed JSON record verbatim, including unknown
    /// event types (I4, R3).
    pub fn append_event(&self, raw: &Value) -> Result<(), StoreError> {
        append_line(&self.layout.events_log_path(&self.session_id), &raw.to_string())
    }

    /// `error` events are additionally copied here (§3, §4.3).
    pub fn append_error(&self, raw: &Value) -> Result<(), StoreError> {
        append_line(&self.layout.errors_log_path(&self.session_id), &raw.to_string())
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
