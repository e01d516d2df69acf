// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persists the post-session [`MetricsRecord`] (§4.7) beside the
//! session's own directory, written once at iteration close.

use crate::atomic::{read_json_opt, write_json_atomic};
use crate::error::StoreError;
use crate::layout::StateLayout;
use harness_core::{MetricsRecord, SessionId};

#[derive(Debug, Clone)]
pub struct MetricsStore {
    layout: StateLayout,
}

impl MetricsStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn write(&self, session_id: &SessionId, record: &MetricsRecord) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.metrics_path(session_id), record)
    }

    pub fn read(&self, session_id: &SessionId) -> Result<Option<MetricsRecord>, StoreError> {
        read_json_opt(&self.layout.metrics_path(session_id))
    }
}

#[cfg(test)]
#[path = "metrics_store_tests.rs"]
mod tests;
