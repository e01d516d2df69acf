// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use harness_core::WorkId;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("work item {0} already claimed")]
    Conflict(WorkId),

    #[error("work item {0} no longer in queue")]
    Gone(WorkId),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl QueueError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().display().to_string(), source }
    }

    pub(crate) fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json { path: path.as_ref().display().to_string(), source }
    }
}
