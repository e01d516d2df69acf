// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("io error: {0}")]
    Io(String),

    #[error("worktree setup failed at {path}: {reason}")]
    Worktree { path: String, reason: String },

    #[error("failed to launch agent process: {0}")]
    Launch(String),

    #[error(transparent)]
    Store(#[from] harness_store::StoreError),
}

impl SpawnError {
    pub(crate) fn worktree(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Worktree { path: path.as_ref().display().to_string(), reason: reason.into() }
    }
}
