// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable Session record access. The Coordinator owns session
//! lifetime and is the only caller that writes these paths; Health &
//! Recovery writes through the same type but never concurrently (one
//! session is live at a time per slot).

use crate::atomic::{read_json_opt, write_json_atomic};
use crate::error::StoreError;
use crate::layout::StateLayout;
use harness_core::{AgentId, Session, SessionId};

#[derive(Debug, Clone)]
pub struct SessionStore {
    layout: StateLayout,
}

impl SessionStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    /// Serial variant: the single "current session" pointer.
    pub fn write_current(&self, session: &Session) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.current_session_path(), session)
    }

    pub fn read_current(&self) -> Result<Option<Session>, StoreError> {
        read_json_opt(&self.layout.current_session_path())
    }

    pub fn clear_current(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(self.layout.current_session_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(
                self.layout.current_session_path().display().to_string(),
                e,
            )),
        }
    }

    /// Parallel variant: one record per agent slot.
    pub fn write_agent_status(&self, agent_id: &AgentId, session: &Session) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.agent_status_path(agent_id), session)
    }

    pub fn read_agent_status(&self, agent_id: &AgentId) -> Result<Option<Session>, StoreError> {
        read_json_opt(&self.layout.agent_status_path(agent_id))
    }

    /// Copy a session's final record to its archive path. Idempotent
    /// (R2): re-archiving the same session value produces byte-identical
    /// output since serialization is deterministic.
    pub fn archive(&self, session: &Session) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.docs_archive_path(&session.session_id), session)
    }

    pub fn read_archive(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        read_json_opt(&self.layout.docs_archive_path(session_id))
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
