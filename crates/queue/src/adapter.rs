// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Work Queue Adapter (C2): filesystem-backed, hard-link claims.
//!
//! A work item lives at `state/queue/<work_id>.json` until claimed or
//! completed. Claiming creates a hard link at
//! `state/claims/<work_id>:<agent_id>` pointing at the same inode;
//! `fs::hard_link` fails with `AlreadyExists` when another agent holds
//! the claim, which is what makes claim atomic without a lock file.

use crate::error::QueueError;
use harness_core::{AgentId, WorkId, WorkItem};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct QueueAdapter {
    queue_dir: PathBuf,
    claims_dir: PathBuf,
}

impl QueueAdapter {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self { queue_dir: base.join("state/queue"), claims_dir: base.join("state/claims") }
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    pub fn claims_dir(&self) -> &Path {
        &self.claims_dir
    }

    fn queue_path(&self, work_id: &WorkId) -> PathBuf {
        self.queue_dir.join(format!("{work_id}.json"))
    }

    fn claim_path(&self, work_id: &WorkId, agent_id: &AgentId) -> PathBuf {
        self.claims_dir.join(format!("{work_id}:{agent_id}"))
    }

    /// Add a work item to the queue. Not part of the four-operation
    /// contract but needed by whatever produces work.
    pub fn enqueue(&self, item: &WorkItem) -> Result<(), QueueError> {
        fs::create_dir_all(&self.queue_dir).map_err(|e| QueueError::io(&self.queue_dir, e))?;
        let path = self.queue_path(&item.id);
        let bytes = serde_json::to_vec_pretty(item).map_err(|e| QueueError::json(&path, e))?;
        write_atomic(&path, &bytes)
    }

    /// Non-blocking, non-mutating count of unclaimed work.
    pub fn check(&self) -> Result<usize, QueueError> {
        Ok(self.unclaimed_items()?.len())
    }

    /// Highest priority, earliest-created unclaimed item, without
    /// claiming it.
    pub fn next(&self) -> Result<Option<WorkItem>, QueueError> {
        let mut items = self.unclaimed_items()?;
        items.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at_epoch.cmp(&b.created_at_epoch)));
        Ok(items.into_iter().next())
    }

    /// Atomically claim `work_id` for `agent_id`. Fails with
    /// [`QueueError::Conflict`] if another agent already holds the
    /// claim, or [`QueueError::Gone`] if the item isn't queued.
    pub fn claim(&self, work_id: &WorkId, agent_id: &AgentId) -> Result<(), QueueError> {
        let src = self.queue_path(work_id);
        if !src.exists() {
            return Err(QueueError::Gone(work_id.clone()));
        }
        fs::create_dir_all(&self.claims_dir).map_err(|e| QueueError::io(&self.claims_dir, e))?;
        let dst = self.claim_path(work_id, agent_id);
        match fs::hard_link(&src, &dst) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(QueueError::Conflict(work_id.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(QueueError::Gone(work_id.clone())),
            Err(e) => Err(QueueError::io(&dst, e)),
        }
    }

    /// Drop the claim on `work_id` without removing it from the queue,
    /// so another agent may claim it again. Idempotent.
    pub fn release(&self, work_id: &WorkId) -> Result<(), QueueError> {
        for claim in self.claims_for(work_id)? {
            remove_file_ignoring_missing(&claim)?;
        }
        Ok(())
    }

    /// Remove a work item from the queue entirely, along with any
    /// claim on it. Called on successful completion. Idempotent.
    pub fn complete(&self, work_id: &WorkId) -> Result<(), QueueError> {
        self.release(work_id)?;
        remove_file_ignoring_missing(&self.queue_path(work_id))
    }

    /// Every `(work_id, agent_id)` pair currently holding a claim,
    /// parsed from claim filenames. Used by pool maintenance to find
    /// claims whose owning agent has gone stale.
    pub fn claimed_pairs(&self) -> Result<Vec<(WorkId, AgentId)>, QueueError> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.claims_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(QueueError::io(&self.claims_dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::io(&self.claims_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((work_id, agent_id)) = name.split_once(':') {
                out.push((WorkId::from_string(work_id), AgentId::from_string(agent_id)));
            }
        }
        Ok(out)
    }

    /// Every claim file currently held for `work_id`, regardless of
    /// which agent holds it. Under the claim invariant there's at most
    /// one, but release scans defensively rather than assuming it.
    fn claims_for(&self, work_id: &WorkId) -> Result<Vec<PathBuf>, QueueError> {
        let prefix = format!("{work_id}:");
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.claims_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(QueueError::io(&self.claims_dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::io(&self.claims_dir, e))?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                out.push(entry.path());
            }
        }
        Ok(out)
    }

    /// Work ids currently holding a claim, parsed from claim filenames.
    fn claimed_ids(&self) -> Result<std::collections::HashSet<String>, QueueError> {
        let mut out = std::collections::HashSet::new();
        let entries = match fs::read_dir(&self.claims_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(QueueError::io(&self.claims_dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::io(&self.claims_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((work_id, _agent_id)) = name.split_once(':') {
                out.insert(work_id.to_string());
            }
        }
        Ok(out)
    }

    fn unclaimed_items(&self) -> Result<Vec<WorkItem>, QueueError> {
        let claimed = self.claimed_ids()?;
        let entries = match fs::read_dir(&self.queue_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(QueueError::io(&self.queue_dir, e)),
        };
        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::io(&self.queue_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if claimed.contains(stem) {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| QueueError::io(&path, e))?;
            let item: WorkItem = serde_json::from_slice(&bytes).map_err(|e| QueueError::json(&path, e))?;
            items.push(item);
        }
        Ok(items)
    }
}

fn remove_file_ignoring_missing(path: &Path) -> Result<(), QueueError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(QueueError::io(path, e)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), QueueError> {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let tmp = path.with_extension(format!("json.tmp-{}-{n}", std::process::id()));
    fs::write(&tmp, bytes).map_err(|e| QueueError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| QueueError::io(path, e))
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
