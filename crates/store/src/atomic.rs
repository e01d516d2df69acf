// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file writes: write to a sibling temp file, then rename over
//! the target. Readers never observe a partially written record.
//! Grounded in the teacher's snapshot backup-rotation idiom
//! (`daemon/src/storage/snapshot.rs::rotate_bak_path`), simplified here
//! since the harness has no snapshot/WAL layer to coordinate with.

use crate::error::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;

/// Write `contents` to `path` atomically, creating parent directories
/// as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(display.clone(), e))?;
    }
    let tmp_path = path.with_extension(format!(
        "tmp.{}.{}",
        std::process::id(),
        fs_tmp_suffix(path)
    ));
    fs::write(&tmp_path, contents).map_err(|e| StoreError::io(display.clone(), e))?;
    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(display, e))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::json(path.display().to_string(), e))?;
    write_atomic(path, &bytes)
}

/// Read and parse a JSON record. Returns `Ok(None)` if the file doesn't
/// exist rather than erroring — most records are optional until first
/// written.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::json(path.display().to_string(), e))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path.display().to_string(), e)),
    }
}

/// Read a small text file's trimmed contents, or `None` if absent.
pub fn read_string_opt(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path.display().to_string(), e)),
    }
}

/// Append one line to a log file, creating it (and parents) if absent.
/// Used for the append-only event/error/iteration logs, which have
/// exactly one writer by construction and so need no locking.
pub fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
    use std::io::Write;
    let display = path.display().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(display.clone(), e))?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(display.clone(), e))?;
    writeln!(file, "{line}").map_err(|e| StoreError::io(display, e))?;
    Ok(())
}

fn fs_tmp_suffix(path: &Path) -> u128 {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let _ = path;
    COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as u128
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
