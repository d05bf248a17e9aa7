// src/idempotency.rs

//! Idempotency gate
//!
//! Decides whether a run needs to happen at all. Two independent mechanisms:
//!
//! - A whole-tree hash check against the persisted transpile manifest. Coarse
//!   by design: any single-byte change anywhere forces a full re-run.
//! - A snapshot diff over `{path, mtime}` records, used as a secondary
//!   freshness signal with a fixed five-step priority order.

use crate::hash::hash_directory;
use crate::manifest::TranspileManifest;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Outcome of the whole-tree hash check
#[derive(Debug, Clone)]
pub struct IdempotencyDecision {
    /// Whether the pipeline should run
    pub should_run: bool,
    pub reason: String,
    /// Hash of the current source tree, reusable by the caller
    pub current_hash: String,
}

/// Compare the current source tree against the last persisted run
///
/// A missing or unreadable manifest always regenerates; the gate fails open.
pub fn check_idempotency(source_path: &Path, manifest_path: &Path) -> io::Result<IdempotencyDecision> {
    let current_hash = hash_directory(source_path)?;

    let previous = match TranspileManifest::load(manifest_path) {
        Ok(manifest) => manifest,
        Err(_) => {
            return Ok(IdempotencyDecision {
                should_run: true,
                reason: "no previous manifest".to_string(),
                current_hash,
            });
        }
    };

    if previous.last_run.source_hash != current_hash {
        Ok(IdempotencyDecision {
            should_run: true,
            reason: "source changed".to_string(),
            current_hash,
        })
    } else {
        Ok(IdempotencyDecision {
            should_run: false,
            reason: "source unchanged".to_string(),
            current_hash,
        })
    }
}

/// One file observation in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: i64,
}

/// Verdict of the snapshot diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freshness {
    pub fresh: bool,
    pub reason: String,
}

impl Freshness {
    fn stale(reason: String) -> Self {
        Self { fresh: false, reason }
    }
}

/// Snapshot-diff freshness check with a fixed priority order
///
/// The order below is a documented contract, not an implementation accident:
/// 1. no previous snapshot,
/// 2. file count differs (short-circuits the finer checks),
/// 3. first current path absent from previous,
/// 4. first previous path absent from current,
/// 5. first path whose mtime differs,
/// 6. otherwise fresh.
///
/// When a count-preserving add+remove happens at once, step 3 reports the
/// addition encountered first in current-list iteration order; the tie is
/// left iteration-order dependent on purpose.
pub fn check_freshness(previous: Option<&[FileSnapshot]>, current: &[FileSnapshot]) -> Freshness {
    let Some(previous) = previous else {
        return Freshness::stale("First run".to_string());
    };

    if previous.len() != current.len() {
        return Freshness::stale(format!(
            "File count changed: {} -> {}",
            previous.len(),
            current.len()
        ));
    }

    for snap in current {
        if !previous.iter().any(|p| p.path == snap.path) {
            return Freshness::stale(format!("New file: {}", snap.path));
        }
    }

    for snap in previous {
        if !current.iter().any(|c| c.path == snap.path) {
            return Freshness::stale(format!("Deleted: {}", snap.path));
        }
    }

    for snap in current {
        if let Some(prev) = previous.iter().find(|p| p.path == snap.path) {
            if prev.mtime != snap.mtime {
                return Freshness::stale(format!("Modified: {}", snap.path));
            }
        }
    }

    Freshness {
        fresh: true,
        reason: "No changes detected".to_string(),
    }
}

/// Record the current `{path, mtime}` list for a tree, sorted by path
pub fn take_snapshot(root: &Path) -> io::Result<Vec<FileSnapshot>> {
    let mut snapshots = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let modified = entry.metadata().map_err(io::Error::other)?.modified()?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        snapshots.push(FileSnapshot { path: relative, mtime });
    }

    snapshots.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(snapshots)
}
