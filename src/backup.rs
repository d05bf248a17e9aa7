// src/backup.rs

//! Pre-write backup and restore
//!
//! Before the engine overwrites destination files it snapshots them into a
//! timestamped directory with per-file SHA-256 and permission capture. A
//! restore re-hashes every backed-up copy first and refuses to propagate a
//! corrupted one. Backups are retained indefinitely; pruning is not this
//! module's concern.

use crate::error::{Error, Result};
use crate::hash::{sha256_file, verify_file};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BACKUP_MANIFEST_NAME: &str = "manifest.json";

/// One backed-up file record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFileEntry {
    /// Path relative to the destination root
    pub path: String,
    pub hash: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// Manifest written alongside the copies in each backup directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub timestamp: DateTime<Utc>,
    /// What the backup was taken for (e.g. the source tree being converted)
    pub source: String,
    pub files: Vec<BackupFileEntry>,
}

/// Snapshots and restores destination files around the write phase
pub struct BackupManager {
    destination_root: PathBuf,
    backup_root: PathBuf,
}

impl BackupManager {
    pub fn new(destination_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
            backup_root: backup_root.into(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Back up every listed path that exists under the destination root
    ///
    /// Non-existent paths are skipped without error, so a first run against
    /// an empty destination produces an empty (but valid) backup. Returns
    /// the backup directory path.
    pub fn backup(&self, relative_paths: &[String], source_ref: &str) -> Result<PathBuf> {
        let timestamp = Utc::now();
        let backup_dir = self.allocate_backup_dir(&timestamp)?;

        let mut files = Vec::new();
        for relative in relative_paths {
            let live = self.destination_root.join(relative);
            if !live.is_file() {
                continue;
            }

            let hash = sha256_file(&live)?;
            let metadata = fs::metadata(&live)?;
            let copy = backup_dir.join(relative);
            if let Some(parent) = copy.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&live, &copy)?;

            files.push(BackupFileEntry {
                path: relative.clone(),
                hash,
                size: metadata.len(),
                mode: file_mode(&metadata),
            });
        }

        debug!(
            "backed up {} file(s) into {}",
            files.len(),
            backup_dir.display()
        );

        let manifest = BackupManifest {
            timestamp,
            source: source_ref.to_string(),
            files,
        };
        let mut json = serde_json::to_string_pretty(&manifest)?;
        json.push('\n');
        fs::write(backup_dir.join(BACKUP_MANIFEST_NAME), json)?;

        Ok(backup_dir)
    }

    /// Restore a backup to the live destination tree
    ///
    /// Every copy is re-hashed against the manifest before it is applied; a
    /// mismatch aborts with [`Error::BackupCorrupted`] so corrupted bytes
    /// never reach the destination. Returns the number of files restored.
    pub fn restore(&self, backup_dir: &Path) -> Result<usize> {
        let manifest_path = backup_dir.join(BACKUP_MANIFEST_NAME);
        let manifest_text = fs::read_to_string(&manifest_path)
            .map_err(|e| Error::Restore(format!("cannot read {}: {}", manifest_path.display(), e)))?;
        let manifest: BackupManifest = serde_json::from_str(&manifest_text)
            .map_err(|e| Error::Restore(format!("corrupt backup manifest: {}", e)))?;

        let mut restored = 0;
        for entry in &manifest.files {
            let copy = backup_dir.join(&entry.path);
            match verify_file(&copy, &entry.hash)? {
                Ok(()) => {}
                Err(mismatch) => {
                    return Err(Error::BackupCorrupted {
                        path: entry.path.clone(),
                        reason: mismatch.to_string(),
                    });
                }
            }

            let live = self.destination_root.join(&entry.path);
            if let Some(parent) = live.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&copy, &live)?;
            apply_mode(&live, entry.mode)?;
            restored += 1;
        }

        debug!("restored {} file(s) from {}", restored, backup_dir.display());
        Ok(restored)
    }

    /// All backup directories, newest first
    ///
    /// Directory names are timestamp-derived, so lexicographic descending
    /// order is chronological descending order.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.backup_root)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.path())
            .collect();
        dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(dirs)
    }

    /// Best-effort removal of files written by a failed attempt
    ///
    /// Not-found errors are swallowed; anything else is returned as a
    /// warning string. Used only on the engine's failure path.
    pub fn cleanup_written_files(&self, relative_paths: &[String]) -> Vec<String> {
        let mut warnings = Vec::new();
        for relative in relative_paths {
            let live = self.destination_root.join(relative);
            match fs::remove_file(&live) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warnings.push(format!("could not remove {}: {}", live.display(), e)),
            }
        }
        warnings
    }

    fn allocate_backup_dir(&self, timestamp: &DateTime<Utc>) -> Result<PathBuf> {
        let base = timestamp.format("%Y%m%d-%H%M%S-%3f").to_string();
        let mut dir = self.backup_root.join(&base);
        let mut counter = 0u32;
        while dir.exists() {
            counter += 1;
            dir = self.backup_root.join(format!("{}-{}", base, counter));
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, BackupManager) {
        let root = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(root.path().join("dest"), root.path().join("backups"));
        fs::create_dir_all(root.path().join("dest")).unwrap();
        (root, manager)
    }

    #[test]
    fn test_backup_round_trip_restores_bytes_and_mode() {
        let (root, manager) = setup();
        let dest = root.path().join("dest");
        fs::create_dir_all(dest.join("commands")).unwrap();
        fs::write(dest.join("commands/a.json"), b"original").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dest.join("commands/a.json"), fs::Permissions::from_mode(0o640))
                .unwrap();
        }

        let backup_dir = manager
            .backup(&["commands/a.json".to_string()], "test-source")
            .unwrap();

        fs::write(dest.join("commands/a.json"), b"clobbered").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dest.join("commands/a.json"), fs::Permissions::from_mode(0o600))
                .unwrap();
        }

        let restored = manager.restore(&backup_dir).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(fs::read(dest.join("commands/a.json")).unwrap(), b"original");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.join("commands/a.json"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o640);
        }
    }

    #[test]
    fn test_backup_skips_nonexistent_files() {
        let (_root, manager) = setup();
        let backup_dir = manager
            .backup(
                &["commands/missing.json".to_string(), "settings.json".to_string()],
                "first-run",
            )
            .unwrap();

        let manifest: BackupManifest = serde_json::from_str(
            &fs::read_to_string(backup_dir.join(BACKUP_MANIFEST_NAME)).unwrap(),
        )
        .unwrap();
        assert!(manifest.files.is_empty());
        assert_eq!(manifest.source, "first-run");
    }

    #[test]
    fn test_restore_detects_corruption() {
        let (root, manager) = setup();
        let dest = root.path().join("dest");
        fs::write(dest.join("settings.json"), b"{}").unwrap();

        let backup_dir = manager
            .backup(&["settings.json".to_string()], "src")
            .unwrap();

        // Tamper with the backed-up copy, then mutate the live file
        fs::write(backup_dir.join("settings.json"), b"tampered").unwrap();
        fs::write(dest.join("settings.json"), b"live-edit").unwrap();

        let err = manager.restore(&backup_dir).unwrap_err();
        assert!(matches!(err, Error::BackupCorrupted { ref path, .. } if path == "settings.json"));
        // The corrupted entry was not applied
        assert_eq!(fs::read(dest.join("settings.json")).unwrap(), b"live-edit");
    }

    #[test]
    fn test_list_backups_newest_first() {
        let (_root, manager) = setup();
        let first = manager.backup(&[], "a").unwrap();
        let second = manager.backup(&[], "b").unwrap();

        let listed = manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], second);
        assert_eq!(listed[1], first);
    }

    #[test]
    fn test_list_backups_without_root() {
        let (_root, manager) = setup();
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_swallows_not_found() {
        let (root, manager) = setup();
        let dest = root.path().join("dest");
        fs::write(dest.join("a.json"), b"x").unwrap();

        let warnings = manager
            .cleanup_written_files(&["a.json".to_string(), "missing.json".to_string()]);
        assert!(warnings.is_empty());
        assert!(!dest.join("a.json").exists());
    }
}
