// src/manifest.rs

//! Persisted transpile manifest
//!
//! JSON record of the last successful run: source and output hashes for the
//! idempotency gate, the backup it took, and the source-to-target file
//! mappings for traceability. Overwritten on every successful run and read
//! at the start of the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_VERSION: &str = "1.0";

/// Location of the manifest relative to the destination root
pub const MANIFEST_RELATIVE_PATH: &str = ".cmdport/transpile-manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported manifest version: {0}")]
    Version(String),
}

/// Reference to the backup taken before the run's write phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRef {
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// Hashes and backup reference for the last successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRun {
    pub timestamp: DateTime<Utc>,
    pub source_hash: String,
    pub output_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRef>,
}

/// One emitted file traced back to its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMapping {
    pub source: String,
    pub target: String,
    pub transformed: bool,
}

/// The persisted manifest document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranspileManifest {
    pub version: String,
    pub last_run: LastRun,
    pub mappings: Vec<ManifestMapping>,
}

impl TranspileManifest {
    pub fn new(last_run: LastRun, mappings: Vec<ManifestMapping>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            last_run,
            mappings,
        }
    }

    /// The manifest path for a given destination root
    pub fn path_for(destination: &Path) -> PathBuf {
        destination.join(MANIFEST_RELATIVE_PATH)
    }

    /// Load and validate a manifest from disk
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::Version(manifest.version));
        }
        Ok(manifest)
    }

    /// Write the manifest, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }
}
