// src/error.rs

//! Crate-wide error type and result alias
//!
//! Pipeline-stage failures carry their stage in the variant so callers can
//! apply the right policy: parse/transform/emit errors are terminal with no
//! side effects, write failures trigger rollback, and backup/manifest
//! failures degrade to warnings.

use thiserror::Error;

/// Errors produced by the transpile pipeline and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Emit error: {0}")]
    Emit(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Backup error: {0}")]
    Backup(String),

    /// A backed-up copy no longer matches its recorded hash. Restore of that
    /// file is aborted rather than propagating bad bytes.
    #[error("Backup corrupted for '{path}': {reason}")]
    BackupCorrupted { path: String, reason: String },

    #[error("Restore error: {0}")]
    Restore(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
