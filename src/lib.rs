// src/lib.rs

//! cmdport
//!
//! Converts one AI-assistant platform's markdown command specifications into
//! another platform's JSON-based configuration, without ever leaving the
//! destination in a worse state than it found it.
//!
//! # Architecture
//!
//! - Pipeline: parse -> transform -> emit -> write, strictly sequential
//! - Idempotency gate: a content hash of the source tree skips unchanged runs
//! - Backup-before-overwrite: destination files are snapshotted with SHA-256
//!   and permission capture, and restored if the write phase fails
//! - Gap ledger: every unmapped or approximated field is recorded, never
//!   silently dropped

pub mod backup;
pub mod context;
pub mod emit;
mod error;
pub mod hash;
pub mod idempotency;
pub mod manifest;
pub mod parser;
pub mod schema;
pub mod transform;
pub mod transpile;

pub use backup::{BackupManager, BackupManifest};
pub use context::RunContext;
pub use error::{Error, Result};
pub use idempotency::{check_freshness, check_idempotency, take_snapshot, FileSnapshot, Freshness};
pub use manifest::{ManifestMapping, TranspileManifest, MANIFEST_RELATIVE_PATH};
pub use transform::{destination_name, GapCategory, GapLedger, Transformer};
pub use transpile::{
    ArtifactNames, TranspileEngine, TranspileOptions, TranspileOutcome, TranspileState,
};
