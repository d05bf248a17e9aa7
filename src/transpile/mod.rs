// src/transpile/mod.rs

//! Transpile engine
//!
//! Sequences the pipeline with atomic-write semantics around the only
//! destructive phase. Key properties:
//!
//! - **Idempotency gate**: an unchanged source tree skips the run entirely
//! - **Backup-before-overwrite**: existing destination files are preserved
//!   before the write phase and restored if it fails
//! - **Gap ledger**: lossy conversions are recorded, never silently dropped
//!
//! # Run Lifecycle
//!
//! ```text
//! IDEMPOTENCY_CHECK -> PARSE -> TRANSFORM -> EMIT -> BACKUP -> WRITE -> MANIFEST_WRITE -> DONE
//!                                              |                  |
//!                                              v                  v
//!                                         (dry-run exit)      ROLLBACK
//! ```
//!
//! Parse, transform, and emit failures are terminal with zero side effects.
//! A write failure deletes everything written in the attempt and restores
//! the backup. Backup and manifest-write failures degrade to warnings; the
//! conversion result itself stands.

use crate::backup::BackupManager;
use crate::context::RunContext;
use crate::emit::{Emission, Emitter};
use crate::hash::hash_directory;
use crate::idempotency::check_idempotency;
use crate::manifest::{BackupRef, LastRun, TranspileManifest, MANIFEST_RELATIVE_PATH};
use crate::parser::parse_source_tree;
use crate::schema::DestinationConfig;
use crate::transform::{GapLedger, Transformer};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for one engine run
#[derive(Debug, Clone)]
pub struct TranspileOptions {
    /// Root of the source command corpus
    pub source_path: PathBuf,
    /// Destination configuration root
    pub destination_dir: PathBuf,
    /// Report what would be written without touching the destination
    pub dry_run: bool,
    /// Run even when the source tree is unchanged
    pub force: bool,
    /// Skip the pre-write backup
    pub no_backup: bool,
    /// Override for the backup directory root
    pub backup_root: Option<PathBuf>,
}

impl TranspileOptions {
    pub fn new(source_path: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_dir: destination_dir.into(),
            dry_run: false,
            force: false,
            no_backup: false,
            backup_root: None,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        TranspileManifest::path_for(&self.destination_dir)
    }

    pub fn backup_root(&self) -> PathBuf {
        self.backup_root
            .clone()
            .unwrap_or_else(|| self.destination_dir.join(".cmdport/backups"))
    }
}

/// Phases of the run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranspileState {
    IdempotencyCheck,
    Parse,
    Transform,
    Emit,
    Backup,
    Write,
    Rollback,
    ManifestWrite,
    Done,
}

/// Per-kind artifact names for reporting
#[derive(Debug, Default, Clone)]
pub struct ArtifactNames {
    pub commands: Vec<String>,
    pub agents: Vec<String>,
    pub models: Vec<String>,
}

impl ArtifactNames {
    fn from_config(config: &DestinationConfig) -> Self {
        Self {
            commands: config.commands.iter().map(|c| c.name.clone()).collect(),
            agents: config.agents.iter().map(|a| a.name.clone()).collect(),
            models: config.settings.model_aliases.keys().cloned().collect(),
        }
    }
}

/// Aggregate result of a run
#[derive(Debug, Default)]
pub struct TranspileOutcome {
    pub success: bool,
    pub backup_location: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Conversion gaps; `None` when the run ended before the transform
    pub gaps: Option<GapLedger>,
    pub artifacts: ArtifactNames,
    /// Relative destination files written, or intended under dry run
    pub files: Vec<String>,
}

/// Runs the transpile pipeline
pub struct TranspileEngine {
    options: TranspileOptions,
}

impl TranspileEngine {
    pub fn new(options: TranspileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TranspileOptions {
        &self.options
    }

    /// Execute the full state machine
    ///
    /// Never panics and never leaves the destination worse than it found
    /// it, unless the rollback itself fails — in which case both failures
    /// are reported together with the backup location.
    pub fn run(&self, ctx: &mut RunContext) -> TranspileOutcome {
        let manifest_path = self.options.manifest_path();

        // -- IdempotencyCheck -------------------------------------------------
        enter(TranspileState::IdempotencyCheck);
        if !self.options.force {
            match check_idempotency(&self.options.source_path, &manifest_path) {
                Ok(decision) if !decision.should_run => {
                    ctx.warn(format!("skipped: {}", decision.reason));
                    return TranspileOutcome {
                        success: true,
                        manifest_path: Some(manifest_path),
                        warnings: ctx.take_warnings(),
                        ..Default::default()
                    };
                }
                Ok(decision) => ctx.info(format!("regenerating: {}", decision.reason)),
                Err(e) => ctx.warn(format!("idempotency check failed ({}); proceeding", e)),
            }
        }

        // -- Parse ------------------------------------------------------------
        enter(TranspileState::Parse);
        let ir = match parse_source_tree(&self.options.source_path, ctx) {
            Ok(ir) => ir,
            Err(parse_errors) => {
                return TranspileOutcome {
                    errors: parse_errors.iter().map(|e| e.to_string()).collect(),
                    warnings: ctx.take_warnings(),
                    ..Default::default()
                };
            }
        };

        // -- Transform --------------------------------------------------------
        enter(TranspileState::Transform);
        let output = match Transformer::new().transform(&ir, ctx) {
            Ok(output) => output,
            Err(transform_errors) => {
                return TranspileOutcome {
                    errors: transform_errors.iter().map(|e| e.to_string()).collect(),
                    warnings: ctx.take_warnings(),
                    ..Default::default()
                };
            }
        };
        let gaps = output.gaps;
        let artifacts = ArtifactNames::from_config(&output.config);

        // -- Emit -------------------------------------------------------------
        enter(TranspileState::Emit);
        let emission = match Emitter::new().emit(&output.config) {
            Ok(emission) => emission,
            Err(emit_errors) => {
                return TranspileOutcome {
                    errors: emit_errors.iter().map(|e| e.to_string()).collect(),
                    warnings: ctx.take_warnings(),
                    gaps: Some(gaps),
                    artifacts,
                    ..Default::default()
                };
            }
        };
        let files = emission.file_names();

        // -- Dry-run short-circuit --------------------------------------------
        if self.options.dry_run {
            ctx.info(format!(
                "dry run: would write {} file(s); {}",
                files.len(),
                gaps.summary()
            ));
            return TranspileOutcome {
                success: true,
                warnings: ctx.take_warnings(),
                gaps: Some(gaps),
                artifacts,
                files,
                ..Default::default()
            };
        }

        // -- Backup -----------------------------------------------------------
        enter(TranspileState::Backup);
        let manager = BackupManager::new(&self.options.destination_dir, self.options.backup_root());
        let mut backup_location = None;
        let mut backup_ref = None;
        if !self.options.no_backup {
            // Everything this run can clobber: the emitted files plus the
            // manifest itself.
            let mut clobberable = files.clone();
            clobberable.push(MANIFEST_RELATIVE_PATH.to_string());

            let source_ref = self.options.source_path.display().to_string();
            match manager.backup(&clobberable, &source_ref) {
                Ok(dir) => {
                    backup_ref = Some(BackupRef {
                        location: dir.display().to_string(),
                        timestamp: Utc::now(),
                    });
                    backup_location = Some(dir);
                }
                Err(e) => {
                    ctx.warn(format!(
                        "backup failed: {}; proceeding WITHOUT a rollback safety net",
                        e
                    ));
                }
            }
        }

        // -- Write ------------------------------------------------------------
        enter(TranspileState::Write);
        let mut written: Vec<String> = Vec::new();
        for (relative, content) in &emission.files {
            match write_one(&self.options.destination_dir, relative, content) {
                Ok(()) => written.push(relative.clone()),
                Err(e) => {
                    enter(TranspileState::Rollback);
                    let mut errors = vec![format!("write failed for {}: {}", relative, e)];
                    self.rollback(&manager, &written, backup_location.as_deref(), &mut errors, ctx);
                    return TranspileOutcome {
                        backup_location,
                        errors,
                        warnings: ctx.take_warnings(),
                        gaps: Some(gaps),
                        artifacts,
                        files,
                        ..Default::default()
                    };
                }
            }
        }
        ctx.info(format!("wrote {} destination file(s)", written.len()));

        // -- ManifestWrite ----------------------------------------------------
        enter(TranspileState::ManifestWrite);
        let manifest_written = match self.write_manifest(&emission, backup_ref, &manifest_path) {
            Ok(()) => true,
            Err(e) => {
                ctx.warn(format!(
                    "manifest write failed: {}; the next run cannot skip on an unchanged source",
                    e
                ));
                false
            }
        };

        enter(TranspileState::Done);
        TranspileOutcome {
            success: true,
            backup_location,
            manifest_path: manifest_written.then_some(manifest_path),
            warnings: ctx.take_warnings(),
            gaps: Some(gaps),
            artifacts,
            files,
            ..Default::default()
        }
    }

    /// Undo a failed write: remove this attempt's files, then restore the
    /// backup. Both steps are best-effort; a restore failure is reported as
    /// an additional error and never masks the write failure.
    fn rollback(
        &self,
        manager: &BackupManager,
        written: &[String],
        backup_dir: Option<&Path>,
        errors: &mut Vec<String>,
        ctx: &mut RunContext,
    ) {
        for warning in manager.cleanup_written_files(written) {
            ctx.warn(warning);
        }

        match backup_dir {
            Some(dir) => match manager.restore(dir) {
                Ok(count) => ctx.info(format!("restored {} file(s) from backup", count)),
                Err(e) => errors.push(format!("restore failed: {}", e)),
            },
            None => ctx.warn("no backup available; destination left as cleaned up".to_string()),
        }
    }

    fn write_manifest(
        &self,
        emission: &Emission,
        backup: Option<BackupRef>,
        manifest_path: &Path,
    ) -> crate::Result<()> {
        let source_hash = hash_directory(&self.options.source_path)?;
        let manifest = TranspileManifest::new(
            LastRun {
                timestamp: Utc::now(),
                source_hash,
                output_hash: hash_emission(emission),
                backup,
            },
            emission.mappings.clone(),
        );
        manifest
            .save(manifest_path)
            .map_err(|e| crate::Error::Manifest(e.to_string()))
    }
}

fn enter(state: TranspileState) {
    debug!("entering state {:?}", state);
}

fn write_one(root: &Path, relative: &str, content: &str) -> std::io::Result<()> {
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, content)
}

/// Digest of the emission, same shape as `hash_directory` but in-memory
///
/// Emission files are already sorted by name, so the digest is stable
/// without re-reading anything from disk.
fn hash_emission(emission: &Emission) -> String {
    let mut hasher = Sha256::new();
    for (name, content) in &emission.files {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
