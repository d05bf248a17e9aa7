// src/commands.rs
//! Command handlers for the cmdport CLI

use anyhow::{bail, Result};
use cmdport::{
    BackupManager, RunContext, TranspileEngine, TranspileManifest, TranspileOptions,
    TranspileOutcome,
};
use std::path::{Path, PathBuf};

#[allow(clippy::too_many_arguments)]
pub fn convert(
    source: PathBuf,
    dest: PathBuf,
    dry_run: bool,
    force: bool,
    no_backup: bool,
    backup_dir: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let mut options = TranspileOptions::new(source, dest);
    options.dry_run = dry_run;
    options.force = force;
    options.no_backup = no_backup;
    options.backup_root = backup_dir;

    let engine = TranspileEngine::new(options);
    let mut ctx = RunContext::with_verbosity(verbose);
    let outcome = engine.run(&mut ctx);

    report(&outcome, dry_run);

    if !outcome.success {
        bail!("conversion failed");
    }
    Ok(())
}

fn report(outcome: &TranspileOutcome, dry_run: bool) {
    for warning in &outcome.warnings {
        println!("warning: {}", warning);
    }
    for error in &outcome.errors {
        eprintln!("error: {}", error);
    }

    if !outcome.files.is_empty() {
        let verb = if dry_run { "would write" } else { "wrote" };
        println!("{} {} file(s):", verb, outcome.files.len());
        for file in &outcome.files {
            println!("  {}", file);
        }
    }

    let artifacts = &outcome.artifacts;
    if !artifacts.commands.is_empty() || !artifacts.agents.is_empty() || !artifacts.models.is_empty()
    {
        println!(
            "converted {} command(s), {} agent(s), {} model alias(es)",
            artifacts.commands.len(),
            artifacts.agents.len(),
            artifacts.models.len()
        );
    }

    if let Some(gaps) = &outcome.gaps {
        if !gaps.is_empty() {
            println!("conversion gaps ({}):", gaps.summary());
            for field in &gaps.unmapped_fields {
                match &field.suggestion {
                    Some(suggestion) => println!(
                        "  [{}] {}: {} ({}; {})",
                        field.category, field.source_file, field.field, field.reason, suggestion
                    ),
                    None => println!(
                        "  [{}] {}: {} ({})",
                        field.category, field.source_file, field.field, field.reason
                    ),
                }
            }
            for approx in &gaps.approximations {
                println!(
                    "  [{}] {}: {} -> {} ({})",
                    approx.category,
                    approx.source_file,
                    approx.original,
                    approx.approximated_as,
                    approx.reason
                );
            }
        }
    }

    if let Some(backup) = &outcome.backup_location {
        println!("backup: {}", backup.display());
    }
    if let Some(manifest) = &outcome.manifest_path {
        println!("manifest: {}", manifest.display());
    }
}

pub fn status(dest: &Path) -> Result<()> {
    let path = TranspileManifest::path_for(dest);
    match TranspileManifest::load(&path) {
        Ok(manifest) => {
            println!("last run:    {}", manifest.last_run.timestamp);
            println!("source hash: {}", manifest.last_run.source_hash);
            println!("output hash: {}", manifest.last_run.output_hash);
            match &manifest.last_run.backup {
                Some(backup) => println!("backup:      {}", backup.location),
                None => println!("backup:      none"),
            }
            println!("mappings:    {}", manifest.mappings.len());
            Ok(())
        }
        Err(_) => {
            println!("no previous run recorded at {}", path.display());
            Ok(())
        }
    }
}

pub fn backups(dest: &Path, backup_dir: Option<PathBuf>) -> Result<()> {
    let manager = manager_for(dest, backup_dir);
    let listed = manager.list_backups()?;
    if listed.is_empty() {
        println!("no backups found under {}", manager.backup_root().display());
        return Ok(());
    }
    for backup in listed {
        println!("{}", backup.display());
    }
    Ok(())
}

pub fn restore(backup: &str, dest: &Path, backup_dir: Option<PathBuf>) -> Result<()> {
    let manager = manager_for(dest, backup_dir);

    let backup_path = {
        let as_path = PathBuf::from(backup);
        if as_path.is_absolute() || as_path.components().count() > 1 {
            as_path
        } else {
            manager.backup_root().join(backup)
        }
    };

    if !backup_path.is_dir() {
        bail!("backup not found: {}", backup_path.display());
    }

    let restored = manager.restore(&backup_path)?;
    println!(
        "restored {} file(s) from {}",
        restored,
        backup_path.display()
    );
    Ok(())
}

fn manager_for(dest: &Path, backup_dir: Option<PathBuf>) -> BackupManager {
    let backup_root = backup_dir.unwrap_or_else(|| dest.join(".cmdport/backups"));
    BackupManager::new(dest, backup_root)
}
