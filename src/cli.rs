// src/cli.rs
//! CLI definitions for cmdport
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cmdport")]
#[command(author = "cmdport Project")]
#[command(version)]
#[command(about = "Convert AI-assistant command specs with idempotent runs and rollback", long_about = None)]
pub struct Cli {
    /// Verbose progress output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a source command corpus into the destination configuration
    Convert {
        /// Source corpus root directory
        #[arg(short, long)]
        source: PathBuf,

        /// Destination configuration root
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Show what would be written without making changes
        #[arg(long)]
        dry_run: bool,

        /// Run even when the source tree is unchanged
        #[arg(long)]
        force: bool,

        /// Skip the pre-write backup
        #[arg(long)]
        no_backup: bool,

        /// Backup directory root (default: <dest>/.cmdport/backups)
        #[arg(long)]
        backup_dir: Option<PathBuf>,
    },

    /// Show the last-run manifest for a destination
    Status {
        /// Destination configuration root
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },

    /// List available backups, newest first
    Backups {
        /// Destination configuration root
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Backup directory root (default: <dest>/.cmdport/backups)
        #[arg(long)]
        backup_dir: Option<PathBuf>,
    },

    /// Restore a backup into the destination
    Restore {
        /// Backup directory name (timestamp) or full path
        backup: String,

        /// Destination configuration root
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Backup directory root (default: <dest>/.cmdport/backups)
        #[arg(long)]
        backup_dir: Option<PathBuf>,
    },
}
