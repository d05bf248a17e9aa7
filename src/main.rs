// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            source,
            dest,
            dry_run,
            force,
            no_backup,
            backup_dir,
        } => commands::convert(
            source,
            dest,
            dry_run,
            force,
            no_backup,
            backup_dir,
            cli.verbose,
        ),
        Commands::Status { dest } => commands::status(&dest),
        Commands::Backups { dest, backup_dir } => commands::backups(&dest, backup_dir),
        Commands::Restore {
            backup,
            dest,
            backup_dir,
        } => commands::restore(&backup, &dest, backup_dir),
    }
}
