//! Backup Catalog - Main entry point

use anyhow::Result;
use backup_catalog::commands::{self, list::Scope};
use backup_catalog::{config::Config, utils};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print local and/or remote backups
    List {
        /// local, remote or all
        #[arg(default_value = "all")]
        location: Scope,

        /// latest, previous or all (aliases: last, l, prev, penult, p)
        #[arg(default_value = "all")]
        mode: String,

        /// Skip metadata.json for remote backups older than the newest one
        #[arg(long)]
        fast: bool,
    },
    /// Upload a local backup to remote storage
    Upload {
        name: String,

        /// Discover files and print the plan without uploading
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(config_path) = args.config {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::debug!("backup-catalog v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let signal_handle = utils::signal::cancel_on_signal(cancel.clone());

    let result = match args.command {
        Command::List {
            location,
            mode,
            fast,
        } => {
            let mut stdout = std::io::stdout().lock();
            commands::list::run(&config, location, &mode, !fast, &mut stdout, &cancel).await
        }
        Command::Upload { name, dry_run } => commands::upload::run(&config, &name, dry_run, &cancel)
            .await
            .map(|_| ())
            .map_err(Into::into),
    };

    signal_handle.abort();
    result
}
