//! Sincro configuration synchronization CLI.
//!
//! Compares and synchronizes two file-backed configuration stores: the
//! "active" store governing the running system, and the "sync" store
//! holding the staged, desired state.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sincro_engine::config::Config;
use sincro_engine::{Change, FileStorage, Snapshot, Synchronizer, YamlSerializer, diff, export};

#[derive(Parser)]
#[command(name = "sincro", version, about = "Configuration synchronization engine")]
struct Cli {
    /// Active store directory (overrides SINCRO_ACTIVE_DIR).
    #[arg(long, global = true)]
    active_dir: Option<PathBuf>,

    /// Sync store directory (overrides SINCRO_SYNC_DIR).
    #[arg(long, global = true)]
    sync_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the change set between the active and sync stores.
    Diff {
        /// Emit the change set as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Import the sync store into the active store.
    Import {
        /// Compute and print the plan without applying anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Export the active store into the sync directory.
    Export {
        /// Remove sync files with no counterpart in the active store.
        #[arg(long)]
        clean: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.active_dir {
        config.active_dir = dir;
    }
    if let Some(dir) = cli.sync_dir {
        config.sync_dir = dir;
    }

    let active = FileStorage::new(&config.active_dir);
    let sync = FileStorage::new(&config.sync_dir);
    let serializer = YamlSerializer;

    match cli.command {
        Command::Diff { json } => {
            let active_snapshot = Snapshot::load(&active, &serializer).await?;
            let sync_snapshot = Snapshot::load(&sync, &serializer).await?;
            let changes = diff(&active_snapshot, &sync_snapshot);

            if json {
                println!("{}", serde_json::to_string_pretty(&changes.changes())?);
            } else if changes.is_empty() {
                println!("Active store already matches sync store.");
            } else {
                print_change_table(&changes.changes());
            }
        }

        Command::Import { dry_run } => {
            let synchronizer = Synchronizer::new(&active, &sync, &serializer);

            if dry_run {
                let (changes, ordered) = synchronizer.preview().await?;
                if changes.is_empty() {
                    println!("Nothing to import.");
                } else {
                    println!("Import plan ({} operations):", ordered.len());
                    print_change_table(&ordered);
                }
                return Ok(());
            }

            let report = synchronizer.run().await?;
            info!(state = %report.state(), "Run finished");

            println!(
                "Applied {} of {} operations.",
                report.result.applied.len(),
                report.change_set.len()
            );
            if let Some(failure) = &report.result.failure {
                println!("Failed:      {}", failure.change);
                for change in &report.result.unattempted {
                    println!("Unattempted: {change}");
                }
                bail!("import failed on '{}': {}", failure.change, failure.error);
            }
        }

        Command::Export { clean } => {
            let result = export(&active, &sync, &serializer, clean).await?;
            println!(
                "Exported {} documents to {} ({} stale removed).",
                result.written,
                config.sync_dir.display(),
                result.removed
            );
        }
    }

    Ok(())
}

fn print_change_table(changes: &[Change]) {
    println!("{:<10} {:<24} DOCUMENT", "OPERATION", "COLLECTION");
    println!("{}", "-".repeat(60));
    for change in changes {
        let collection = if change.collection.is_empty() {
            "(default)"
        } else {
            &change.collection
        };
        println!("{:<10} {:<24} {}", change.op, collection, change.name);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
