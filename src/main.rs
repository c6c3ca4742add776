//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest store pipeline.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{persist_new_markers, store, PartialStore, StoreSelection};
use catalog_harvest::output::{load_snapshot, load_statistics, print_statistics, save_snapshot};
use catalog_harvest::storage::{RunKind, SqliteStorage, Storage};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a resumable catalog harvester
///
/// Catalog-Harvest imports the products captured by a catalog scan and pushes
/// each of them through a fetch-then-submit pipeline against a remote store,
/// retrying every product a bounded number of times.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be stored without storing
    #[arg(long, conflicts_with_all = ["stats", "import", "export_snapshot"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "import", "export_snapshot"])]
    stats: bool,

    /// Import new products from the snapshot file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_snapshot"])]
    import: bool,

    /// Write every scanned product to the snapshot file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "import"])]
    export_snapshot: bool,

    /// Use this snapshot file instead of the configured one
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Only store products without a successful store
    #[arg(long)]
    only_new: bool,

    /// Store only one half of the products (first-half or second-half)
    #[arg(long, value_name = "HALF")]
    partial: Option<PartialStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let snapshot_path = cli
        .snapshot
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.snapshot_path));
    let selection = StoreSelection {
        only_new: cli.only_new,
        partial: cli.partial,
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &selection)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.import {
        handle_import(&config, &config_hash, &snapshot_path)?;
    } else if cli.export_snapshot {
        handle_export_snapshot(&config, &snapshot_path)?;
    } else {
        handle_store(&config, config_hash, &selection).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))
}

/// Handles the --dry-run mode: validates config and shows what would be stored
fn handle_dry_run(config: &Config, selection: &StoreSelection) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Scan Configuration:");
    println!("  Max iterations: {}", config.scan.max_iterations);
    println!("  Retry pause: {}ms", config.scan.retry_pause_ms);

    println!("\nDispatch Configuration:");
    println!("  Batch size: {}", config.dispatch.batch_size);
    println!("  Max attempts: {}", config.dispatch.max_attempts);
    println!("  Stagger: {}ms", config.dispatch.stagger_ms);
    println!("  Batch pause: {}ms", config.dispatch.batch_pause_ms);
    println!("  Warm-up requests: {}", config.dispatch.warm_up_requests);

    println!("\nRemote:");
    println!("  Fetch: {}", config.remote.fetch_url_template);
    println!("  Submit: {}", config.remote.submit_url);
    println!("  Timeout: {}s", config.remote.timeout_secs);
    match &config.remote.rotate_command {
        Some(command) => println!("  Rotate command: {}", command),
        None => println!("  Rotate command: (none)"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Snapshot: {}", config.output.snapshot_path);

    println!("\n✓ Configuration is valid");

    if Path::new(&config.output.database_path).exists() {
        let storage = open_storage(config)?;
        let mut identities = if selection.only_new {
            storage.list_undispatched_identities()?
        } else {
            storage
                .list_scanned()?
                .into_iter()
                .map(|marker| marker.identity)
                .collect()
        };
        if let Some(partial) = selection.partial {
            identities = partial.sample(identities);
        }
        println!("✓ Would store {} products", identities.len());
    } else {
        println!("✓ No database yet, nothing to store");
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --import mode: persists the snapshot's new products
fn handle_import(config: &Config, config_hash: &str, snapshot_path: &Path) -> anyhow::Result<()> {
    let markers = load_snapshot(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    let mut storage = open_storage(config)?;
    let run_id = storage.create_run(RunKind::Import, config_hash)?;
    let inserted = persist_new_markers(&mut storage, &markers, run_id)?;
    storage.complete_run(run_id)?;

    println!(
        "✓ Imported {} new products ({} in snapshot)",
        inserted,
        markers.len()
    );

    Ok(())
}

/// Handles the --export-snapshot mode: writes every scanned product to the snapshot
fn handle_export_snapshot(config: &Config, snapshot_path: &Path) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let markers = storage.list_scanned()?;
    save_snapshot(snapshot_path, &markers)?;

    println!(
        "✓ Exported {} products to: {}",
        markers.len(),
        snapshot_path.display()
    );

    Ok(())
}

/// Handles the main store operation
async fn handle_store(
    config: &Config,
    config_hash: String,
    selection: &StoreSelection,
) -> anyhow::Result<()> {
    tracing::info!(
        "Starting store (only new: {}, partial: {:?})",
        selection.only_new,
        selection.partial
    );

    match store(config, config_hash, selection).await {
        Ok(summary) => {
            tracing::info!(
                "Store completed: {} of {} products stored",
                summary.success.len(),
                summary.attempted
            );
            if !summary.failed.is_empty() {
                println!("Failed products ({}):", summary.failed.len());
                for identity in &summary.failed {
                    println!("  - {}", identity);
                }
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Store failed: {}", e);
            Err(e.into())
        }
    }
}
