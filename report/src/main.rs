//! Vendas CLI - per-category sales reports
//!
//! # Main Commands
//!
//! ```bash
//! vendas fetch                      # Query the database, save a snapshot, build the report
//! vendas report                     # Build the report from the latest snapshot
//! vendas report --csv export.csv    # Build the report from a CSV export
//! ```
//!
//! # Snapshot and Debug Commands
//!
//! ```bash
//! vendas snapshot list              # List Parquet snapshots, newest first
//! vendas snapshot delete <NAME>     # Delete a snapshot
//! vendas inspect <PATH>             # Show columns, kinds and first rows
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vendas::config::DEFAULT_QUERY_PATH;
use vendas::logs::{log_info, log_success, log_warning};
use vendas::{
    fetch_records, load_cached_table, load_csv_file, read_query_file, run_report, DatabaseConfig,
    save_snapshot, ExportOutcome, RecordTable, ReportOptions, SnapshotStore,
};

#[derive(Parser)]
#[command(name = "vendas")]
#[command(about = "Classify sales records and export per-category unit-by-month reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the report from a snapshot (latest by default) or a CSV export
    Report {
        /// Parquet snapshot to read
        #[arg(short, long, conflicts_with = "csv")]
        snapshot: Option<PathBuf>,

        /// CSV export to read
        #[arg(short, long)]
        csv: Option<PathBuf>,

        /// Output directory (default: VENDAS_OUTPUT_DIR or ./output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the sales query, save a snapshot and build the report
    Fetch {
        /// SQL file to run
        #[arg(short, long, default_value = DEFAULT_QUERY_PATH)]
        query: PathBuf,

        /// Only save the snapshot
        #[arg(long)]
        no_report: bool,

        /// Output directory (default: VENDAS_OUTPUT_DIR or ./output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage Parquet snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Show the columns, kinds and first rows of a snapshot or CSV file
    Inspect {
        /// Parquet or CSV file
        path: PathBuf,

        /// Number of rows to show
        #[arg(short, long, default_value = "5")]
        rows: usize,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List snapshots, newest first
    List,

    /// Delete a snapshot
    Delete {
        /// Snapshot file name
        name: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut options = ReportOptions::from_env();

    let result = match cli.command {
        Commands::Report {
            snapshot,
            csv,
            output,
        } => {
            if let Some(dir) = output {
                options.output_dir = dir;
            }
            cmd_report(snapshot.as_deref(), csv.as_deref(), &options)
        }

        Commands::Fetch {
            query,
            no_report,
            output,
        } => {
            if let Some(dir) = output {
                options.output_dir = dir;
            }
            cmd_fetch(&query, no_report, &options).await
        }

        Commands::Snapshot { action } => cmd_snapshot(action, &options),

        Commands::Inspect { path, rows } => cmd_inspect(&path, rows),
    };

    if let Err(e) = result {
        tracing::error!("✗ {}", e);
        std::process::exit(1);
    }
}

fn cmd_report(
    snapshot: Option<&Path>,
    csv: Option<&Path>,
    options: &ReportOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = match (snapshot, csv) {
        (_, Some(csv)) => load_csv_file(csv)?.table,
        (Some(path), None) => load_cached_table(path)?,
        (None, None) => {
            let latest = SnapshotStore::with_dir(&options.snapshot_dir).latest()?;
            log_info(format!("Using latest snapshot: {}", latest.name));
            load_cached_table(&latest.path)?
        }
    };
    build_report(&table, options)
}

async fn cmd_fetch(
    query_path: &Path,
    no_report: bool,
    options: &ReportOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    let query = read_query_file(query_path).await?;
    log_info(format!("Query loaded from {}", query_path.display()));

    let table = fetch_records(&config, &query).await?;
    if table.is_empty() {
        log_warning("No records returned; nothing saved or exported");
        return Ok(());
    }

    save_snapshot(&table, &options.snapshot_dir)?;
    if no_report {
        return Ok(());
    }
    build_report(&table, options)
}

fn build_report(table: &RecordTable, options: &ReportOptions) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = run_report(table, options)?;

    for skipped in &outcome.skipped {
        log_warning(format!("Skipped {}: {}", skipped.category, skipped.reason));
    }
    if outcome.overall.is_some() {
        log_warning("No category tables; the report covers the whole table");
    }
    match &outcome.export {
        ExportOutcome::Workbook(path) => {
            log_success(format!("Report: {}", path.display()));
        }
        ExportOutcome::DelimitedFiles(paths) => {
            log_success(format!("Report written as {} CSV files:", paths.len()));
            for path in paths {
                println!("  {}", path.display());
            }
        }
    }
    Ok(())
}

fn cmd_snapshot(action: SnapshotAction, options: &ReportOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store = SnapshotStore::with_dir(&options.snapshot_dir);

    match action {
        SnapshotAction::List => {
            let snapshots = store.list()?;
            if snapshots.is_empty() {
                log_info(format!("No snapshots in {}", store.dir().display()));
                log_info("Use 'vendas fetch' to create one.");
                return Ok(());
            }

            println!("Snapshots in {} ({}):\n", store.dir().display(), snapshots.len());
            for s in snapshots {
                println!("  {}", s.name);
                println!("     Modified: {}", s.modified.format("%Y-%m-%d %H:%M:%S"));
                println!("     Size: {:.1} KiB", s.size_bytes as f64 / 1024.0);
            }
        }

        SnapshotAction::Delete { name } => {
            store.delete(&name)?;
            log_success(format!("Snapshot deleted: {}", name));
        }
    }

    Ok(())
}

fn cmd_inspect(path: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    let table = if path.extension().is_some_and(|e| e == "parquet") {
        load_cached_table(path)?
    } else {
        load_csv_file(path)?.table
    };

    println!("{}: {} rows, {} columns\n", path.display(), table.num_rows(), table.num_columns());
    for column in table.columns() {
        println!("  {:<30} {}", column.name, column.kind());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&table.to_json_rows(rows))?);
    Ok(())
}
