//! # Vendas - per-category sales and workload reports
//!
//! Loads sales records (database query, Parquet snapshot or CSV export),
//! classifies every record into one of four fixed categories, derives the
//! hours each record represents, and exports unit-by-month pivots per category.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Postgres / │────▶│  Normalize  │────▶│  Aggregate  │────▶│  Workbook   │
//! │ Parquet/CSV │     │  Classify   │     │  + Pivot    │     │ (CSV backup)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vendas::{load_cached_table, run_report, ReportOptions};
//! use std::path::Path;
//!
//! let table = load_cached_table(Path::new("output/dados_vendas_20240131_101500.parquet"))?;
//! let outcome = run_report(&table, &ReportOptions::default())?;
//! println!("{:?}", outcome.export);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, tables, categories, metrics, periods
//! - [`config`] - Report options and database settings
//! - [`logs`] - Logging helpers over `tracing`
//! - [`parser`] - CSV loading with auto-detection
//! - [`cache`] - Parquet snapshots
//! - [`database`] - PostgreSQL source
//! - [`transform`] - Classification, hours, aggregation, pivoting, pipeline
//! - [`validation`] - Prepared-data checks
//! - [`export`] - Workbook and CSV output

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Sources
pub mod cache;
pub mod database;
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Output
pub mod export;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError, ExportResult, PipelineError, PipelineResult, SourceError, SourceResult,
    TransformError, TransformResult,
};

// =============================================================================
// Re-exports - Models and configuration
// =============================================================================

pub use config::{DatabaseConfig, ReportOptions};
pub use models::{CategoryTables, Cell, Classification, Column, ColumnKind, Metric, Period, RecordTable};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use cache::{load_cached_table, save_snapshot, save_table, SnapshotInfo, SnapshotStore};
pub use database::{fetch_records, read_query_file};
pub use parser::{load_csv_file, parse_bytes_auto, ParsedTable};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use export::{export_overall, export_report, ExportOutcome};
pub use transform::pipeline::{
    build_category_tables, build_overall_tables, prepare_for_report, run_report, CategoryReport,
    ReportOutcome, SkippedCategory,
};
pub use validation::validate_prepared;
