//! Error types for the sales report pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`SourceError`] - Loading records (CSV, Parquet snapshot, database)
//! - [`TransformError`] - Structural failures inside the transform steps
//! - [`ExportError`] - Workbook and delimited-text serialization
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Value-level coercion problems (an unparsable date, a non-numeric hour)
//! never surface here: they are recovered in place with documented defaults.
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while loading a record table from a collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid delimited-text input.
    #[error("Invalid CSV input at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Parquet reader/writer failure.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow conversion failure.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Database connection or query failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing configuration value.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Structural errors raised by the transform steps.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// A required input column is absent.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// No numeric or duration column could be resolved for a sum.
    #[error("No numeric column available to sum hours")]
    NoMetricColumn,
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing the report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Workbook serialization failed.
    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// Delimited-text serialization failed.
    #[error("CSV export error: {0}")]
    Delimited(#[from] csv::Error),

    /// Filesystem failure.
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Both the workbook and the delimited fallback failed.
    #[error("Workbook export failed ({workbook}); fallback CSV export failed ({fallback})")]
    AllFailed { workbook: String, fallback: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_report`].
/// Its message names the first structural cause of the failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// No records to process.
    #[error("No records to process")]
    EmptyInput,

    /// Every category failed to produce tables.
    #[error("No category produced report tables")]
    NoTables,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let transform_err = TransformError::MissingColumn("Secao".into());
        let pipeline_err: PipelineError = transform_err.into();
        assert!(pipeline_err.to_string().contains("Secao"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let pipeline_err: PipelineError = SourceError::from(io).into();
        assert!(pipeline_err.to_string().contains("gone"));
    }

    #[test]
    fn test_all_failed_format() {
        let err = ExportError::AllFailed {
            workbook: "disk full".into(),
            fallback: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("disk full"));
        assert!(msg.contains("permission denied"));
    }
}
