//! Transformation module.
//!
//! Steps, in the order the pipeline runs them:
//! - Timestamps: offset removal
//! - Period: `Ano` / `Mes` extraction
//! - Classify / Duration / Prepare: category and hours per record
//! - Aggregate: grouping by `(Ano, Mes, unit)`
//! - Pivot: unit by period tables
//! - Pipeline: per-category orchestration and export

pub mod aggregate;
pub mod classify;
pub mod duration;
pub mod period;
pub mod pipeline;
pub mod pivot;
pub mod prepare;
pub mod resolve;
pub mod timestamps;

pub use aggregate::aggregate;
pub use classify::{classify, classify_table};
pub use duration::{derive_hours, derive_hours_table};
pub use period::extract_period;
pub use pipeline::*;
pub use pivot::pivot;
pub use prepare::prepare;
pub use resolve::{resolve_column, Candidate};
pub use timestamps::normalize_timestamps;
