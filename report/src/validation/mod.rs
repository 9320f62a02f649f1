//! Invariant checks on a prepared table.
//!
//! Runs after preparation and before aggregation. Checks:
//!
//! - `Classificacao` holds one of the four fixed labels
//! - `Ano` and `Mes` are integers, `Mes` within `1..=12`
//! - `hora` is numeric and non-negative
//!
//! Violations never abort a run; they are returned as messages and the
//! caller logs them.
//!
//! # Example
//!
//! ```rust,ignore
//! use vendas::validation::validate_prepared;
//!
//! let violations = validate_prepared(&prepared);
//! assert!(violations.is_empty());
//! ```

use crate::logs::{log_success, log_warning, log_warning_indent};
use crate::models::{columns, Cell, Classification, RecordTable};

/// How many individual violations are logged before summarizing.
pub const MAX_LOGGED_VIOLATIONS: usize = 5;

/// Check a prepared table and return one message per violation.
pub fn validate_prepared(table: &RecordTable) -> Vec<String> {
    let mut errors = Vec::new();

    match table.column(columns::CLASSIFICACAO) {
        Some(column) => {
            for (row, cell) in column.cells.iter().enumerate() {
                let label = cell.as_str().map(str::trim);
                if label.and_then(Classification::from_label).is_none() {
                    errors.push(format!("row {}: invalid Classificacao '{}'", row, cell));
                }
            }
        }
        None => errors.push("missing column Classificacao".to_string()),
    }

    for name in [columns::ANO, columns::MES] {
        let Some(column) = table.column(name) else {
            errors.push(format!("missing column {}", name));
            continue;
        };
        for (row, cell) in column.cells.iter().enumerate() {
            match cell {
                Cell::Int(m) if name == columns::MES && !(1..=12).contains(m) => {
                    errors.push(format!("row {}: Mes {} out of range", row, m));
                }
                Cell::Int(_) => {}
                other => errors.push(format!("row {}: {} is not an integer ({})", row, name, other)),
            }
        }
    }

    match table.column(columns::HORA) {
        Some(column) => {
            for (row, cell) in column.cells.iter().enumerate() {
                match cell.as_f64() {
                    Some(h) if h >= 0.0 => {}
                    Some(h) => errors.push(format!("row {}: negative hora {}", row, h)),
                    None => errors.push(format!("row {}: hora is not numeric ({})", row, cell)),
                }
            }
        }
        None => errors.push("missing column hora".to_string()),
    }

    errors
}

/// Validate and log the outcome; returns the number of violations.
pub fn check_prepared(table: &RecordTable) -> usize {
    let errors = validate_prepared(table);
    if errors.is_empty() {
        log_success("Prepared data passed validation");
        return 0;
    }

    log_warning(format!("{} validation issue(s) found", errors.len()));
    for error in errors.iter().take(MAX_LOGGED_VIOLATIONS) {
        log_warning_indent(error.clone(), 1);
    }
    if errors.len() > MAX_LOGGED_VIOLATIONS {
        log_warning_indent(format!("... and {} more", errors.len() - MAX_LOGGED_VIOLATIONS), 1);
    }
    errors.len()
}
