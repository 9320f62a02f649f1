//! Grouping of records by `(Ano, Mes, unit)`.
//!
//! # Architecture
//!
//! ```text
//! Records (one row per sale)            →  Long table (one row per group)
//! ┌──────────────────────────────┐        ┌────────────────────────────────┐
//! │ Centro: A, 2023-01, hora 1.5 │        │ Centro: A, 2023, 1, 2, 2.5     │
//! │ Centro: A, 2023-01, hora 1.0 │   →    │ Centro: B, 2023, 2, 1, 3.0     │
//! │ Centro: B, 2023-02, hora 3.0 │        └────────────────────────────────┘
//! └──────────────────────────────┘          Centro, Ano, Mes, value, Periodo
//! ```
//!
//! The unit column is resolved through [`UNIT_CANDIDATES`] and always comes
//! out as `Centro`. Records with a null unit are dropped from the groups.

use std::collections::BTreeMap;

use crate::error::{TransformError, TransformResult};
use crate::logs::{log_info, log_warning};
use crate::models::{columns, Cell, Column, Metric, Period, RecordTable};

use super::period::extract_period;
use super::resolve::{resolve_column, DURATION_CANDIDATES, UNIT_CANDIDATES};

/// Group `table` by `(Ano, Mes, unit)` and compute `metric` per group.
///
/// Output columns: `Centro`, `Ano`, `Mes`, the metric's value column and
/// `Periodo`, sorted by `(Ano, Mes, Centro)`. Units are grouped by their
/// trimmed text.
///
/// # Errors
/// - [`TransformError::MissingColumn`] when no unit column can be resolved.
/// - [`TransformError::NoMetricColumn`] when a duration sum has nothing to sum.
pub fn aggregate(table: &RecordTable, metric: Metric, default: Period) -> TransformResult<RecordTable> {
    let table = extract_period(table, default);

    let unit_name = resolve_column(&table, UNIT_CANDIDATES)
        .ok_or_else(|| TransformError::MissingColumn(columns::CENTRO.to_string()))?;
    if unit_name != columns::CENTRO {
        log_info(format!("Using '{}' as the unit column", unit_name));
    }

    let values: Vec<f64> = match metric {
        Metric::Count => vec![1.0; table.num_rows()],
        Metric::DurationSum => {
            let name = resolve_column(&table, DURATION_CANDIDATES).ok_or(TransformError::NoMetricColumn)?;
            if name != columns::HORA {
                log_info(format!("Summing hours from '{}'", name));
            }
            table.require(&name)?.cells.iter().map(numeric_value).collect()
        }
    };

    let units = table.require(&unit_name)?;
    let years = table.require(columns::ANO)?;
    let months = table.require(columns::MES)?;

    let mut groups: BTreeMap<(i64, i64, String), f64> = BTreeMap::new();
    let mut dropped = 0usize;
    for (row, value) in values.iter().enumerate() {
        let unit = &units.cells[row];
        if unit.is_null() {
            dropped += 1;
            continue;
        }
        let year = years.cells[row].coerce_i64().unwrap_or(default.year as i64);
        let month = months.cells[row].coerce_i64().unwrap_or(default.month as i64);
        *groups.entry((year, month, unit.trimmed_text())).or_insert(0.0) += value;
    }
    if dropped > 0 {
        log_warning(format!("{} record(s) without a unit left out of the groups", dropped));
    }

    let mut centro = Vec::with_capacity(groups.len());
    let mut ano = Vec::with_capacity(groups.len());
    let mut mes = Vec::with_capacity(groups.len());
    let mut value = Vec::with_capacity(groups.len());
    let mut periodo = Vec::with_capacity(groups.len());
    for ((year, month, unit), total) in groups {
        centro.push(Cell::Text(unit));
        ano.push(Cell::Int(year));
        mes.push(Cell::Int(month));
        value.push(match metric {
            Metric::Count => Cell::Int(total as i64),
            Metric::DurationSum => Cell::Float(total),
        });
        periodo.push(Cell::Text(period_label(year, month)));
    }

    Ok(RecordTable::from_columns(vec![
        Column::new(columns::CENTRO, centro),
        Column::new(columns::ANO, ano),
        Column::new(columns::MES, mes),
        Column::new(metric.value_column(), value),
        Column::new(columns::PERIODO, periodo),
    ]))
}

/// `YYYY-MM` from integer parts.
pub fn period_label(year: i64, month: i64) -> String {
    format!("{}-{:02}", year, month)
}

/// Numeric reading of a duration/value cell. Text is cleaned of currency
/// marks and Brazilian separators; anything unreadable counts as `0`.
pub fn numeric_value(cell: &Cell) -> f64 {
    match cell {
        Cell::Text(s) => parse_amount(s).unwrap_or(0.0),
        Cell::Bool(b) => f64::from(u8::from(*b)),
        other => other.as_f64().unwrap_or(0.0),
    }
}

/// Parse `"R$ 1.234,50"`, `"1234,5"` or `"12.5"`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let normalized = if cleaned.contains('.') && cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.replace(',', ".")
    };
    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}
