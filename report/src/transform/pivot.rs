//! Long-to-wide reshaping: one row per `Centro`, one column per `Periodo`.

use std::collections::{BTreeMap, BTreeSet};

use crate::logs::log_error;
use crate::models::{columns, Cell, Column, RecordTable};

/// Pivot a long table on `Centro` × `Periodo`, summing `value_column`.
///
/// Absent pairs are `0`. Rows are sorted by `Centro`, period columns
/// ascending. Unit and period keys are trimmed, so `"A "` and `"A"` share a
/// row. A table lacking `Centro`, `Periodo` or `value_column`, or one
/// without any period, is returned unchanged.
pub fn pivot(long: &RecordTable, value_column: &str) -> RecordTable {
    let (Some(centro), Some(periodo), Some(values)) = (
        long.column(columns::CENTRO),
        long.column(columns::PERIODO),
        long.column(value_column),
    ) else {
        let missing: Vec<&str> = [columns::CENTRO, columns::PERIODO, value_column]
            .into_iter()
            .filter(|name| !long.has_column(name))
            .collect();
        log_error(format!("Cannot pivot, missing column(s): {}", missing.join(", ")));
        return long.clone();
    };

    let integral = values
        .cells
        .iter()
        .all(|c| c.is_null() || matches!(c, Cell::Int(_)));

    let mut periods = BTreeSet::new();
    let mut grid: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for ((unit, period), value) in centro.cells.iter().zip(&periodo.cells).zip(&values.cells) {
        if unit.is_null() || period.is_null() {
            continue;
        }
        let period = period.trimmed_text();
        periods.insert(period.clone());
        *grid
            .entry(unit.trimmed_text())
            .or_default()
            .entry(period)
            .or_insert(0.0) += value.as_f64().unwrap_or(0.0);
    }

    if periods.is_empty() {
        return long.clone();
    }

    let mut out = vec![Column::new(
        columns::CENTRO,
        grid.keys().map(|unit| Cell::Text(unit.clone())).collect(),
    )];
    for period in &periods {
        let cells = grid
            .values()
            .map(|row| {
                let total = row.get(period).copied().unwrap_or(0.0);
                if integral {
                    Cell::Int(total as i64)
                } else {
                    Cell::Float(total)
                }
            })
            .collect();
        out.push(Column::new(period.clone(), cells));
    }
    RecordTable::from_columns(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_counts() -> RecordTable {
        RecordTable::from_rows(
            &["Centro", "Ano", "Mes", "Contagem", "Periodo"],
            vec![
                vec![Cell::text("B"), Cell::Int(2023), Cell::Int(2), Cell::Int(4), Cell::text("2023-02")],
                vec![Cell::text("A"), Cell::Int(2023), Cell::Int(1), Cell::Int(2), Cell::text("2023-01")],
                vec![Cell::text("A"), Cell::Int(2023), Cell::Int(2), Cell::Int(1), Cell::text("2023-02")],
            ],
        )
    }

    #[test]
    fn test_wide_shape_and_zero_fill() {
        let wide = pivot(&long_counts(), "Contagem");
        assert_eq!(wide.column_names(), vec!["Centro", "2023-01", "2023-02"]);
        assert_eq!(wide.cell("Centro", 0), Some(&Cell::text("A")));
        assert_eq!(wide.cell("2023-01", 0), Some(&Cell::Int(2)));
        assert_eq!(wide.cell("2023-02", 0), Some(&Cell::Int(1)));
        assert_eq!(wide.cell("2023-01", 1), Some(&Cell::Int(0)));
        assert_eq!(wide.cell("2023-02", 1), Some(&Cell::Int(4)));
    }

    #[test]
    fn test_sum_is_preserved() {
        let long = long_counts();
        let wide = pivot(&long, "Contagem");
        let total: f64 = wide
            .columns()
            .iter()
            .filter(|c| c.name != "Centro")
            .flat_map(|c| c.cells.iter())
            .filter_map(Cell::as_f64)
            .sum();
        assert_eq!(total, 7.0);
    }

    #[test]
    fn test_padded_units_share_a_row() {
        let long = RecordTable::from_rows(
            &["Centro", "Contagem", "Periodo"],
            vec![
                vec![Cell::text("A "), Cell::Int(2), Cell::text("2023-01")],
                vec![Cell::text("A"), Cell::Int(3), Cell::text("2023-01")],
            ],
        );
        let wide = pivot(&long, "Contagem");
        assert_eq!(wide.num_rows(), 1);
        assert_eq!(wide.cell("Centro", 0), Some(&Cell::text("A")));
        assert_eq!(wide.cell("2023-01", 0), Some(&Cell::Int(5)));
    }

    #[test]
    fn test_float_values_stay_float() {
        let long = RecordTable::from_rows(
            &["Centro", "Total_Horas", "Periodo"],
            vec![vec![Cell::text("A"), Cell::Float(0.67), Cell::text("2023-01")]],
        );
        let wide = pivot(&long, "Total_Horas");
        assert_eq!(wide.cell("2023-01", 0), Some(&Cell::Float(0.67)));
    }

    #[test]
    fn test_missing_periodo_returns_input() {
        let long = RecordTable::from_rows(&["Centro", "Contagem"], vec![vec![Cell::text("A"), Cell::Int(1)]]);
        assert_eq!(pivot(&long, "Contagem"), long);
    }

    #[test]
    fn test_no_periods_returns_input() {
        let long = RecordTable::from_rows(
            &["Centro", "Contagem", "Periodo"],
            vec![vec![Cell::text("A"), Cell::Int(1), Cell::Null]],
        );
        assert_eq!(pivot(&long, "Contagem"), long);
        assert_eq!(pivot(&RecordTable::from_rows::<&str>(&["Centro", "Contagem", "Periodo"], vec![]), "Contagem").num_rows(), 0);
    }
}
