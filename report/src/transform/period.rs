//! Year/month extraction.
//!
//! Guarantees integer `Ano` and `Mes` columns on every record. Sources, in
//! order of preference:
//!
//! 1. Existing `Ano` + `Mes` columns, coerced to integers.
//! 2. `DataCriacao` timestamps (calendar year and month).
//! 3. `DataCriacao` text shaped `YYYY-MM-DD ...`, read by position.
//! 4. The default period for every row.
//!
//! Any value that cannot be read falls back to the default period's year or
//! month. Nothing here returns an error.

use chrono::Datelike;

use crate::logs::{log_info, log_warning};
use crate::models::{columns, Cell, RecordTable, Period};

/// Year and month of a `DataCriacao` cell, or `default` where unreadable.
pub fn period_of_cell(cell: &Cell, default: Period) -> (i64, i64) {
    match cell {
        Cell::DateTime(dt) => (dt.year() as i64, dt.month() as i64),
        Cell::DateTimeTz(dt) => {
            let local = dt.naive_local();
            (local.year() as i64, local.month() as i64)
        }
        Cell::Text(s) => period_of_text(s, default),
        _ => (default.year as i64, default.month as i64),
    }
}

/// Positional read of `YYYY-MM...`: the first four characters are the year,
/// characters 6-7 the month when character 5 is `-`.
pub fn period_of_text(text: &str, default: Period) -> (i64, i64) {
    let text = text.trim_start();
    let year = text
        .get(0..4)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(default.year as i64);
    let month = match text.get(4..5) {
        Some("-") => text
            .get(5..7)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(default.month as i64),
        _ => default.month as i64,
    };
    (year, month)
}

/// Return a copy of `table` carrying integer `Ano` and `Mes` columns.
pub fn extract_period(table: &RecordTable, default: Period) -> RecordTable {
    let mut out = table.clone();
    let rows = table.num_rows();

    let (years, months): (Vec<i64>, Vec<i64>) = match (
        table.column(columns::ANO),
        table.column(columns::MES),
        table.column(columns::DATA_CRIACAO),
    ) {
        (Some(ano), Some(mes), _) => {
            let years = ano
                .cells
                .iter()
                .map(|c| c.coerce_i64().unwrap_or(default.year as i64))
                .collect();
            let months = mes
                .cells
                .iter()
                .map(|c| c.coerce_i64().unwrap_or(default.month as i64))
                .collect();
            (years, months)
        }
        (_, _, Some(created)) => {
            let kind = created.kind();
            if kind.is_datetime() {
                log_info(format!("Year/month read from {} timestamps", columns::DATA_CRIACAO));
            } else {
                log_info(format!("Year/month read from {} text ({})", columns::DATA_CRIACAO, kind));
            }
            created
                .cells
                .iter()
                .map(|c| period_of_cell(c, default))
                .unzip()
        }
        _ => {
            log_warning(format!(
                "No {} column; every record assigned to {}",
                columns::DATA_CRIACAO,
                default
            ));
            (
                vec![default.year as i64; rows],
                vec![default.month as i64; rows],
            )
        }
    };

    out.set_column(columns::ANO, years.into_iter().map(Cell::Int).collect());
    out.set_column(columns::MES, months.into_iter().map(Cell::Int).collect());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnKind;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    const DEFAULT: Period = Period::DEFAULT;

    fn ints(table: &RecordTable, name: &str) -> Vec<i64> {
        table
            .column(name)
            .unwrap()
            .cells
            .iter()
            .map(|c| match c {
                Cell::Int(i) => *i,
                other => panic!("expected integer, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_text_with_offset_suffix() {
        assert_eq!(period_of_text("2023-03-09 04:40:17 -03", DEFAULT), (2023, 3));
        assert_eq!(period_of_text("2024-11", DEFAULT), (2024, 11));
    }

    #[test]
    fn test_text_fallbacks() {
        assert_eq!(period_of_text("", DEFAULT), (2023, 1));
        assert_eq!(period_of_text("abcd-ef", DEFAULT), (2023, 1));
        assert_eq!(period_of_text("2022/05/01", DEFAULT), (2022, 1));
        assert_eq!(period_of_text("2022-xx-01", DEFAULT), (2022, 1));
    }

    #[test]
    fn test_from_text_column() {
        let table = RecordTable::from_rows(
            &["DataCriacao"],
            vec![
                vec![Cell::text("2023-03-09 04:40:17 -03")],
                vec![Cell::Null],
                vec![Cell::text("lixo")],
            ],
        );
        let out = extract_period(&table, DEFAULT);
        assert_eq!(ints(&out, "Ano"), vec![2023, 2023, 2023]);
        assert_eq!(ints(&out, "Mes"), vec![3, 1, 1]);
        assert_eq!(out.column("Ano").unwrap().kind(), ColumnKind::Int);
    }

    #[test]
    fn test_from_timestamp_column() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let table = RecordTable::from_rows(
            &["DataCriacao"],
            vec![
                vec![Cell::DateTime(
                    NaiveDate::from_ymd_opt(2024, 7, 2).unwrap().and_hms_opt(9, 0, 0).unwrap(),
                )],
                // local wall clock decides the month, not UTC
                vec![Cell::DateTimeTz(offset.with_ymd_and_hms(2024, 8, 31, 23, 0, 0).unwrap())],
            ],
        );
        let out = extract_period(&table, DEFAULT);
        assert_eq!(ints(&out, "Ano"), vec![2024, 2024]);
        assert_eq!(ints(&out, "Mes"), vec![7, 8]);
    }

    #[test]
    fn test_existing_columns_coerced() {
        let table = RecordTable::from_rows(
            &["Ano", "Mes"],
            vec![
                vec![Cell::Float(2024.0), Cell::text("5")],
                vec![Cell::text("n/a"), Cell::Null],
            ],
        );
        let out = extract_period(&table, DEFAULT);
        assert_eq!(ints(&out, "Ano"), vec![2024, 2023]);
        assert_eq!(ints(&out, "Mes"), vec![5, 1]);
    }

    #[test]
    fn test_no_date_source_uses_default() {
        let table = RecordTable::from_rows(&["Centro"], vec![vec![Cell::text("A")]]);
        let out = extract_period(&table, Period::new(2020, 6));
        assert_eq!(ints(&out, "Ano"), vec![2020]);
        assert_eq!(ints(&out, "Mes"), vec![6]);
    }

    #[test]
    fn test_idempotent() {
        let table = RecordTable::from_rows(&["DataCriacao"], vec![vec![Cell::text("2023-02-10 -03")]]);
        let once = extract_period(&table, DEFAULT);
        let twice = extract_period(&once, DEFAULT);
        assert_eq!(once, twice);
    }
}
