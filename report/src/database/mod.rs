//! Database source.
//!
//! Runs one query on PostgreSQL and streams the rows into a [`RecordTable`]
//! in bounded chunks, so the driver never buffers the whole result set.
//!
//! Column values are typed from the Postgres type name:
//!
//! | Postgres type                          | Cell       |
//! |----------------------------------------|------------|
//! | `BOOL`                                 | Bool       |
//! | `INT2`, `INT4`, `INT8`                 | Int        |
//! | `FLOAT4`, `FLOAT8`                     | Float      |
//! | `TIMESTAMP`, `DATE`                    | DateTime   |
//! | `TIMESTAMPTZ`                          | DateTimeTz |
//! | text types and anything decodable as text | Text    |
//!
//! `TIMESTAMPTZ` arrives as an instant and is shown in
//! [`DatabaseConfig::time_zone`] (`VENDAS_TIME_ZONE`, default
//! `America/Sao_Paulo`), so the offset-free wall time used for periods is the
//! local one. The bundled query already converts creation dates with
//! `AT TIME ZONE`, which yields plain `TIMESTAMP` local values.
//!
//! Values that cannot be decoded (for instance `NUMERIC`, which should be
//! cast to `float8` in the query) are read as null and reported once per
//! column.

use std::collections::BTreeSet;
use std::path::Path;

use arrow::array::timezone::Tz;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column as _, Row, TypeInfo, ValueRef};

use crate::config::DatabaseConfig;
use crate::error::{SourceError, SourceResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{Cell, RecordTable};

/// Read a query from a `.sql` file.
pub async fn read_query_file(path: &Path) -> SourceResult<String> {
    let query = tokio::fs::read_to_string(path).await?;
    let query = query.trim();
    if query.is_empty() {
        return Err(SourceError::MissingConfig(format!(
            "query file {} is empty",
            path.display()
        )));
    }
    Ok(query.to_string())
}

/// Run `query` and collect every row.
///
/// # Errors
/// Connection and query failures as [`SourceError::Database`].
pub async fn fetch_records(config: &DatabaseConfig, query: &str) -> SourceResult<RecordTable> {
    log_info("Connecting to the database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.url)
        .await?;
    log_success("Connected");

    log_info(format!("Running query, fetching {} rows per chunk...", config.batch_size));
    let mut chunks = sqlx::query(query)
        .fetch(&pool)
        .try_chunks(config.batch_size.max(1));

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut undecodable = BTreeSet::new();
    let mut chunk_count = 0usize;

    while let Some(chunk) = chunks.try_next().await.map_err(|e| SourceError::Database(e.1))? {
        if headers.is_empty() {
            if let Some(first) = chunk.first() {
                headers = first.columns().iter().map(|c| c.name().to_string()).collect();
            }
        }
        for row in &chunk {
            rows.push(decode_row(row, &headers, &config.time_zone, &mut undecodable));
        }
        chunk_count += 1;
        log_info_indent(format!("chunk {}: {} rows total", chunk_count, rows.len()), 1);
    }

    pool.close().await;

    for column in &undecodable {
        log_warning(format!("Column '{}' has values that could not be decoded; read as null", column));
    }

    if rows.is_empty() {
        log_warning("The query returned no rows");
    } else {
        log_success(format!("{} rows fetched", rows.len()));
    }
    Ok(RecordTable::from_rows(&headers, rows))
}

fn decode_row(
    row: &PgRow,
    headers: &[String],
    zone: &Tz,
    undecodable: &mut BTreeSet<String>,
) -> Vec<Cell> {
    (0..headers.len())
        .map(|i| match decode_cell(row, i, zone) {
            Some(cell) => cell,
            None => {
                undecodable.insert(headers[i].clone());
                Cell::Null
            }
        })
        .collect()
}

/// Typed cell at `index`; `None` when the value is present but not decodable.
fn decode_cell(row: &PgRow, index: usize, zone: &Tz) -> Option<Cell> {
    let type_name = {
        let raw = row.try_get_raw(index).ok()?;
        if raw.is_null() {
            return Some(Cell::Null);
        }
        raw.type_info().name().to_string()
    };

    let cell = match type_name.as_str() {
        "BOOL" => Cell::Bool(row.try_get::<bool, _>(index).ok()?),
        "INT2" => Cell::Int(row.try_get::<i16, _>(index).ok()?.into()),
        "INT4" => Cell::Int(row.try_get::<i32, _>(index).ok()?.into()),
        "INT8" => Cell::Int(row.try_get::<i64, _>(index).ok()?),
        "FLOAT4" => Cell::Float(row.try_get::<f32, _>(index).ok()?.into()),
        "FLOAT8" => Cell::Float(row.try_get::<f64, _>(index).ok()?),
        "TIMESTAMP" => Cell::DateTime(row.try_get::<NaiveDateTime, _>(index).ok()?),
        "TIMESTAMPTZ" => local_timestamp(row.try_get::<DateTime<Utc>, _>(index).ok()?, zone),
        "DATE" => Cell::DateTime(row.try_get::<NaiveDate, _>(index).ok()?.and_hms_opt(0, 0, 0)?),
        _ => Cell::Text(row.try_get::<String, _>(index).ok()?),
    };
    Some(cell)
}

/// An instant as a timestamp carrying the offset `zone` has at that instant.
fn local_timestamp(instant: DateTime<Utc>, zone: &Tz) -> Cell {
    Cell::DateTimeTz(instant.with_timezone(zone).fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_time_zone;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_timestamptz_uses_local_wall_time() {
        let zone = parse_time_zone("America/Sao_Paulo").unwrap();
        let instant = Utc.with_ymd_and_hms(2023, 2, 1, 1, 0, 0).unwrap();
        let local = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap().and_hms_opt(22, 0, 0).unwrap();
        match local_timestamp(instant, &zone) {
            Cell::DateTimeTz(dt) => {
                assert_eq!(dt.naive_local(), local);
                assert_eq!(dt.offset().local_minus_utc(), -3 * 3600);
            }
            other => panic!("expected DateTimeTz, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_query_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.sql");
        std::fs::write(&path, "\n  SELECT 1;\n").unwrap();
        assert_eq!(read_query_file(&path).await.unwrap(), "SELECT 1;");
    }

    #[tokio::test]
    async fn test_empty_query_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.sql");
        std::fs::write(&path, "   ").unwrap();
        assert!(matches!(
            read_query_file(&path).await,
            Err(SourceError::MissingConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_query_file() {
        let result = read_query_file(Path::new("/nonexistent/q.sql")).await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }
}
