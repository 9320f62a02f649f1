//! Time-zone stripping.
//!
//! Grouping breaks when offset-aware and offset-free timestamps meet, so
//! every date/time-like column is brought to an offset-free form first:
//!
//! ```text
//! DateTimeTz(2023-03-09 04:40:17 -03:00)  →  DateTime(2023-03-09 04:40:17)
//! Text("2023-03-09 04:40:17 -03")         →  Text("2023-03-09 04:40:17")
//! [DateTimeTz, Int, Text]                 →  [Text, Text, Text]
//! ```
//!
//! The wall-clock time is kept and the offset discarded. Normalization never
//! fails: a column that cannot be brought to one timestamp kind is rendered
//! as text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::logs::{log_info, log_info_indent};
use crate::models::{Cell, Column, ColumnKind, RecordTable, DATETIME_FORMAT};

/// Trailing UTC-offset marker: ` -03`, ` +00:00`, ` +0530`, ` GMT`, ` GMT-3`, ` UTC`.
static OFFSET_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+(?:[+-]\d{2}(?::?\d{2})?|GMT(?:[+-]\d{1,2}(?::?\d{2})?)?|UTC)\s*$")
        .expect("offset suffix pattern is valid")
});

/// How many non-null values are inspected to decide if a text column carries offsets.
const SAMPLE_SIZE: usize = 5;

/// Strip a trailing offset marker from a date/time text.
pub fn strip_offset_suffix(text: &str) -> &str {
    match OFFSET_SUFFIX.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

/// True when the text ends with a recognizable offset marker.
pub fn has_offset_suffix(text: &str) -> bool {
    OFFSET_SUFFIX.is_match(text)
}

/// Return a copy of `table` with every timestamp offset removed.
pub fn normalize_timestamps(table: &RecordTable) -> RecordTable {
    let mut converted = Vec::new();
    let columns = table
        .columns()
        .iter()
        .map(|column| {
            let (normalized, changed) = normalize_column(column);
            if changed {
                converted.push(column.name.clone());
            }
            normalized
        })
        .collect();

    if converted.is_empty() {
        log_info("No time-zone information found");
    } else {
        log_info(format!("Time zones removed from {} column(s):", converted.len()));
        for name in &converted {
            log_info_indent(name.clone(), 1);
        }
    }
    RecordTable::from_columns(columns)
}

fn normalize_column(column: &Column) -> (Column, bool) {
    match column.kind() {
        ColumnKind::DateTimeTz | ColumnKind::MixedDateTime => {
            let cells = column
                .cells
                .iter()
                .map(|cell| match cell {
                    Cell::DateTimeTz(dt) => Cell::DateTime(dt.naive_local()),
                    other => other.clone(),
                })
                .collect();
            (Column::new(column.name.clone(), cells), true)
        }
        ColumnKind::Text if text_sample_has_offset(column) => {
            (strip_text_offsets(column), true)
        }
        ColumnKind::Mixed if column.cells.iter().any(|c| matches!(c, Cell::DateTimeTz(_))) => {
            let as_text = Column::new(
                column.name.clone(),
                column.cells.iter().map(render_offset_free).collect(),
            );
            (strip_text_offsets(&as_text), true)
        }
        ColumnKind::Mixed if text_sample_has_offset(column) => (strip_text_offsets(column), true),
        _ => (column.clone(), false),
    }
}

fn text_sample_has_offset(column: &Column) -> bool {
    column
        .sample(SAMPLE_SIZE)
        .filter_map(Cell::as_str)
        .any(has_offset_suffix)
}

fn strip_text_offsets(column: &Column) -> Column {
    let cells = column
        .cells
        .iter()
        .map(|cell| match cell {
            Cell::Text(s) => Cell::Text(strip_offset_suffix(s).to_string()),
            other => other.clone(),
        })
        .collect();
    Column::new(column.name.clone(), cells)
}

/// Text form of a cell with any offset dropped; nulls stay null.
fn render_offset_free(cell: &Cell) -> Cell {
    match cell {
        c if c.is_null() => Cell::Null,
        Cell::DateTimeTz(dt) => Cell::Text(dt.naive_local().format(DATETIME_FORMAT).to_string()),
        Cell::Text(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}
