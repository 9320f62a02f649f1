//! Domain models for the sales report pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - A single typed, nullable value
//! - [`Column`] / [`RecordTable`] - Ordered, schemaless-but-typed table
//! - [`ColumnKind`] - Kind inferred from a column's non-null cells
//! - [`Classification`] - The four fixed business categories
//! - [`Metric`] - Count or duration sum, with its value column
//! - [`Period`] - A `YYYY-MM` grouping key
//! - [`CategoryTables`] - Pivots and details produced for one category

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{TransformError, TransformResult};

/// Column names observed or produced by the pipeline.
pub mod columns {
    pub const SECAO: &str = "Secao";
    pub const FAMILIA: &str = "Familia";
    pub const CENTRO: &str = "Centro";
    pub const DATA_CRIACAO: &str = "DataCriacao";
    pub const VALOR_VENDA: &str = "ValorVenda";
    pub const CLASSIFICACAO: &str = "Classificacao";
    pub const ANO: &str = "Ano";
    pub const MES: &str = "Mes";
    pub const HORA: &str = "hora";
    pub const PERIODO: &str = "Periodo";
    pub const CONTAGEM: &str = "Contagem";
    pub const TOTAL_HORAS: &str = "Total_Horas";
}

/// Format used whenever a date/time is rendered as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Cell
// =============================================================================

/// A single table value.
///
/// Serializes untagged, so a row dumps as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Offset-free timestamp.
    DateTime(NaiveDateTime),
    /// Timestamp carrying a UTC offset.
    DateTimeTz(DateTime<FixedOffset>),
}

impl Cell {
    /// Build a text cell.
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// `Null`, and `NaN` floats, count as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_)) || matches!(self, Cell::Float(f) if !f.is_nan())
    }

    /// Null-safe, trimmed text form; missing values become `""`.
    pub fn trimmed_text(&self) -> String {
        if self.is_null() {
            return String::new();
        }
        self.to_string().trim().to_string()
    }

    /// Numeric value of an `Int` or `Float` cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Integer coercion: integers as-is, finite floats truncated,
    /// text parsed as an integer or a float. Anything else is `None`.
    pub fn coerce_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    /// Text cells have their content borrowed here; other kinds return `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON scalar.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) if v.is_nan() => Ok(()),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Cell::DateTimeTz(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S %:z")),
        }
    }
}

// =============================================================================
// Column
// =============================================================================

/// Kind inferred from the non-null cells of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// No non-null cell.
    Empty,
    Bool,
    Int,
    Float,
    /// Integers and floats mixed.
    Numeric,
    Text,
    DateTime,
    DateTimeTz,
    /// Offset-aware and offset-free timestamps mixed.
    MixedDateTime,
    /// Anything else.
    Mixed,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Int | ColumnKind::Float | ColumnKind::Numeric)
    }

    pub fn is_datetime(self) -> bool {
        matches!(
            self,
            ColumnKind::DateTime | ColumnKind::DateTimeTz | ColumnKind::MixedDateTime
        )
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Empty => "empty",
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
            ColumnKind::Float => "float",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::DateTime => "datetime",
            ColumnKind::DateTimeTz => "datetime[tz]",
            ColumnKind::MixedDateTime => "datetime[mixed tz]",
            ColumnKind::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Infer the column kind from its non-null cells.
    pub fn kind(&self) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for cell in self.cells.iter().filter(|c| !c.is_null()) {
            let cell_kind = match cell {
                Cell::Bool(_) => ColumnKind::Bool,
                Cell::Int(_) => ColumnKind::Int,
                Cell::Float(_) => ColumnKind::Float,
                Cell::Text(_) => ColumnKind::Text,
                Cell::DateTime(_) => ColumnKind::DateTime,
                Cell::DateTimeTz(_) => ColumnKind::DateTimeTz,
                Cell::Null => continue,
            };
            kind = match (kind, cell_kind) {
                (ColumnKind::Empty, k) => k,
                (a, b) if a == b => a,
                (a, b) if a.is_numeric() && b.is_numeric() => ColumnKind::Numeric,
                (a, b) if a.is_datetime() && b.is_datetime() => ColumnKind::MixedDateTime,
                _ => return ColumnKind::Mixed,
            };
        }
        kind
    }

    /// First `n` non-null cells.
    pub fn sample(&self, n: usize) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| !c.is_null()).take(n)
    }
}

// =============================================================================
// Record Table
// =============================================================================

/// An ordered collection of equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    columns: Vec<Column>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from columns. Every column must have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        debug_assert!(
            columns.windows(2).all(|w| w[0].len() == w[1].len()),
            "columns must have equal length"
        );
        Self { columns }
    }

    /// Build from a header and row-major cells. Short rows are padded with nulls.
    pub fn from_rows<S: AsRef<str>>(headers: &[S], rows: Vec<Vec<Cell>>) -> Self {
        let mut columns: Vec<Column> = headers
            .iter()
            .map(|h| Column::new(h.as_ref(), Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            let mut values = row.into_iter();
            for column in columns.iter_mut() {
                column.cells.push(values.next().unwrap_or(Cell::Null));
            }
        }
        Self { columns }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Borrow a column or fail with [`TransformError::MissingColumn`].
    pub fn require(&self, name: &str) -> TransformResult<&Column> {
        self.column(name)
            .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
    }

    /// Cell at `(column, row)`; absent column or row yields `None`.
    pub fn cell(&self, name: &str, row: usize) -> Option<&Cell> {
        self.column(name).and_then(|c| c.cells.get(row))
    }

    /// Replace a column's cells, or append a new column.
    pub fn set_column(&mut self, name: &str, cells: Vec<Cell>) {
        debug_assert!(
            self.columns.is_empty() || cells.len() == self.num_rows(),
            "column length mismatch"
        );
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.cells = cells,
            None => self.columns.push(Column::new(name, cells)),
        }
    }

    /// Keep the rows for which `keep(row_index)` holds.
    pub fn filter_rows<F: Fn(usize) -> bool>(&self, keep: F) -> RecordTable {
        let indices: Vec<usize> = (0..self.num_rows()).filter(|&i| keep(i)).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    indices.iter().map(|&i| c.cells[i].clone()).collect(),
                )
            })
            .collect();
        RecordTable { columns }
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_rows(&self, limit: usize) -> Vec<Value> {
        (0..self.num_rows().min(limit))
            .map(|row| {
                let mut obj = Map::new();
                for column in &self.columns {
                    obj.insert(column.name.clone(), column.cells[row].to_json());
                }
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Classification
// =============================================================================

/// The fixed business category of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Bloco Cirurgico")]
    BlocoCirurgico,
    Cardiologia,
    Clinica,
    Imagem,
}

impl Classification {
    /// Every category, in label order.
    pub const ALL: [Classification; 4] = [
        Classification::BlocoCirurgico,
        Classification::Cardiologia,
        Classification::Clinica,
        Classification::Imagem,
    ];

    /// Label stored in the `Classificacao` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cardiologia => "Cardiologia",
            Self::Imagem => "Imagem",
            Self::BlocoCirurgico => "Bloco Cirurgico",
            Self::Clinica => "Clinica",
        }
    }

    /// Parse a stored label (exact match after trimming).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Metric
// =============================================================================

/// Aggregation performed per `(unit, Ano, Mes)` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of rows.
    Count,
    /// Sum of the resolved duration column.
    DurationSum,
}

impl Metric {
    /// Name of the value column in the aggregated table.
    pub fn value_column(&self) -> &'static str {
        match self {
            Metric::Count => columns::CONTAGEM,
            Metric::DurationSum => columns::TOTAL_HORAS,
        }
    }

    /// Suffix used in worksheet names.
    pub fn sheet_suffix(&self) -> &'static str {
        match self {
            Metric::Count => "Contagem",
            Metric::DurationSum => "Horas",
        }
    }

    /// Infix used in fallback file names.
    pub fn file_label(&self) -> &'static str {
        match self {
            Metric::Count => "contagem",
            Metric::DurationSum => "horas",
        }
    }
}

// =============================================================================
// Period
// =============================================================================

/// A calendar month used as a grouping key and pivot column header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Period assigned when none can be derived from the data.
    pub const DEFAULT: Period = Period {
        year: 2023,
        month: 1,
    };

    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// `"{year}-{month:02}"`, built from integers only.
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

impl Default for Period {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// =============================================================================
// Category Tables
// =============================================================================

/// The report tables produced for one category.
///
/// Duration tables are absent when no column could be summed.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTables {
    pub count_pivot: RecordTable,
    pub duration_pivot: Option<RecordTable>,
    pub count_detail: RecordTable,
    pub duration_detail: Option<RecordTable>,
}

impl CategoryTables {
    /// The pivot for `metric`, if produced.
    pub fn pivot(&self, metric: Metric) -> Option<&RecordTable> {
        match metric {
            Metric::Count => Some(&self.count_pivot),
            Metric::DurationSum => self.duration_pivot.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_column_kind_inference() {
        let ints = Column::new("a", vec![Cell::Int(1), Cell::Null, Cell::Int(2)]);
        assert_eq!(ints.kind(), ColumnKind::Int);

        let numeric = Column::new("b", vec![Cell::Int(1), Cell::Float(2.5)]);
        assert_eq!(numeric.kind(), ColumnKind::Numeric);

        let mixed = Column::new("c", vec![Cell::Int(1), Cell::text("x")]);
        assert_eq!(mixed.kind(), ColumnKind::Mixed);

        let empty = Column::new("d", vec![Cell::Null, Cell::Float(f64::NAN)]);
        assert_eq!(empty.kind(), ColumnKind::Empty);

        let dates = Column::new("e", vec![Cell::DateTime(naive(2023, 1, 5))]);
        assert_eq!(dates.kind(), ColumnKind::DateTime);
    }

    #[test]
    fn test_trimmed_text_is_null_safe() {
        assert_eq!(Cell::Null.trimmed_text(), "");
        assert_eq!(Cell::Float(f64::NAN).trimmed_text(), "");
        assert_eq!(Cell::text("  Imagem ").trimmed_text(), "Imagem");
        assert_eq!(Cell::Int(7).trimmed_text(), "7");
    }

    #[test]
    fn test_coerce_i64() {
        assert_eq!(Cell::Int(2023).coerce_i64(), Some(2023));
        assert_eq!(Cell::Float(2023.0).coerce_i64(), Some(2023));
        assert_eq!(Cell::text(" 3 ").coerce_i64(), Some(3));
        assert_eq!(Cell::text("3.0").coerce_i64(), Some(3));
        assert_eq!(Cell::text("abc").coerce_i64(), None);
        assert_eq!(Cell::Null.coerce_i64(), None);
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let table = RecordTable::from_rows(
            &["a", "b"],
            vec![vec![Cell::Int(1)], vec![Cell::Int(2), Cell::text("x")]],
        );
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.cell("b", 0), Some(&Cell::Null));
        assert_eq!(table.cell("b", 1), Some(&Cell::text("x")));
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut table = RecordTable::from_rows(&["a", "b"], vec![vec![Cell::Int(1), Cell::Int(2)]]);
        table.set_column("a", vec![Cell::Int(9)]);
        table.set_column("c", vec![Cell::Int(3)]);
        assert_eq!(table.column_names(), vec!["a", "b", "c"]);
        assert_eq!(table.cell("a", 0), Some(&Cell::Int(9)));
    }

    #[test]
    fn test_filter_rows() {
        let table = RecordTable::from_rows(
            &["a"],
            vec![vec![Cell::Int(1)], vec![Cell::Int(2)], vec![Cell::Int(3)]],
        );
        let odd = table.filter_rows(|i| i % 2 == 0);
        assert_eq!(odd.num_rows(), 2);
        assert_eq!(odd.cell("a", 1), Some(&Cell::Int(3)));
    }

    #[test]
    fn test_require_reports_missing_column() {
        let table = RecordTable::new();
        assert_eq!(
            table.require("Secao").unwrap_err(),
            TransformError::MissingColumn("Secao".into())
        );
    }

    #[test]
    fn test_classification_labels() {
        assert_eq!(Classification::BlocoCirurgico.as_str(), "Bloco Cirurgico");
        assert_eq!(
            Classification::from_label(" Imagem"),
            Some(Classification::Imagem)
        );
        assert_eq!(Classification::from_label("Outros"), None);
    }

    #[test]
    fn test_period_label_is_integer_based() {
        assert_eq!(Period::new(2023, 3).label(), "2023-03");
        assert_eq!(Period::new(2024, 12).to_string(), "2024-12");
        assert_eq!(Period::default(), Period::new(2023, 1));
    }

    #[test]
    fn test_json_rows() {
        let table = RecordTable::from_rows(
            &["Centro", "hora"],
            vec![vec![Cell::text("A"), Cell::Float(1.5)]],
        );
        let rows = table.to_json_rows(10);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Centro"], "A");
        assert_eq!(rows[0]["hora"], 1.5);
    }
}
