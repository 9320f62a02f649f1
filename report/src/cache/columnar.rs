//! Parquet reading and writing for record tables.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use arrow::array::timezone::Tz;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Field, Float64Type, Int64Type, Schema, TimeUnit,
    TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::SourceResult;
use crate::logs::log_warning;
use crate::models::{Cell, Column, ColumnKind, RecordTable};

/// Read every record batch of a Parquet file into one table.
pub fn load_cached_table(path: &Path) -> SourceResult<RecordTable> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| Column::new(f.name().as_str(), Vec::new()))
        .collect();

    for batch in reader {
        let batch = batch?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            append_cells(array, &mut column.cells)?;
        }
    }

    Ok(RecordTable::from_columns(columns))
}

fn append_cells(array: &ArrayRef, out: &mut Vec<Cell>) -> SourceResult<()> {
    out.reserve(array.len());
    match array.data_type() {
        DataType::Null => out.extend((0..array.len()).map(|_| Cell::Null)),
        DataType::Boolean => {
            let values = array.as_boolean();
            out.extend((0..values.len()).map(|i| {
                if values.is_null(i) { Cell::Null } else { Cell::Bool(values.value(i)) }
            }));
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let casted = cast(array, &DataType::Int64)?;
            let values = casted.as_primitive::<Int64Type>();
            out.extend((0..values.len()).map(|i| {
                if values.is_null(i) { Cell::Null } else { Cell::Int(values.value(i)) }
            }));
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let casted = cast(array, &DataType::Float64)?;
            let values = casted.as_primitive::<Float64Type>();
            out.extend((0..values.len()).map(|i| {
                if values.is_null(i) { Cell::Null } else { Cell::Float(values.value(i)) }
            }));
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            let casted = cast(array, &DataType::Utf8)?;
            let values = casted.as_string::<i32>();
            out.extend((0..values.len()).map(|i| {
                if values.is_null(i) { Cell::Null } else { Cell::text(values.value(i)) }
            }));
        }
        DataType::Date32 => {
            let values = array.as_primitive::<Date32Type>();
            out.extend((0..values.len()).map(|i| {
                values.value_as_datetime(i).map(Cell::DateTime).unwrap_or(Cell::Null)
            }));
        }
        DataType::Date64 => {
            let values = array.as_primitive::<Date64Type>();
            out.extend((0..values.len()).map(|i| {
                values.value_as_datetime(i).map(Cell::DateTime).unwrap_or(Cell::Null)
            }));
        }
        DataType::Timestamp(_, tz) => {
            let zone = tz.as_deref().and_then(|tz| {
                let zone = resolve_zone(tz);
                if zone.is_none() {
                    log_warning(format!("Unknown time zone '{}' read as UTC", tz));
                }
                zone
            });
            let casted = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, tz.clone()))?;
            let values = casted.as_primitive::<TimestampMicrosecondType>();
            out.extend((0..values.len()).map(|i| {
                if values.is_null(i) {
                    return Cell::Null;
                }
                match DateTime::from_timestamp_micros(values.value(i)) {
                    Some(instant) => match &zone {
                        Some(zone) => Cell::DateTimeTz(instant.with_timezone(zone).fixed_offset()),
                        None => Cell::DateTime(instant.naive_utc()),
                    },
                    None => Cell::Null,
                }
            }));
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            out.extend((0..array.len()).map(|i| {
                if array.is_null(i) { Cell::Null } else { Cell::Text(formatter.value(i).to_string()) }
            }));
        }
    }
    Ok(())
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Resolve a time zone given as a fixed offset (`+HH`, `+HHMM`, `+HH:MM`),
/// `Z`, or an IANA name such as `UTC` or `America/Sao_Paulo`.
///
/// Instants read in a named zone keep the local offset in effect at that
/// instant, so their wall time matches what the source recorded.
pub fn resolve_zone(name: &str) -> Option<Tz> {
    match name.trim() {
        "Z" => "+00:00".parse::<Tz>().ok(),
        name => name.parse::<Tz>().ok(),
    }
}

/// Write `table` to `path` as one Snappy-compressed record batch.
///
/// Columns with a single offset keep it; columns mixing offsets are stored in
/// UTC. Mixed-kind columns are stored as text.
pub fn save_table(table: &RecordTable, path: &Path) -> SourceResult<()> {
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());
    for column in table.columns() {
        let array = column_to_array(column);
        fields.push(Field::new(column.name.as_str(), array.data_type().clone(), true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn column_to_array(column: &Column) -> ArrayRef {
    let cells = &column.cells;
    match column.kind() {
        ColumnKind::Bool => Arc::new(BooleanArray::from(
            cells.iter().map(|c| match c {
                Cell::Bool(b) => Some(*b),
                _ => None,
            }).collect::<Vec<_>>(),
        )),
        ColumnKind::Int => Arc::new(Int64Array::from(
            cells.iter().map(|c| match c {
                Cell::Int(i) => Some(*i),
                _ => None,
            }).collect::<Vec<_>>(),
        )),
        ColumnKind::Float | ColumnKind::Numeric => Arc::new(Float64Array::from(
            cells.iter().map(Cell::as_f64).collect::<Vec<_>>(),
        )),
        ColumnKind::DateTime => Arc::new(TimestampMicrosecondArray::from(
            cells.iter().map(|c| match c {
                Cell::DateTime(dt) => Some(dt.and_utc().timestamp_micros()),
                _ => None,
            }).collect::<Vec<_>>(),
        )),
        ColumnKind::DateTimeTz => {
            let mut offsets = cells.iter().filter_map(|c| match c {
                Cell::DateTimeTz(dt) => Some(*dt.offset()),
                _ => None,
            });
            let first = offsets.next().unwrap_or_else(utc);
            let tz = if offsets.all(|o| o == first) { first } else { utc() };
            let micros = cells
                .iter()
                .map(|c| match c {
                    Cell::DateTimeTz(dt) => Some(dt.timestamp_micros()),
                    _ => None,
                })
                .collect::<Vec<_>>();
            Arc::new(TimestampMicrosecondArray::from(micros).with_timezone(tz.to_string()))
        }
        _ => Arc::new(StringArray::from(
            cells
                .iter()
                .map(|c| if c.is_null() { None } else { Some(c.to_string()) })
                .collect::<Vec<_>>(),
        )),
    }
}
