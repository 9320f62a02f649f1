//! Delimited-text writer used when the workbook cannot be produced.

use std::path::Path;

use crate::error::ExportResult;
use crate::models::RecordTable;

/// Write `table` as comma-separated text with a header row.
pub fn write_delimited(path: &Path, table: &RecordTable) -> ExportResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.column_names())?;
    for row in 0..table.num_rows() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|column| {
                let cell = &column.cells[row];
                if cell.is_null() {
                    String::new()
                } else {
                    cell.to_string()
                }
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
