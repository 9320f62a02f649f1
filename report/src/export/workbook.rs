//! Spreadsheet workbook writer.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::ExportResult;
use crate::models::{Cell, RecordTable};

/// One worksheet to write.
pub struct Sheet<'a> {
    pub name: String,
    pub table: &'a RecordTable,
}

/// Write `sheets` in order into a new workbook at `path`.
pub fn write_workbook(path: &Path, sheets: &[Sheet<'_>]) -> ExportResult<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        write_table(worksheet, sheet.table, &header)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &RecordTable, header: &Format) -> ExportResult<()> {
    for (col, column) in table.columns().iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, &column.name, header)?;
        for (row, cell) in column.cells.iter().enumerate() {
            let row = row as u32 + 1;
            match cell {
                c if c.is_null() => {}
                Cell::Int(i) => {
                    worksheet.write_number(row, col, *i as f64)?;
                }
                Cell::Float(f) => {
                    worksheet.write_number(row, col, *f)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                other => {
                    worksheet.write_string(row, col, other.to_string())?;
                }
            }
        }
    }
    Ok(())
}
