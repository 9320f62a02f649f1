//! Report export.
//!
//! The per-category pivots go into one workbook with a `{prefix}_Contagem`
//! and a `{prefix}_Horas` sheet per category. When the workbook cannot be
//! written, each pivot is written to its own CSV file instead:
//!
//! ```text
//! output/relatorio_por_classificacao_20240131_101500.xlsx
//!   ├── Bloco Cirurgico_Contagem
//!   ├── Bloco Cirurgico_Horas
//!   └── ...
//!
//! fallback:
//! output/Bloco Cirurgico_contagem_20240131_101500.csv
//! output/Bloco Cirurgico_horas_20240131_101500.csv
//! ```
//!
//! When no category yields tables, the whole table is reported instead on
//! two sheets, `Contagem_por_Periodo` and `Horas_por_Periodo`.

pub mod delimited;
pub mod workbook;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::error::{ExportError, ExportResult};
use crate::logs::{log_error, log_info, log_success, log_success_indent, log_warning};
use crate::models::{CategoryTables, Metric, RecordTable};

pub use delimited::write_delimited;
pub use workbook::{write_workbook, Sheet};

/// Characters Excel rejects in sheet names.
const INVALID_SHEET_CHARS: &[char] = &['/', '\\', '[', ']', ':', '*', '?'];

/// Where a report ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "paths", rename_all = "snake_case")]
pub enum ExportOutcome {
    Workbook(PathBuf),
    DelimitedFiles(Vec<PathBuf>),
}

/// Timestamp used in output file names.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Category prefix for sheet and file names: at most `max_len` characters,
/// with separators and other sheet-invalid characters replaced by `_`.
pub fn sheet_prefix(category: &str, max_len: usize) -> String {
    category
        .chars()
        .take(max_len)
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Sheet name of the whole-table count pivot.
pub const OVERALL_COUNT_SHEET: &str = "Contagem_por_Periodo";

/// Sheet name of the whole-table hours pivot.
pub const OVERALL_HOURS_SHEET: &str = "Horas_por_Periodo";

/// A table headed for the report, with its sheet name and CSV file stem.
struct Output<'a> {
    sheet: String,
    stem: String,
    table: &'a RecordTable,
}

fn category_outputs(tables: &BTreeMap<String, CategoryTables>, prefix_len: usize) -> Vec<Output<'_>> {
    let mut sheets = HashSet::new();
    let mut stems = HashSet::new();
    let mut outputs = Vec::new();
    for (category, category_tables) in tables {
        let prefix = sheet_prefix(category, prefix_len);
        for metric in [Metric::Count, Metric::DurationSum] {
            if let Some(table) = category_tables.pivot(metric) {
                outputs.push(Output {
                    sheet: unique_name(&mut sheets, format!("{}_{}", prefix, metric.sheet_suffix())),
                    stem: unique_name(&mut stems, format!("{}_{}", prefix, metric.file_label())),
                    table,
                });
            }
        }
    }
    outputs
}

fn overall_outputs(overall: &CategoryTables) -> Vec<Output<'_>> {
    [(Metric::Count, OVERALL_COUNT_SHEET), (Metric::DurationSum, OVERALL_HOURS_SHEET)]
        .into_iter()
        .filter_map(|(metric, sheet)| {
            overall.pivot(metric).map(|table| Output {
                sheet: sheet.to_string(),
                stem: sheet.to_lowercase(),
                table,
            })
        })
        .collect()
}

/// Export `tables` into `output_dir`, falling back to CSV files.
///
/// # Errors
/// [`ExportError::AllFailed`] when both the workbook and the fallback fail.
pub fn export_report(
    tables: &BTreeMap<String, CategoryTables>,
    output_dir: &Path,
    prefix_len: usize,
) -> ExportResult<ExportOutcome> {
    export_outputs(&category_outputs(tables, prefix_len), output_dir)
}

/// Export whole-table pivots as the `Contagem_por_Periodo` and
/// `Horas_por_Periodo` sheets, used when no category produced tables.
pub fn export_overall(overall: &CategoryTables, output_dir: &Path) -> ExportResult<ExportOutcome> {
    export_outputs(&overall_outputs(overall), output_dir)
}

fn export_outputs(outputs: &[Output<'_>], output_dir: &Path) -> ExportResult<ExportOutcome> {
    let timestamp = file_timestamp();
    let workbook_path = output_dir.join(format!("relatorio_por_classificacao_{}.xlsx", timestamp));

    let workbook_error = match write_sheets(outputs, &workbook_path) {
        Ok(()) => {
            log_success(format!("Report saved: {}", workbook_path.display()));
            return Ok(ExportOutcome::Workbook(workbook_path));
        }
        Err(e) => e,
    };

    log_warning(format!("Workbook export failed: {}", workbook_error));
    log_info("Saving CSV files instead...");
    match write_files(outputs, output_dir, &timestamp) {
        Ok(paths) => {
            log_success(format!("{} CSV file(s) saved in {}", paths.len(), output_dir.display()));
            Ok(ExportOutcome::DelimitedFiles(paths))
        }
        Err(fallback) => {
            log_error(format!("CSV export failed: {}", fallback));
            Err(ExportError::AllFailed {
                workbook: workbook_error.to_string(),
                fallback: fallback.to_string(),
            })
        }
    }
}

/// Write every category's pivots as sheets of one workbook.
pub fn export_workbook(
    tables: &BTreeMap<String, CategoryTables>,
    path: &Path,
    prefix_len: usize,
) -> ExportResult<()> {
    write_sheets(&category_outputs(tables, prefix_len), path)
}

/// Write every category's pivots as individual CSV files.
pub fn export_delimited(
    tables: &BTreeMap<String, CategoryTables>,
    output_dir: &Path,
    prefix_len: usize,
    timestamp: &str,
) -> ExportResult<Vec<PathBuf>> {
    write_files(&category_outputs(tables, prefix_len), output_dir, timestamp)
}

fn write_sheets(outputs: &[Output<'_>], path: &Path) -> ExportResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let sheets: Vec<Sheet<'_>> = outputs
        .iter()
        .map(|o| Sheet {
            name: o.sheet.clone(),
            table: o.table,
        })
        .collect();
    write_workbook(path, &sheets)
}

fn write_files(outputs: &[Output<'_>], output_dir: &Path, timestamp: &str) -> ExportResult<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let mut paths = Vec::with_capacity(outputs.len());
    for output in outputs {
        let path = output_dir.join(format!("{}_{}.csv", output.stem, timestamp));
        write_delimited(&path, output.table)?;
        log_success_indent(path.display().to_string(), 1);
        paths.push(path);
    }
    Ok(paths)
}

/// `name`, or `name_2`, `name_3`... when already taken.
fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", name, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use tempfile::TempDir;

    fn category(count: i64, hours: Option<f64>) -> CategoryTables {
        let count_pivot = RecordTable::from_rows(&["Centro", "2023-01"], vec![vec![Cell::text("A"), Cell::Int(count)]]);
        let duration_pivot = hours.map(|h| {
            RecordTable::from_rows(&["Centro", "2023-01"], vec![vec![Cell::text("A"), Cell::Float(h)]])
        });
        CategoryTables {
            count_detail: count_pivot.clone(),
            duration_detail: duration_pivot.clone(),
            count_pivot,
            duration_pivot,
        }
    }

    fn report() -> BTreeMap<String, CategoryTables> {
        let mut tables = BTreeMap::new();
        tables.insert("Bloco Cirurgico".to_string(), category(2, Some(6.0)));
        tables.insert("Imagem".to_string(), category(1, None));
        tables
    }

    #[test]
    fn test_sheet_prefix() {
        assert_eq!(sheet_prefix("Bloco Cirurgico", 15), "Bloco Cirurgico");
        assert_eq!(sheet_prefix("Centro/Unidade\\Muito Longo", 15), "Centro_Unidade_");
        assert_eq!(sheet_prefix("a:b", 15), "a_b");
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name(&mut used, "x".into()), "x");
        assert_eq!(unique_name(&mut used, "x".into()), "x_2");
    }

    #[test]
    fn test_workbook_export() {
        let dir = TempDir::new().unwrap();
        let outcome = export_report(&report(), &dir.path().join("out"), 15).unwrap();
        match outcome {
            ExportOutcome::Workbook(path) => {
                assert!(path.exists());
                let name = path.file_name().unwrap().to_string_lossy().to_string();
                assert!(name.starts_with("relatorio_por_classificacao_"));
                assert!(name.ends_with(".xlsx"));
            }
            other => panic!("expected workbook, got {:?}", other),
        }
    }

    #[test]
    fn test_delimited_export() {
        let dir = TempDir::new().unwrap();
        let paths = export_delimited(&report(), dir.path(), 15, "20240101_000000").unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Bloco Cirurgico_contagem_20240101_000000.csv",
                "Bloco Cirurgico_horas_20240101_000000.csv",
                "Imagem_contagem_20240101_000000.csv",
            ]
        );
        let content = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(content, "Centro,2023-01\nA,2\n");
    }

    #[test]
    fn test_fallback_when_workbook_fails() {
        let dir = TempDir::new().unwrap();
        let mut tables = BTreeMap::new();
        // sheet names cannot start with an apostrophe
        tables.insert("'quoted".to_string(), category(1, None));
        let outcome = export_report(&tables, dir.path(), 15).unwrap();
        assert!(matches!(outcome, ExportOutcome::DelimitedFiles(ref p) if p.len() == 1));
    }

    #[test]
    fn test_overall_sheets() {
        let overall = category(3, Some(4.5));
        let names: Vec<String> = overall_outputs(&overall).into_iter().map(|o| o.sheet).collect();
        assert_eq!(names, vec!["Contagem_por_Periodo", "Horas_por_Periodo"]);

        let dir = TempDir::new().unwrap();
        match export_overall(&overall, dir.path()).unwrap() {
            ExportOutcome::Workbook(path) => assert!(path.exists()),
            other => panic!("expected workbook, got {:?}", other),
        }

        let paths = write_files(&overall_outputs(&category(3, None)), dir.path(), "20240101_000000").unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("contagem_por_periodo_20240101_000000.csv"));
    }
}
