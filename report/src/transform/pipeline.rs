//! High-level report pipeline.
//!
//! Combines every step: timestamp normalization, period extraction,
//! preparation (classification and hours), validation, per-category
//! aggregation and pivoting, and export.
//!
//! # Example
//!
//! ```rust,ignore
//! use vendas::cache::load_cached_table;
//! use vendas::config::ReportOptions;
//! use vendas::transform::run_report;
//! use std::path::Path;
//!
//! let table = load_cached_table(Path::new("output/dados_vendas_20240131_101500.parquet"))?;
//! let outcome = run_report(&table, &ReportOptions::from_env())?;
//! println!("{} categories exported", outcome.tables.len());
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::aggregate::aggregate;
use super::period::extract_period;
use super::pivot::pivot;
use super::prepare::prepare;
use super::timestamps::normalize_timestamps;
use crate::config::ReportOptions;
use crate::error::{PipelineError, PipelineResult, TransformError, TransformResult};
use crate::export::{export_overall, export_report, ExportOutcome};
use crate::logs::{log_error, log_info, log_success, log_warning, log_warning_indent};
use crate::models::{columns, CategoryTables, Metric, Period, RecordTable};
use crate::validation::check_prepared;

/// A category left out of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCategory {
    pub category: String,
    pub reason: String,
}

/// Per-category tables plus the categories that produced none
#[derive(Debug, Clone, Default)]
pub struct CategoryReport {
    pub tables: BTreeMap<String, CategoryTables>,
    pub skipped: Vec<SkippedCategory>,
}

/// Result of a complete report run
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    /// Where the report was written
    pub export: ExportOutcome,

    /// Tables per category, in category order
    pub tables: BTreeMap<String, CategoryTables>,

    /// Categories skipped, with the reason
    pub skipped: Vec<SkippedCategory>,

    /// Whole-table pivots, present when no category produced tables
    pub overall: Option<CategoryTables>,
}

/// Whole-table steps run once before the per-category work.
pub fn prepare_for_report(table: &RecordTable, default: Period) -> TransformResult<RecordTable> {
    log_info("Step 1: removing time zones");
    let normalized = normalize_timestamps(table);

    log_info("Step 2: extracting year and month");
    let with_period = extract_period(&normalized, default);

    log_info("Step 3: classifying and deriving hours");
    let prepared = prepare(&with_period)?;

    log_info("Step 4: validating prepared data");
    check_prepared(&prepared);
    Ok(prepared)
}

/// Aggregate and pivot each category of a prepared table.
///
/// Categories are processed in label order. A category whose count cannot be
/// computed is skipped; a missing duration column only drops its hour tables.
pub fn build_category_tables(prepared: &RecordTable, default: Period) -> CategoryReport {
    let mut report = CategoryReport::default();

    let Some(labels) = prepared.column(columns::CLASSIFICACAO) else {
        log_warning("No Classificacao column; nothing to report");
        return report;
    };
    let categories: BTreeSet<String> = labels
        .cells
        .iter()
        .filter(|c| !c.is_null())
        .map(|c| c.trimmed_text())
        .collect();

    for category in categories {
        log_info(format!("Processing category: {}", category));
        let subset = prepared.filter_rows(|row| labels.cells[row].trimmed_text() == category);
        if subset.is_empty() {
            log_warning_indent(format!("No records for {}", category), 1);
            report.skipped.push(SkippedCategory {
                category,
                reason: "no records".to_string(),
            });
            continue;
        }

        match category_tables(&subset, default) {
            Ok(tables) => {
                log_success(format!("{}: {} records", category, subset.num_rows()));
                report.tables.insert(category, tables);
            }
            Err(e) => {
                log_warning_indent(format!("{} skipped: {}", category, e), 1);
                report.skipped.push(SkippedCategory {
                    category,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

fn category_tables(subset: &RecordTable, default: Period) -> TransformResult<CategoryTables> {
    let count_detail = aggregate(subset, Metric::Count, default)?;
    let count_pivot = pivot(&count_detail, Metric::Count.value_column());

    let duration_detail = match aggregate(subset, Metric::DurationSum, default) {
        Ok(detail) => Some(detail),
        Err(TransformError::NoMetricColumn) => {
            log_warning_indent("No column to sum hours; hour tables omitted", 1);
            None
        }
        Err(e) => return Err(e),
    };
    let duration_pivot = duration_detail
        .as_ref()
        .map(|detail| pivot(detail, Metric::DurationSum.value_column()));

    Ok(CategoryTables {
        count_pivot,
        duration_pivot,
        count_detail,
        duration_detail,
    })
}

/// Count and hour pivots over the whole prepared table, ignoring categories.
pub fn build_overall_tables(prepared: &RecordTable, default: Period) -> TransformResult<CategoryTables> {
    category_tables(prepared, default)
}

/// Run the full report on `table` and export it under `options.output_dir`.
///
/// When no category yields tables, the whole table is aggregated and exported
/// on `Contagem_por_Periodo` / `Horas_por_Periodo` sheets instead.
///
/// # Errors
/// - [`PipelineError::EmptyInput`] for a table without rows.
/// - [`PipelineError::Transform`] when preparation fails structurally.
/// - [`PipelineError::NoTables`] when neither categories nor the whole table
///   produced tables.
/// - [`PipelineError::Export`] when both export formats fail.
pub fn run_report(table: &RecordTable, options: &ReportOptions) -> PipelineResult<ReportOutcome> {
    if table.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    log_info(format!(
        "Processing {} records, {} columns",
        table.num_rows(),
        table.num_columns()
    ));

    let prepared = prepare_for_report(table, options.default_period)?;
    let CategoryReport { tables, skipped } = build_category_tables(&prepared, options.default_period);
    if tables.is_empty() {
        log_warning("No category tables; reporting the whole table by period");
        let overall = build_overall_tables(&prepared, options.default_period).map_err(|e| {
            log_error(format!("Whole-table report failed: {}", e));
            PipelineError::NoTables
        })?;

        log_info("Step 5: exporting whole-table report");
        let export = export_overall(&overall, &options.output_dir)?;
        return Ok(ReportOutcome {
            export,
            tables,
            skipped,
            overall: Some(overall),
        });
    }

    log_info("Step 5: exporting report");
    let export = export_report(&tables, &options.output_dir, options.sheet_prefix_len)?;
    Ok(ReportOutcome {
        export,
        tables,
        skipped,
        overall: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use tempfile::tempdir;

    fn scenario() -> RecordTable {
        let row = |secao: &str, familia: &str, centro: &str, data: &str| {
            vec![Cell::text(secao), Cell::text(familia), Cell::text(centro), Cell::text(data)]
        };
        RecordTable::from_rows(
            &["Secao", "Familia", "Centro", "DataCriacao"],
            vec![
                row("Cardiologia", "Consulta", "A", "2023-01-05 -03"),
                row("Imagem", "X", "RB", "2023-01-20 -03"),
                row("Anestesia", "Y", "A", "2023-02-01 -03"),
                row("Outra", "Retorno", "B", "2023-02-10 -03"),
            ],
        )
    }

    fn options(dir: &std::path::Path) -> ReportOptions {
        ReportOptions {
            output_dir: dir.to_path_buf(),
            snapshot_dir: dir.to_path_buf(),
            ..ReportOptions::default()
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let prepared = prepare_for_report(&scenario(), Period::DEFAULT).unwrap();

        let labels: Vec<String> = prepared
            .column("Classificacao")
            .unwrap()
            .cells
            .iter()
            .map(|c| c.trimmed_text())
            .collect();
        assert_eq!(labels, vec!["Cardiologia", "Imagem", "Bloco Cirurgico", "Clinica"]);

        let hours: Vec<f64> = prepared
            .column("hora")
            .unwrap()
            .cells
            .iter()
            .map(|c| c.as_f64().unwrap())
            .collect();
        assert_eq!(hours, vec![1.5, 0.5, 3.0, 1.0]);

        let report = build_category_tables(&prepared, Period::DEFAULT);
        assert!(report.skipped.is_empty());
        assert_eq!(report.tables.len(), 4);

        let expected = [
            ("Cardiologia", "2023-01"),
            ("Imagem", "2023-01"),
            ("Bloco Cirurgico", "2023-02"),
            ("Clinica", "2023-02"),
        ];
        for (category, period) in expected {
            let pivot = &report.tables[category].count_pivot;
            assert_eq!(pivot.num_rows(), 1, "{}", category);
            assert_eq!(pivot.column_names(), vec!["Centro", period], "{}", category);
            assert_eq!(pivot.cell(period, 0), Some(&Cell::Int(1)), "{}", category);
        }

        let hours_pivot = report.tables["Bloco Cirurgico"].duration_pivot.as_ref().unwrap();
        assert_eq!(hours_pivot.cell("2023-02", 0), Some(&Cell::Float(3.0)));
    }

    #[test]
    fn test_count_pivot_preserves_row_total() {
        let mut rows = Vec::new();
        for (i, centro) in ["A", "B", "A", "C", "B", "A"].iter().enumerate() {
            let data = format!("2023-0{}-01 -03", i % 3 + 1);
            rows.push(vec![Cell::text("Imagem"), Cell::text("X"), Cell::text(*centro), Cell::text(data)]);
        }
        let table = RecordTable::from_rows(&["Secao", "Familia", "Centro", "DataCriacao"], rows);
        let prepared = prepare_for_report(&table, Period::DEFAULT).unwrap();
        let report = build_category_tables(&prepared, Period::DEFAULT);

        let tables = &report.tables["Imagem"];
        let total: f64 = tables
            .count_pivot
            .columns()
            .iter()
            .filter(|c| c.name != "Centro")
            .flat_map(|c| c.cells.iter())
            .filter_map(Cell::as_f64)
            .sum();
        assert_eq!(total, 6.0);
        assert_eq!(tables.count_pivot.column_names(), vec!["Centro", "2023-01", "2023-02", "2023-03"]);
    }

    #[test]
    fn test_run_report_writes_workbook() {
        let dir = tempdir().unwrap();
        let outcome = run_report(&scenario(), &options(dir.path())).unwrap();
        assert_eq!(outcome.tables.len(), 4);
        match outcome.export {
            ExportOutcome::Workbook(path) => assert!(path.exists()),
            other => panic!("expected workbook, got {:?}", other),
        }
    }

    #[test]
    fn test_precomputed_hours_are_classified_and_reported() {
        let table = RecordTable::from_rows(
            &["Secao", "Familia", "Centro", "DataCriacao", "hora"],
            vec![vec![
                Cell::text("Imagem"),
                Cell::text("X"),
                Cell::text("RB"),
                Cell::text("2023-01-20 -03"),
                Cell::Float(0.5),
            ]],
        );
        let prepared = prepare_for_report(&table, Period::DEFAULT).unwrap();
        assert_eq!(prepared.cell("Classificacao", 0), Some(&Cell::text("Imagem")));

        let report = build_category_tables(&prepared, Period::DEFAULT);
        assert_eq!(report.tables.len(), 1);
        let hours = report.tables["Imagem"].duration_pivot.as_ref().unwrap();
        assert_eq!(hours.cell("2023-01", 0), Some(&Cell::Float(0.5)));
    }

    #[test]
    fn test_whole_table_report_without_categories() {
        let dir = tempdir().unwrap();
        let table = RecordTable::from_rows(
            &["Classificacao", "Centro", "hora", "Ano", "Mes"],
            vec![
                vec![Cell::Null, Cell::text("A"), Cell::Float(1.0), Cell::Int(2023), Cell::Int(1)],
                vec![Cell::Null, Cell::text("A"), Cell::Float(0.5), Cell::Int(2023), Cell::Int(2)],
            ],
        );
        let outcome = run_report(&table, &options(dir.path())).unwrap();
        assert!(outcome.tables.is_empty());

        let overall = outcome.overall.unwrap();
        assert_eq!(overall.count_pivot.column_names(), vec!["Centro", "2023-01", "2023-02"]);
        assert_eq!(overall.count_pivot.cell("2023-02", 0), Some(&Cell::Int(1)));
        let hours = overall.duration_pivot.unwrap();
        assert_eq!(hours.cell("2023-01", 0), Some(&Cell::Float(1.0)));
        assert!(matches!(outcome.export, ExportOutcome::Workbook(ref p) if p.exists()));
    }

    #[test]
    fn test_empty_input() {
        let dir = tempdir().unwrap();
        let empty = RecordTable::from_rows::<&str>(&["Secao", "Familia"], vec![]);
        assert!(matches!(
            run_report(&empty, &options(dir.path())),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn test_missing_classification_inputs_abort() {
        let dir = tempdir().unwrap();
        let table = RecordTable::from_rows(&["Centro"], vec![vec![Cell::text("A")]]);
        let err = run_report(&table, &options(dir.path())).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Transform(TransformError::MissingColumn(ref c)) if c == "Secao"
        ));
        assert!(err.to_string().contains("Secao"));
    }

    #[test]
    fn test_classification_used_as_unit() {
        // Classificacao doubles as the unit when Centro is absent
        let table = RecordTable::from_rows(
            &["Classificacao", "hora", "Ano", "Mes"],
            vec![vec![Cell::text("Imagem"), Cell::Float(0.5), Cell::Int(2024), Cell::Int(2)]],
        );
        let report = build_category_tables(&table, Period::DEFAULT);
        let pivot = &report.tables["Imagem"].count_pivot;
        assert_eq!(pivot.cell("Centro", 0), Some(&Cell::text("Imagem")));
        assert_eq!(pivot.cell("2024-02", 0), Some(&Cell::Int(1)));
    }
}
