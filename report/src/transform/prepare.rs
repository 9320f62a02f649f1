//! Composite preparation step: fill sale values, classify, derive hours.

use std::collections::BTreeMap;

use crate::error::TransformResult;
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{columns, Cell, RecordTable};

use super::classify::classify_table;
use super::duration::derive_hours_table;

/// Return a copy of `table` ready for aggregation.
///
/// Records are always classified (a no-op when `Classificacao` exists). A
/// table that already carries `hora` keeps it; otherwise null `ValorVenda`
/// cells become `0` and `hora` is derived.
pub fn prepare(table: &RecordTable) -> TransformResult<RecordTable> {
    let classified = classify_table(table)?;
    if classified.has_column(columns::HORA) {
        log_info("hora already present, keeping it");
        return Ok(classified);
    }

    let mut filled = classified.clone();
    if let Some(values) = classified.column(columns::VALOR_VENDA) {
        let cells = values
            .cells
            .iter()
            .map(|c| if c.is_null() { Cell::Int(0) } else { c.clone() })
            .collect();
        filled.set_column(columns::VALOR_VENDA, cells);
    }

    let out = derive_hours_table(&filled)?;
    log_hour_means(&out);
    log_success(format!("Prepared {} records", out.num_rows()));
    Ok(out)
}

fn log_hour_means(table: &RecordTable) {
    let (Some(hours), Some(labels)) = (
        table.column(columns::HORA),
        table.column(columns::CLASSIFICACAO),
    ) else {
        return;
    };

    let mut total = 0.0;
    let mut per_category: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (hora, label) in hours.cells.iter().zip(&labels.cells) {
        let value = hora.as_f64().unwrap_or(0.0);
        total += value;
        let entry = per_category.entry(label.trimmed_text()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    if !hours.is_empty() {
        log_info(format!("Mean hours: {:.2}", total / hours.len() as f64));
    }
    for (label, (sum, count)) in per_category {
        log_info_indent(format!("{}: {:.2}", label, sum / count as f64), 1);
    }
}
