//! Record classification.
//!
//! Each record gets exactly one [`Classification`] from its `Secao` and
//! `Familia` fields. Rules are checked in order and the first match wins:
//!
//! | # | Condition                                   | Category        |
//! |---|---------------------------------------------|-----------------|
//! | 1 | `Secao == "Cardiologia"`                    | Cardiologia     |
//! | 2 | `Secao == "Imagem"`                         | Imagem          |
//! | 3 | `Secao == "Anestesia"` or `Familia == "Cirurgia"` | Bloco Cirurgico |
//! | 4 | `Familia` in `Retorno`, `Consulta`          | Clinica         |
//! | 5 | anything else                               | Clinica         |
//!
//! Rule 5 exists because the source query already restricts the extract to
//! these four areas; there is no "unclassified" bucket.

use std::collections::BTreeMap;

use crate::error::TransformResult;
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{columns, Cell, Classification, RecordTable};

/// Classify one record from its trimmed section and family.
pub fn classify(secao: &str, familia: &str) -> Classification {
    match (secao, familia) {
        ("Cardiologia", _) => Classification::Cardiologia,
        ("Imagem", _) => Classification::Imagem,
        ("Anestesia", _) | (_, "Cirurgia") => Classification::BlocoCirurgico,
        (_, "Retorno" | "Consulta") => Classification::Clinica,
        _ => Classification::Clinica,
    }
}

/// Classify from raw cells; nulls read as empty text.
pub fn classify_cells(secao: &Cell, familia: &Cell) -> Classification {
    classify(&secao.trimmed_text(), &familia.trimmed_text())
}

/// Return a copy of `table` with a `Classificacao` column.
///
/// A table that already has the column is returned unchanged.
///
/// # Errors
/// [`crate::error::TransformError::MissingColumn`] when `Secao` or `Familia` is absent.
pub fn classify_table(table: &RecordTable) -> TransformResult<RecordTable> {
    if table.has_column(columns::CLASSIFICACAO) {
        log_info("Classificacao already present, skipping classification");
        log_distribution(table);
        return Ok(table.clone());
    }

    let secao = table.require(columns::SECAO)?;
    let familia = table.require(columns::FAMILIA)?;

    log_info(format!("Classifying {} records...", table.num_rows()));
    let labels = secao
        .cells
        .iter()
        .zip(&familia.cells)
        .map(|(s, f)| Cell::text(classify_cells(s, f).as_str()))
        .collect();

    let mut out = table.clone();
    out.set_column(columns::CLASSIFICACAO, labels);
    log_distribution(&out);
    log_success("Classification complete");
    Ok(out)
}

/// Row count per category label, in label order.
pub fn distribution(table: &RecordTable) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    if let Some(column) = table.column(columns::CLASSIFICACAO) {
        for cell in &column.cells {
            *counts.entry(cell.trimmed_text()).or_insert(0) += 1;
        }
    }
    counts
}

fn log_distribution(table: &RecordTable) {
    for (label, count) in distribution(table) {
        log_info_indent(format!("{}: {} records", label, count), 1);
    }
}
