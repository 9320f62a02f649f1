//! Per-record duration (`hora`).
//!
//! Hours are a fixed lookup on the category, refined by `Familia` for
//! Cardiologia and by `Centro` for Imagem:
//!
//! | Classificacao   | Condition                        | hora |
//! |-----------------|----------------------------------|------|
//! | Cardiologia     | `Familia` in Consultas, Consulta | 1.5  |
//! | Cardiologia     | otherwise                        | 0.75 |
//! | Clinica         |                                  | 1.0  |
//! | Imagem          | `Centro == "RB"`                 | 0.5  |
//! | Imagem          | otherwise                        | 0.67 |
//! | Bloco Cirurgico |                                  | 3.0  |
//! | unknown label   |                                  | 0.0  |

use crate::error::TransformResult;
use crate::logs::{log_info, log_warning};
use crate::models::{columns, Cell, Classification, RecordTable};

use super::classify::classify_table;

pub const CARDIOLOGIA_CONSULTA_HOURS: f64 = 1.5;
pub const CARDIOLOGIA_HOURS: f64 = 0.75;
pub const CLINICA_HOURS: f64 = 1.0;
pub const IMAGEM_RB_HOURS: f64 = 0.5;
pub const IMAGEM_HOURS: f64 = 0.67;
pub const BLOCO_CIRURGICO_HOURS: f64 = 3.0;
pub const UNKNOWN_HOURS: f64 = 0.0;

/// Unit whose imaging exams are shorter.
pub const IMAGEM_FAST_UNIT: &str = "RB";

/// Hours for one record. `familia` and `centro` must already be trimmed.
pub fn derive_hours(classification: Option<Classification>, familia: &str, centro: &str) -> f64 {
    match classification {
        Some(Classification::Cardiologia) => match familia {
            "Consultas" | "Consulta" => CARDIOLOGIA_CONSULTA_HOURS,
            _ => CARDIOLOGIA_HOURS,
        },
        Some(Classification::Clinica) => CLINICA_HOURS,
        Some(Classification::Imagem) if centro == IMAGEM_FAST_UNIT => IMAGEM_RB_HOURS,
        Some(Classification::Imagem) => IMAGEM_HOURS,
        Some(Classification::BlocoCirurgico) => BLOCO_CIRURGICO_HOURS,
        None => UNKNOWN_HOURS,
    }
}

/// Return a copy of `table` with a `hora` column.
///
/// A table that already has `hora` is returned unchanged. Classification runs
/// first when `Classificacao` is absent. Without `Centro`, every Imagem record
/// takes the non-RB value.
pub fn derive_hours_table(table: &RecordTable) -> TransformResult<RecordTable> {
    if table.has_column(columns::HORA) {
        log_info("hora already present, skipping duration derivation");
        return Ok(table.clone());
    }

    let mut out = if table.has_column(columns::CLASSIFICACAO) {
        table.clone()
    } else {
        log_warning("Classificacao not found, classifying first");
        classify_table(table)?
    };

    if !out.has_column(columns::CENTRO) {
        log_warning("Centro not found; the RB rule for Imagem cannot apply");
    }

    let hours: Vec<Cell> = (0..out.num_rows())
        .map(|row| {
            let label = text_at(&out, columns::CLASSIFICACAO, row);
            let familia = text_at(&out, columns::FAMILIA, row);
            let centro = text_at(&out, columns::CENTRO, row);
            Cell::Float(derive_hours(Classification::from_label(&label), &familia, &centro))
        })
        .collect();

    out.set_column(columns::HORA, hours);
    Ok(out)
}

fn text_at(table: &RecordTable, column: &str, row: usize) -> String {
    table
        .cell(column, row)
        .map(Cell::trimmed_text)
        .unwrap_or_default()
}
