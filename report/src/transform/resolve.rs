//! Column resolution by ordered candidates.
//!
//! Source tables do not always use the canonical column names, so the
//! aggregator looks its columns up through a list of candidates and takes
//! the first one that matches.

use crate::models::{columns, Column, RecordTable};

/// A predicate over a column.
#[derive(Debug, Clone, Copy)]
pub enum Candidate {
    /// Column named exactly so.
    Exact(&'static str),
    /// Column whose lowercased name contains any of the fragments.
    NameContains(&'static [&'static str]),
    /// First column holding only numbers, skipping the listed names.
    Numeric { exclude: &'static [&'static str] },
}

impl Candidate {
    fn matches(&self, column: &Column) -> bool {
        match self {
            Candidate::Exact(name) => column.name == *name,
            Candidate::NameContains(fragments) => {
                let lower = column.name.to_lowercase();
                fragments.iter().any(|f| lower.contains(f))
            }
            Candidate::Numeric { exclude } => {
                !exclude.contains(&column.name.as_str()) && column.kind().is_numeric()
            }
        }
    }
}

/// Unit dimension: `Centro`, then any "centr"/"unit" column, then `Classificacao`.
pub const UNIT_CANDIDATES: &[Candidate] = &[
    Candidate::Exact(columns::CENTRO),
    Candidate::NameContains(&["centr", "unit"]),
    Candidate::Exact(columns::CLASSIFICACAO),
];

/// Duration source: `hora`, then any "hora"/"time"/"duracao" column,
/// then `ValorVenda`, then the first numeric column other than the period keys.
pub const DURATION_CANDIDATES: &[Candidate] = &[
    Candidate::Exact(columns::HORA),
    Candidate::NameContains(&["hora", "time", "duracao"]),
    Candidate::Exact(columns::VALOR_VENDA),
    Candidate::Numeric {
        exclude: &[columns::ANO, columns::MES],
    },
];

/// Name of the first column matched by the earliest candidate, if any.
///
/// Candidates are tried in order; within one candidate, columns are tried in
/// table order.
pub fn resolve_column(table: &RecordTable, candidates: &[Candidate]) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        table
            .columns()
            .iter()
            .find(|column| candidate.matches(column))
            .map(|column| column.name.clone())
    })
}
