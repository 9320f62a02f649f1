//! Delimited-text source with encoding and delimiter auto-detection.
//!
//! Loads a CSV export into a [`RecordTable`]. Each column is typed from all
//! of its non-empty values:
//!
//! - every value an integer (no leading zeros) → `Int`
//! - every value a number → `Float`
//! - every value `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` → `DateTime`
//! - otherwise → `Text`
//!
//! Empty values are null. Timestamps carrying an offset suffix
//! (`2023-03-09 04:40:17 -03`) stay text; the timestamp normalizer owns them.

use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{SourceError, SourceResult};
use crate::logs::log_info;
use crate::models::{Cell, RecordTable, DATETIME_FORMAT};

/// A loaded table with the detected input settings
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub table: RecordTable,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding; unknown encodings decode as lossy UTF-8
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Pick the separator occurring most often in the header line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ';';
    let mut best_count = 0;
    for sep in [';', ',', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Load a CSV file with auto-detection of encoding and delimiter.
pub fn load_csv_file(path: &Path) -> SourceResult<ParsedTable> {
    let bytes = std::fs::read(path)?;
    let parsed = parse_bytes_auto(&bytes)?;
    log_info(format!(
        "Read {} rows from {} (encoding {}, delimiter {:?})",
        parsed.table.num_rows(),
        path.display(),
        parsed.encoding,
        parsed.delimiter
    ));
    Ok(parsed)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> SourceResult<ParsedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_str(&content, delimiter)?;
    Ok(ParsedTable {
        table,
        encoding,
        delimiter,
    })
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char) -> SourceResult<RecordTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = unique_headers(reader.headers().map_err(csv_error)?.iter());
    if headers.iter().all(String::is_empty) {
        return Err(SourceError::Csv {
            line: 1,
            message: "No headers found".to_string(),
        });
    }

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        for (i, column) in raw.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let rows = raw.first().map(Vec::len).unwrap_or(0);
    let mut table = RecordTable::new();
    for (name, values) in headers.iter().zip(raw) {
        debug_assert_eq!(values.len(), rows);
        table.set_column(name, type_column(values));
    }
    Ok(table)
}

/// Header names with repeats suffixed: `Centro`, `Centro_2`, `Centro_3`.
fn unique_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .map(|name| {
            let mut candidate = name.to_string();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", name, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn csv_error(e: csv::Error) -> SourceError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    SourceError::Csv {
        line,
        message: e.to_string(),
    }
}

/// Type a column from all its values; see the module docs.
fn type_column(values: Vec<String>) -> Vec<Cell> {
    let present = || values.iter().filter(|v| !v.is_empty());

    if present().all(|v| parse_int(v).is_some()) {
        return values.iter().map(|v| parse_int(v).map(Cell::Int).unwrap_or(Cell::Null)).collect();
    }
    if present().all(|v| parse_float(v).is_some()) {
        return values.iter().map(|v| parse_float(v).map(Cell::Float).unwrap_or(Cell::Null)).collect();
    }
    if present().all(|v| parse_datetime(v).is_some()) {
        return values.iter().map(|v| parse_datetime(v).map(Cell::DateTime).unwrap_or(Cell::Null)).collect();
    }
    values
        .into_iter()
        .map(|v| if v.is_empty() { Cell::Null } else { Cell::Text(v) })
        .collect()
}

/// Integer without leading zeros, so codes like `007` stay text.
fn parse_int(value: &str) -> Option<i64> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    value.parse().ok()
}

fn parse_float(value: &str) -> Option<f64> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_str("Centro;Qtd\nA;30\nB;25", ';').unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.cell("Centro", 0), Some(&Cell::text("A")));
        assert_eq!(table.cell("Qtd", 1), Some(&Cell::Int(25)));
    }

    #[test]
    fn test_quoted_values_and_padding() {
        let table = parse_str("a;b;c\n\"x;y\";;3\n1", ';').unwrap();
        assert_eq!(table.cell("a", 0), Some(&Cell::text("x;y")));
        assert_eq!(table.cell("b", 0), Some(&Cell::Null));
        assert_eq!(table.cell("c", 1), Some(&Cell::Null));
    }

    #[test]
    fn test_column_typing() {
        let csv = "codigo,valor,data,criacao\n\
                   007,1.5,2023-01-05,2023-03-09 04:40:17 -03\n\
                   12,2,2023-01-06 10:00:00,2023-03-10 04:40:17 -03\n";
        let table = parse_str(csv, ',').unwrap();
        assert_eq!(table.cell("codigo", 0), Some(&Cell::text("007")));
        assert_eq!(table.cell("valor", 1), Some(&Cell::Float(2.0)));
        let date = NaiveDate::from_ymd_opt(2023, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(table.cell("data", 0), Some(&Cell::DateTime(date)));
        assert_eq!(
            table.cell("criacao", 0),
            Some(&Cell::text("2023-03-09 04:40:17 -03"))
        );
    }

    #[test]
    fn test_duplicate_headers_kept_apart() {
        let table = parse_str("Centro;Centro;Centro_2;Centro\nA;B;C;D", ';').unwrap();
        assert_eq!(table.column_names(), vec!["Centro", "Centro_2", "Centro_2_2", "Centro_3"]);
        assert_eq!(table.cell("Centro", 0), Some(&Cell::text("A")));
        assert_eq!(table.cell("Centro_2", 0), Some(&Cell::text("B")));
        assert_eq!(table.cell("Centro_3", 0), Some(&Cell::text("D")));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_empty_input_error() {
        assert!(matches!(parse_str("", ';'), Err(SourceError::Csv { .. })));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"Secao;Familia\nImagem;X").unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.table.column_names(), vec!["Secao", "Familia"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Cirurgião" in ISO-8859-1
        let bytes: &[u8] = b"Cirurgi\xE3o";
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Cirurgião");
    }
}
