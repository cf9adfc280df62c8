//! Roster CSV decoding.
//!
//! Rosters come from spreadsheet exports, so the bytes may be UTF-8 with or
//! without a BOM, or the legacy Korean code page (CP949/EUC-KR). The file has
//! exactly two columns, student number and name, labelled either in Korean
//! (`학번`, `성명`) or in English (`student_no`, `name`).

use encoding_rs::EUC_KR;
use thiserror::Error;

pub const CSV_TEMPLATE: &str = "학번,성명\n20250101,홍길동\n20250102,김철수\n";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

const NUMBER_HEADERS: [&str; 2] = ["학번", "student_no"];
const NAME_HEADERS: [&str; 2] = ["성명", "name"];

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("file is neither UTF-8 nor CP949 text")]
    Encoding,

    #[error("header must be 학번,성명 or student_no,name (found {found:?})")]
    Header { found: Vec<String> },

    #[error("malformed CSV: {0}")]
    Parse(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    /// 1-based line in the source file.
    pub line: u64,
    pub student_no: String,
    pub student_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8Bom,
    Utf8,
    EucKr,
}

pub fn decode_text(bytes: &[u8]) -> Result<(String, SourceEncoding), CsvImportError> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return std::str::from_utf8(rest)
            .map(|s| (s.to_string(), SourceEncoding::Utf8Bom))
            .map_err(|_| CsvImportError::Encoding);
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok((s.to_string(), SourceEncoding::Utf8));
    }
    EUC_KR
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| (s.into_owned(), SourceEncoding::EucKr))
        .ok_or(CsvImportError::Encoding)
}

/// Rows are returned as found, blanks included; the importer decides what to reject.
pub fn parse_roster(bytes: &[u8]) -> Result<Vec<RosterRow>, CsvImportError> {
    let (text, _) = decode_text(bytes)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let position = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let (Some(no_idx), Some(name_idx)) = (position(&NUMBER_HEADERS), position(&NAME_HEADERS)) else {
        return Err(CsvImportError::Header { found: headers });
    };
    if headers.len() != 2 {
        return Err(CsvImportError::Header { found: headers });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        rows.push(RosterRow {
            line,
            student_no: record.get(no_idx).unwrap_or("").trim().to_string(),
            student_name: record.get(name_idx).unwrap_or("").trim().to_string(),
        });
    }
    Ok(rows)
}
