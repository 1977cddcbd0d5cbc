//! Reads the UNHCR population statistics export.
//!
//! The export is latin-1 encoded and starts with a few lines of free-text
//! metadata before the CSV header. Columns are located by header name, so a
//! reordered export still loads; a missing or unknown column is an error.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::common::{Measure, RawRecord, Year};

/// Non-data lines preceding the header row.
pub const PREAMBLE_LINES: usize = 3;

pub const YEAR_HEADER: &str = "Year";
pub const ASYLUM_RESIDENCE_HEADER: &str = "Country / territory of asylum/residence";
pub const ORIGIN_HEADER: &str = "Origin";
pub const POPULATION_TYPE_HEADER: &str = "Population type";
pub const VALUE_HEADER: &str = "Value";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("source ends before the header row")]
    Truncated,

    #[error("source header is missing column \"{0}\"")]
    MissingColumn(&'static str),

    #[error("source header has unexpected column \"{0}\"")]
    UnexpectedColumn(String),

    #[error("source header has {0} columns, expected 5")]
    ColumnCount(usize),

    #[error("line {line}: invalid year \"{value}\"")]
    InvalidYear { line: u64, value: String },
}

/// Positions of the five known columns within the source header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSchema {
    pub year: usize,
    pub asylum_residence: usize,
    pub origin: usize,
    pub population_type: usize,
    pub value: usize,
}

impl SourceSchema {
    /// Validate a header row and locate each column in it.
    pub fn from_headers(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let known = [
            YEAR_HEADER,
            ASYLUM_RESIDENCE_HEADER,
            ORIGIN_HEADER,
            POPULATION_TYPE_HEADER,
            VALUE_HEADER,
        ];
        for h in headers.iter() {
            if !known.iter().any(|k| k.eq_ignore_ascii_case(h.trim())) {
                return Err(LoadError::UnexpectedColumn(h.to_string()));
            }
        }

        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or(LoadError::MissingColumn(name))
        };

        let schema = Self {
            year: find(YEAR_HEADER)?,
            asylum_residence: find(ASYLUM_RESIDENCE_HEADER)?,
            origin: find(ORIGIN_HEADER)?,
            population_type: find(POPULATION_TYPE_HEADER)?,
            value: find(VALUE_HEADER)?,
        };
        if headers.len() != known.len() {
            return Err(LoadError::ColumnCount(headers.len()));
        }
        Ok(schema)
    }
}

/// Decode latin-1 bytes. Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Byte offset just past the first `n` lines of `text`.
fn skip_lines(text: &str, n: usize) -> Option<usize> {
    let mut offset = 0;
    for _ in 0..n {
        let nl = text[offset..].find('\n')?;
        offset += nl + 1;
    }
    Some(offset)
}

/// Parse an already decoded export.
pub fn parse_source(text: &str) -> Result<Vec<RawRecord>, LoadError> {
    let start = skip_lines(text, PREAMBLE_LINES).ok_or(LoadError::Truncated)?;
    let body = &text[start..];
    if body.trim().is_empty() {
        return Err(LoadError::Truncated);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let schema = SourceSchema::from_headers(rdr.headers()?)?;
    debug!("Source schema: {:?}", schema);

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = row
            .position()
            .map(|p| p.line() + PREAMBLE_LINES as u64)
            .unwrap_or_default();
        let field = |i: usize| row.get(i).unwrap_or_default();

        let year_cell = field(schema.year).trim();
        let year = year_cell
            .parse::<i32>()
            .map(Year)
            .map_err(|_| LoadError::InvalidYear {
                line,
                value: year_cell.to_string(),
            })?;

        records.push(RawRecord {
            line,
            year,
            asylum_residence: field(schema.asylum_residence).to_string(),
            origin: field(schema.origin).to_string(),
            population_type: field(schema.population_type).to_string(),
            value: Measure::parse(field(schema.value)),
        });
    }

    Ok(records)
}

/// Load the export from disk.
pub fn load_source(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    info!("  Loading {}", path.display());
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_source(&decode_latin1(&bytes))?;
    info!("    {} rows", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "Extracted from the UNHCR Population Statistics Reference Database\n\
                            Date extracted: 2017-04-30\n\
                            \n";

    fn source(body: &str) -> String {
        format!("{PREAMBLE}{body}")
    }

    #[test]
    fn test_parse_basic() {
        let text = source(
            "Year,Country / territory of asylum/residence,Origin,Population type,Value\n\
             1951,Australia,Various/Unknown,Refugees (incl. refugee-like situations),180000\n\
             1951,Austria,Various/Unknown,Refugees (incl. refugee-like situations),*\n\
             1952,Belgium,Various/Unknown,Asylum-seekers,\n",
        );
        let records = parse_source(&text).expect("parse failed");
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].year, Year(1951));
        assert_eq!(records[0].asylum_residence, "Australia");
        assert_eq!(records[0].origin, "Various/Unknown");
        assert_eq!(records[0].value, Measure::Count(180000));
        assert_eq!(records[0].line, 5);

        assert_eq!(records[1].value, Measure::Suppressed);
        assert_eq!(records[2].value, Measure::Missing);
    }

    #[test]
    fn test_columns_located_by_name() {
        let text = source(
            "Country / territory of asylum/residence,Origin,Population type,Year,Value\n\
             Chad,Sudan,Refugees (incl. refugee-like situations),2004,200000\n",
        );
        let records = parse_source(&text).expect("parse failed");
        assert_eq!(records[0].year, Year(2004));
        assert_eq!(records[0].asylum_residence, "Chad");
        assert_eq!(records[0].origin, "Sudan");
    }

    #[test]
    fn test_missing_column() {
        let text = source("Year,Origin,Population type,Value\n2000,Chad,Refugees,1\n");
        assert!(matches!(
            parse_source(&text),
            Err(LoadError::MissingColumn(ASYLUM_RESIDENCE_HEADER))
        ));
    }

    #[test]
    fn test_unexpected_column() {
        let text = source(
            "Year,Country / territory of asylum/residence,Origin,Population type,Value,Notes\n",
        );
        assert!(matches!(
            parse_source(&text),
            Err(LoadError::UnexpectedColumn(c)) if c == "Notes"
        ));
    }

    #[test]
    fn test_repeated_column() {
        let text = source(
            "Year,Country / territory of asylum/residence,Origin,Population type,Value,Year\n",
        );
        assert!(matches!(parse_source(&text), Err(LoadError::ColumnCount(6))));
    }

    #[test]
    fn test_invalid_year() {
        let text = source(
            "Year,Country / territory of asylum/residence,Origin,Population type,Value\n\
             19x1,Chad,Sudan,Refugees,1\n",
        );
        assert!(matches!(
            parse_source(&text),
            Err(LoadError::InvalidYear { line: 5, .. })
        ));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(parse_source("a\nb\n"), Err(LoadError::Truncated)));
        assert!(matches!(parse_source(PREAMBLE), Err(LoadError::Truncated)));
    }

    #[test]
    fn test_latin1_names() {
        let mut bytes = source(
            "Year,Country / territory of asylum/residence,Origin,Population type,Value\n\
             2000,",
        )
        .into_bytes();
        // "Côte d'Ivoire" with 0xF4 for ô
        bytes.extend_from_slice(b"C\xf4te d'Ivoire,Liberia,Refugees,10\n");
        let records = parse_source(&decode_latin1(&bytes)).expect("parse failed");
        assert_eq!(records[0].asylum_residence, "Côte d'Ivoire");
    }
}
