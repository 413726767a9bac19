//! Tag-sample CSV loader
//!
//! Expected header (any column order, case-insensitive):
//!
//! ```text
//! tag_id,value,created_at
//! 1,1200,2024-03-01T06:00:00Z
//! 3,"128",2024-03-01 06:00:00
//! ```
//!
//! Values may be quoted numeric strings. Timestamps accept RFC 3339, naive
//! `YYYY-MM-DD HH:MM:SS[.f]` (UTC), and Unix epoch seconds or milliseconds.
//! Malformed rows are skipped and counted, not fatal.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::types::{parse_sample_value, TagId, TagSample};

/// Parse errors logged individually before going quiet
const MAX_LOGGED_ROW_ERRORS: usize = 10;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("empty file: {0}")]
    Empty(String),
    #[error("missing required column '{column}' in header of {path}")]
    MissingColumn { path: String, column: &'static str },
    #[error("no valid samples in {path} ({errors} malformed rows)")]
    NoSamples { path: String, errors: usize },
}

/// Result of loading one CSV file
#[derive(Debug, Clone, Default)]
pub struct SampleLoad {
    pub samples: Vec<TagSample>,
    /// Rows rejected as malformed
    pub malformed_rows: usize,
}

/// Column positions resolved from the header
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    tag_id: usize,
    value: usize,
    created_at: usize,
}

impl ColumnMap {
    fn from_header(header: &str, path: &str) -> Result<Self, CsvError> {
        let columns: Vec<String> = csv_split(header)
            .into_iter()
            .map(|c| c.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();
        let find = |column: &'static str| {
            columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| CsvError::MissingColumn {
                    path: path.to_string(),
                    column,
                })
        };

        Ok(Self {
            tag_id: find("tag_id")?,
            value: find("value")?,
            created_at: find("created_at")?,
        })
    }
}

/// Split a CSV line into fields, honouring double-quoted fields and `""` escapes.
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Parse a timestamp in any of the accepted formats
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(epoch) = s.parse::<i64>() {
        // Values past year 2286 in seconds are taken as milliseconds
        return if epoch > 10_000_000_000 {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc())
}

fn parse_row(line: &str, columns: ColumnMap) -> Result<TagSample, String> {
    let fields = csv_split(line);
    let field = |idx: usize| fields.get(idx).map(|f| f.trim()).unwrap_or("");

    let tag_id: TagId = field(columns.tag_id)
        .parse()
        .map_err(|_| format!("invalid tag_id '{}'", field(columns.tag_id)))?;
    let value = parse_sample_value(field(columns.value))
        .ok_or_else(|| format!("non-numeric value '{}'", field(columns.value)))?;
    let created_at = parse_timestamp(field(columns.created_at))
        .ok_or_else(|| format!("invalid created_at '{}'", field(columns.created_at)))?;

    Ok(TagSample::new(tag_id, value, created_at))
}

/// Read samples from any buffered reader. `source` names the input in errors.
pub fn read_samples<R: BufRead>(reader: R, source: &str) -> Result<SampleLoad, CsvError> {
    let io_err = |source_err| CsvError::Io {
        path: source.to_string(),
        source: source_err,
    };

    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| CsvError::Empty(source.to_string()))?
        .map_err(io_err)?;
    let columns = ColumnMap::from_header(&header, source)?;

    let mut load = SampleLoad::default();
    for (idx, line) in lines.enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&line, columns) {
            Ok(sample) => load.samples.push(sample),
            Err(e) => {
                if load.malformed_rows < MAX_LOGGED_ROW_ERRORS {
                    tracing::warn!(line = idx + 2, error = %e, "Skipping malformed sample row");
                }
                load.malformed_rows += 1;
            }
        }
    }

    if load.samples.is_empty() {
        return Err(CsvError::NoSamples {
            path: source.to_string(),
            errors: load.malformed_rows,
        });
    }

    tracing::info!(
        source,
        samples = load.samples.len(),
        malformed = load.malformed_rows,
        "Loaded tag samples"
    );
    Ok(load)
}

/// Load samples from a CSV file
pub fn load_samples(path: &Path) -> Result<SampleLoad, CsvError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| CsvError::Io {
        path: path_str.clone(),
        source,
    })?;
    read_samples(BufReader::new(file), &path_str)
}

/// Write samples in the format `read_samples` accepts
pub fn write_samples<W: Write>(mut writer: W, samples: &[TagSample]) -> std::io::Result<()> {
    writeln!(writer, "tag_id,value,created_at")?;
    for s in samples {
        writeln!(writer, "{},{},{}", s.tag_id, s.value, s.created_at.to_rfc3339())?;
    }
    writer.flush()
}
