//! CSV reader for the historical weather table.
//!
//! Columns are matched by header name, so column order in the file does not
//! matter. Rows must already be in chronological order.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::StringRecord;

use crate::error::{FloodError, Result};
use crate::logic::features::{FeatureVector, FEATURE_COUNT};
use super::record::DatasetRecord;

/// Accepted header names per column; the first entry is canonical
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "datetime"];
const FEATURE_COLUMNS: [&[&str]; FEATURE_COUNT] = [
    &["rainfall"],
    &["temperature", "temp"],
    &["humidity"],
    &["pressure"],
];
const LABEL_COLUMNS: &[&str] = &["label"];

/// Resolved column positions for one file
struct ColumnMap {
    timestamp: usize,
    features: [usize; FEATURE_COUNT],
    label: usize,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();

        let find = |aliases: &[&str]| -> Result<usize> {
            names
                .iter()
                .position(|n| aliases.contains(&n.as_str()))
                .ok_or_else(|| FloodError::TrainingData(format!("missing column '{}'", aliases[0])))
        };

        let mut features = [0usize; FEATURE_COUNT];
        for (slot, &aliases) in features.iter_mut().zip(FEATURE_COLUMNS.iter()) {
            *slot = find(aliases)?;
        }

        Ok(Self {
            timestamp: find(TIMESTAMP_COLUMNS)?,
            features,
            label: find(LABEL_COLUMNS)?,
        })
    }
}

/// Load the training table from a CSV file
pub fn read_csv(path: &Path) -> Result<Vec<DatasetRecord>> {
    let file = File::open(path).map_err(|e| {
        FloodError::TrainingData(format!("cannot open {}: {}", path.display(), e))
    })?;
    let records = parse_csv(file)?;
    log::info!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Parse CSV content; line numbers in errors are 1-based and include the header
pub fn parse_csv<R: Read>(input: R) -> Result<Vec<DatasetRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(FloodError::TrainingData("empty CSV: no header row".to_string()));
    }
    let columns = ColumnMap::from_headers(&headers)?;

    let mut records: Vec<DatasetRecord> = Vec::new();

    for result in reader.records() {
        let row = result.map_err(csv_error)?;
        let line_no = row.position().map(|p| p.line()).unwrap_or(0);

        let record = parse_row(&row, &columns)
            .map_err(|msg| FloodError::TrainingData(format!("line {}: {}", line_no, msg)))?;

        if let Some(prev) = records.last() {
            if record.timestamp <= prev.timestamp {
                return Err(FloodError::TrainingData(format!(
                    "line {}: timestamp {} is not after previous row ({})",
                    line_no, record.timestamp, prev.timestamp
                )));
            }
        }

        records.push(record);
    }

    Ok(records)
}

/// Reader-level failures (bad quoting, ragged rows, IO) keep their line number
fn csv_error(err: csv::Error) -> FloodError {
    match err.position() {
        Some(pos) => FloodError::TrainingData(format!("line {}: {}", pos.line(), err)),
        None => FloodError::TrainingData(err.to_string()),
    }
}

fn parse_row(row: &StringRecord, columns: &ColumnMap) -> std::result::Result<DatasetRecord, String> {
    let cell = |index: usize| row.get(index).unwrap_or("");

    let timestamp = parse_timestamp(cell(columns.timestamp))
        .ok_or_else(|| format!("invalid timestamp '{}'", cell(columns.timestamp)))?;

    let mut values = [0.0f32; FEATURE_COUNT];
    for (i, &col) in columns.features.iter().enumerate() {
        let value: f32 = cell(col)
            .parse()
            .map_err(|_| format!("invalid number '{}' in column {}", cell(col), FEATURE_COLUMNS[i][0]))?;
        if !value.is_finite() {
            return Err(format!("non-finite value in column {}", FEATURE_COLUMNS[i][0]));
        }
        values[i] = value;
    }

    let label = parse_label(cell(columns.label))
        .ok_or_else(|| format!("label must be 0 or 1, found '{}'", cell(columns.label)))?;

    Ok(DatasetRecord::new(timestamp, FeatureVector::from_values(values), label))
}

/// Parse RFC 3339, "YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DDTHH:MM:SS" (UTC assumed)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_label(s: &str) -> Option<u8> {
    match s {
        "0" => Some(0),
        "1" => Some(1),
        other => match other.parse::<f32>().ok()? {
            v if v == 0.0 => Some(0),
            v if v == 1.0 => Some(1),
            _ => None,
        },
    }
}
