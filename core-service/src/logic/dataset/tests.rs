use super::reader::{parse_csv, parse_timestamp, read_csv};
use super::record::split_columns;
use super::synthetic::{generate, label_for, SyntheticConfig};
use super::writer::write_csv;
use crate::error::FloodError;
use std::io::Cursor;
use tempfile::tempdir;

#[test]
fn test_parse_original_column_names() {
    let csv = "datetime,rainfall,temp,humidity,pressure,label\n\
               2020-01-01 00:00:00,3.5,28.1,74.0,1009.2,0\n\
               2020-01-01 01:00:00,11.0,27.4,90.5,1005.0,1\n";

    let records = parse_csv(Cursor::new(csv)).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].features.temperature(), 28.1);
    assert_eq!(records[1].features.rainfall(), 11.0);
    assert_eq!(records[1].label, 1);
}

#[test]
fn test_columns_matched_by_name_not_position() {
    let csv = "label,pressure,humidity,temperature,rainfall,timestamp\n\
               1,1001.0,90.0,26.0,12.0,2021-06-01T10:00:00Z\n";

    let records = parse_csv(Cursor::new(csv)).unwrap();

    assert_eq!(records[0].features.values, [12.0, 26.0, 90.0, 1001.0]);
    assert_eq!(records[0].label, 1);
}

#[test]
fn test_missing_column_is_rejected() {
    let csv = "timestamp,rainfall,temperature,humidity,label\n";
    let err = parse_csv(Cursor::new(csv)).unwrap_err();
    assert!(matches!(err, FloodError::TrainingData(ref m) if m.contains("pressure")));
}

#[test]
fn test_unordered_timestamps_are_rejected() {
    let csv = "timestamp,rainfall,temperature,humidity,pressure,label\n\
               2020-01-01 01:00:00,1,28,70,1010,0\n\
               2020-01-01 00:00:00,1,28,70,1010,0\n";

    let err = parse_csv(Cursor::new(csv)).unwrap_err();
    assert!(matches!(err, FloodError::TrainingData(ref m) if m.starts_with("line 3")));
}

#[test]
fn test_bad_label_is_rejected() {
    let csv = "timestamp,rainfall,temperature,humidity,pressure,label\n\
               2020-01-01 00:00:00,1,28,70,1010,2\n";
    assert!(parse_csv(Cursor::new(csv)).is_err());
}

#[test]
fn test_parse_timestamp_formats() {
    let a = parse_timestamp("2020-01-01 05:00:00").unwrap();
    let b = parse_timestamp("2020-01-01T05:00:00").unwrap();
    let c = parse_timestamp("2020-01-01T07:00:00+02:00").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert!(parse_timestamp("yesterday").is_none());
}

#[test]
fn test_write_then_read_csv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("history.csv");

    let records = generate(&SyntheticConfig { rows: 50, ..Default::default() }).unwrap();
    write_csv(&path, &records).unwrap();

    let loaded = read_csv(&path).unwrap();
    assert_eq!(loaded.len(), 50);
    assert_eq!(loaded[0].timestamp, records[0].timestamp);
    assert_eq!(loaded[49].label, records[49].label);
    assert_eq!(loaded[7].features, records[7].features);
}

#[test]
fn test_synthetic_is_hourly_and_seeded() {
    let config = SyntheticConfig { rows: 200, ..Default::default() };
    let a = generate(&config).unwrap();
    let b = generate(&config).unwrap();

    assert_eq!(a, b);
    assert_eq!(
        (a[1].timestamp - a[0].timestamp).num_minutes(),
        60
    );
    for r in &a {
        assert!(r.features.rainfall() >= 0.0);
        assert_eq!(r.label, label_for(r.features.rainfall(), r.features.humidity()));
    }
}

#[test]
fn test_label_rule() {
    assert_eq!(label_for(10.5, 50.0), 1);
    assert_eq!(label_for(6.0, 90.0), 1);
    assert_eq!(label_for(6.0, 80.0), 0);
    assert_eq!(label_for(10.0, 85.0), 0);
}

#[test]
fn test_split_columns_keeps_order() {
    let records = generate(&SyntheticConfig { rows: 5, ..Default::default() }).unwrap();
    let (rows, labels) = split_columns(&records);
    assert_eq!(rows.len(), 5);
    assert_eq!(labels[3], records[3].label);
    assert_eq!(rows[4], records[4].features);
}

#[test]
fn test_quoted_fields_and_extra_columns() {
    let csv = "station,timestamp,rainfall,temperature,humidity,pressure,label\n\
               \"Jakarta, Pusat\",2020-01-01 00:00:00, 7.5 ,27.0,88.0,1006.5,1\n\
               \"Bogor, \"\"Hulu\"\"\",2020-01-01 01:00:00,0.0,29.5,70.0,1011.0,0\n";

    let records = parse_csv(Cursor::new(csv)).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].features.values, [7.5, 27.0, 88.0, 1006.5]);
    assert_eq!(records[1].features.temperature(), 29.5);
    assert_eq!(records[1].label, 0);
}

#[test]
fn test_ragged_row_reports_line() {
    let csv = "timestamp,rainfall,temperature,humidity,pressure,label\n\
               2020-01-01 00:00:00,1,28,70,1010,0\n\
               2020-01-01 01:00:00,1,28,70\n";

    let err = parse_csv(Cursor::new(csv)).unwrap_err();
    assert!(matches!(err, FloodError::TrainingData(ref m) if m.starts_with("line 3")));
}

#[test]
fn test_empty_input_is_rejected() {
    let err = parse_csv(Cursor::new("")).unwrap_err();
    assert!(matches!(err, FloodError::TrainingData(ref m) if m.contains("no header")));
}
