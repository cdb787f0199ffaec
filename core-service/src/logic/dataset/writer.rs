use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::logic::dataset::record::DatasetRecord;

const HEADER: [&str; 6] = ["timestamp", "rainfall", "temperature", "humidity", "pressure", "label"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write records as CSV, replacing any existing file
pub fn write_csv(path: &Path, records: &[DatasetRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;

    for record in records {
        let f = &record.features;
        writer.write_record([
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            f.rainfall().to_string(),
            f.temperature().to_string(),
            f.humidity().to_string(),
            f.pressure().to_string(),
            record.label.to_string(),
        ])?;
    }
    writer.flush()?;

    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
