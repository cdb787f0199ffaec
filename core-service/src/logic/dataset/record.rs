use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureVector;

/// One row of the training table: observations at `timestamp` plus the
/// flood-risk label for that hour
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub timestamp: DateTime<Utc>,

    // Values in FEATURE_LAYOUT order
    pub features: FeatureVector,

    // 1 = flood-risk event occurred, 0 = none
    pub label: u8,
}

impl DatasetRecord {
    pub fn new(timestamp: DateTime<Utc>, features: FeatureVector, label: u8) -> Self {
        Self { timestamp, features, label }
    }
}

/// Split records into the parallel feature and label columns used by training
pub fn split_columns(records: &[DatasetRecord]) -> (Vec<FeatureVector>, Vec<u8>) {
    records.iter().map(|r| (r.features, r.label)).unzip()
}
