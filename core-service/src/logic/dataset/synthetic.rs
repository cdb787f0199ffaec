//! Synthetic weather history.
//!
//! Stand-in for observed data: hourly rows with independently drawn
//! measurements and a rule-derived label.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, Normal};

use crate::constants::DEFAULT_SYNTHETIC_ROWS;
use crate::error::{FloodError, Result};
use crate::logic::features::FeatureVector;
use super::record::DatasetRecord;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub rows: usize,
    pub start: DateTime<Utc>,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_SYNTHETIC_ROWS,
            start: Utc.timestamp_opt(1_577_836_800, 0).single().unwrap_or_default(), // 2020-01-01T00:00:00Z
            seed: 42,
        }
    }
}

/// Flood-risk rule: heavy rain, or moderate rain in very humid air
pub fn label_for(rainfall: f32, humidity: f32) -> u8 {
    let flood = rainfall > 10.0 || (rainfall > 5.0 && humidity > 85.0);
    u8::from(flood)
}

/// Generate `config.rows` hourly records starting at `config.start`
pub fn generate(config: &SyntheticConfig) -> Result<Vec<DatasetRecord>> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let rainfall_dist = Gamma::new(2.0f32, 2.0).map_err(distribution_error)?;
    let temperature_dist = Normal::new(28.0f32, 2.0).map_err(distribution_error)?;
    let humidity_dist = Normal::new(75.0f32, 10.0).map_err(distribution_error)?;
    let pressure_dist = Normal::new(1010.0f32, 5.0).map_err(distribution_error)?;

    let records = (0..config.rows)
        .map(|i| {
            let rainfall = rainfall_dist.sample(&mut rng);
            let temperature = temperature_dist.sample(&mut rng);
            let humidity = humidity_dist.sample(&mut rng);
            let pressure = pressure_dist.sample(&mut rng);

            DatasetRecord::new(
                config.start + Duration::hours(i as i64),
                FeatureVector::new(rainfall, temperature, humidity, pressure),
                label_for(rainfall, humidity),
            )
        })
        .collect();

    Ok(records)
}

fn distribution_error<E: std::fmt::Display>(err: E) -> FloodError {
    FloodError::TrainingData(format!("invalid synthetic distribution: {}", err))
}
