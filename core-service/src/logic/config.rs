//! Training configuration

use std::env;
use std::path::PathBuf;

use crate::constants::{get_artifact_dir, get_data_path, DEFAULT_SYNTHETIC_ROWS};
use crate::error::{FloodError, Result};

/// Hyper-parameters and paths for one training run
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Training table (CSV)
    pub data_path: PathBuf,

    /// Where scaler.json / model.json are written
    pub artifact_dir: PathBuf,

    /// Regenerate synthetic data even if `data_path` exists
    pub regenerate_data: bool,

    /// Rows generated when synthetic data is needed
    pub synthetic_rows: usize,

    pub epochs: usize,

    pub batch_size: usize,

    pub learning_rate: f32,

    /// Fraction of windows (taken from the end) held out for validation
    pub validation_split: f64,

    /// Seeds weight init, dropout, batch shuffling and synthetic data
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(crate::constants::DEFAULT_DATA_PATH),
            artifact_dir: PathBuf::from(crate::constants::DEFAULT_ARTIFACT_DIR),
            regenerate_data: false,
            synthetic_rows: DEFAULT_SYNTHETIC_ROWS,
            epochs: 5,
            batch_size: 64,
            learning_rate: 0.001,
            validation_split: 0.2,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            data_path: PathBuf::from(get_data_path()),

            artifact_dir: PathBuf::from(get_artifact_dir()),

            regenerate_data: env::var("FLOOD_REGENERATE_DATA")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.regenerate_data),

            synthetic_rows: parse_var("FLOOD_SYNTHETIC_ROWS").unwrap_or(defaults.synthetic_rows),

            epochs: parse_var("FLOOD_EPOCHS").unwrap_or(defaults.epochs),

            batch_size: parse_var("FLOOD_BATCH_SIZE")
                .filter(|&b: &usize| b > 0)
                .unwrap_or(defaults.batch_size),

            learning_rate: parse_var("FLOOD_LEARNING_RATE")
                .filter(|&lr: &f32| lr > 0.0)
                .unwrap_or(defaults.learning_rate),

            validation_split: parse_var("FLOOD_VALIDATION_SPLIT")
                .filter(|&s: &f64| s > 0.0 && s < 1.0)
                .unwrap_or(defaults.validation_split),

            seed: parse_var("FLOOD_SEED").unwrap_or(defaults.seed),
        }
    }
}

impl TrainingConfig {
    /// Reject hyper-parameters that cannot produce a training run
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(FloodError::TrainingData("epochs must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(FloodError::TrainingData("batch_size must be at least 1".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(FloodError::TrainingData(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(FloodError::TrainingData(format!(
                "validation_split must be in (0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.validation_split, 0.2);
        assert_eq!(config.synthetic_rows, 45_000);
        assert!(!config.regenerate_data);
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        assert!(TrainingConfig::default().validate().is_ok());

        let cases = [
            TrainingConfig { batch_size: 0, ..Default::default() },
            TrainingConfig { epochs: 0, ..Default::default() },
            TrainingConfig { learning_rate: 0.0, ..Default::default() },
            TrainingConfig { validation_split: 1.0, ..Default::default() },
            TrainingConfig { validation_split: 0.0, ..Default::default() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(FloodError::TrainingData(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("FLOOD_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var::<usize>("FLOOD_TEST_PARSE_VAR"), None);
        env::set_var("FLOOD_TEST_PARSE_VAR", " 12 ");
        assert_eq!(parse_var::<usize>("FLOOD_TEST_PARSE_VAR"), Some(12));
        env::remove_var("FLOOD_TEST_PARSE_VAR");
    }
}
