//! Central Configuration Constants
//!
//! Single source of truth for the data contract shared by training and inference.
//! Changing SEQ_LEN or the feature layout invalidates every persisted artifact.

/// Number of consecutive timesteps in one model input window
pub const SEQ_LEN: usize = 24;

/// Upper bound (inclusive) of the "Aman" band
pub const SAFE_MAX_PROBABILITY: f32 = 0.4;

/// Upper bound (inclusive) of the "Siaga" band; anything above is "Awas"
pub const ALERT_MAX_PROBABILITY: f32 = 0.7;

/// Artifact file names inside the artifact directory
pub const SCALER_FILE_NAME: &str = "scaler.json";
pub const MODEL_FILE_NAME: &str = "model.json";

/// Default artifact directory (relative to the working directory)
pub const DEFAULT_ARTIFACT_DIR: &str = "saved_model";

/// Default training table location
pub const DEFAULT_DATA_PATH: &str = "data/historical_weather_labels.csv";

/// Default number of synthetic rows (roughly five years of hourly data)
pub const DEFAULT_SYNTHETIC_ROWS: usize = 45_000;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get artifact directory from environment or use default
pub fn get_artifact_dir() -> String {
    std::env::var("FLOOD_ARTIFACT_DIR")
        .unwrap_or_else(|_| DEFAULT_ARTIFACT_DIR.to_string())
}

/// Get training data path from environment or use default
pub fn get_data_path() -> String {
    std::env::var("FLOOD_DATA_PATH")
        .unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string())
}
