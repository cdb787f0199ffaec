//! Logic Module - Data contract, models and pipelines
//!
//! - `features/` - Feature layout, fingerprint and per-timestep vectors
//! - `dataset/` - Historical weather table (CSV) and synthetic generator
//! - `model/` - Scaler, windower, LSTM, artifacts and inference
//! - `training/` - Offline training pipeline

pub mod config;
pub mod dataset;
pub mod features;
pub mod model;
pub mod training;
