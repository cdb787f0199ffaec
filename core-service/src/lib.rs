//! Flood Risk Core
//!
//! Training and inference pipelines for the flood-risk sequence classifier.
//!
//! ## Layout
//! - `logic/features/` - Feature layout, fingerprint and vectors
//! - `logic/dataset/` - Training table (CSV) and synthetic generator
//! - `logic/model/` - Scaler, windower, LSTM model, artifacts, inference
//! - `logic/training/` - Offline training pipeline

pub mod constants;
pub mod error;
pub mod logic;

pub use error::{FloodError, Result};
pub use logic::features::{FeatureVector, FEATURE_COUNT};
pub use logic::model::{
    ArtifactStore, FeatureScaler, InferencePipeline, PredictionResult, RiskCategory, RiskModel,
    ScalerState, SequenceWindower,
};
pub use logic::training::{TrainingConfig, TrainingPipeline, TrainingReport};
