//! Model Module - Scaling, windowing, LSTM and inference
//!
//! Training and serving share everything in here, so the data contract
//! (feature order, SEQ_LEN, scaler bounds) lives in exactly one place.

pub mod artifacts;
pub mod inference;
pub mod lstm;
pub mod optimizer;
pub mod scaler;
pub mod threshold;
pub mod window;

// Re-export common types
pub use artifacts::{ArtifactHeader, ArtifactStore, LoadedArtifacts};
pub use inference::{EngineStatus, InferencePipeline, PredictionResult};
pub use lstm::{ModelConfig, RiskModel};
pub use optimizer::Adam;
pub use scaler::{FeatureScaler, ScalerState};
pub use threshold::{to_percentage, RiskCategory};
pub use window::{to_tensor, SequenceWindower, Window};
