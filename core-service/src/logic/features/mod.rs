//! Features Module - Feature Layout & Vectors
//!
//! Defines the fixed feature order shared by the scaler, the model and every
//! persisted artifact.

pub mod layout;
pub mod vector;

// Re-export common types
pub use layout::{LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::FeatureVector;
