//! Feature Vector - One timestep of weather observations
//!
//! Values are stored in FEATURE_LAYOUT order. Never build the array by hand
//! from named fields outside this file.

use serde::{Deserialize, Serialize};

use super::layout::FEATURE_COUNT;

/// One timestep: [rainfall, temperature, humidity, pressure]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    pub values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create from raw values in layout order
    pub fn from_values(values: [f32; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Create from named measurements
    pub fn new(rainfall: f32, temperature: f32, humidity: f32, pressure: f32) -> Self {
        Self::from_values([rainfall, temperature, humidity, pressure])
    }

    /// Create from a slice; `None` unless exactly FEATURE_COUNT values are given
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let array: [f32; FEATURE_COUNT] = values.try_into().ok()?;
        Some(Self::from_values(array))
    }

    pub fn rainfall(&self) -> f32 {
        self.values[0]
    }

    pub fn temperature(&self) -> f32 {
        self.values[1]
    }

    pub fn humidity(&self) -> f32 {
        self.values[2]
    }

    pub fn pressure(&self) -> f32 {
        self.values[3]
    }

    /// Index of the first non-finite value, if any
    pub fn first_non_finite(&self) -> Option<usize> {
        self.values.iter().position(|v| !v.is_finite())
    }
}
