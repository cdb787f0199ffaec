//! Feature Scaler - Min-max normalization
//!
//! Fitted once over the whole training table, then frozen. The fitted
//! statistics are the only thing inference knows about the training data.

use serde::{Deserialize, Serialize};

use crate::error::{FloodError, Result};
use crate::logic::features::{FeatureVector, FEATURE_COUNT, FEATURE_LAYOUT};

/// Per-feature (min, max) learned from training data, in FEATURE_LAYOUT order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub min_vals: [f32; FEATURE_COUNT],
    pub max_vals: [f32; FEATURE_COUNT],
}

impl ScalerState {
    /// Scale a single value of feature `index`.
    ///
    /// A constant feature (max == min) always scales to 0.0. Values outside
    /// the fitted range are not clamped.
    #[inline]
    pub fn scale(&self, index: usize, value: f32) -> f32 {
        let min = self.min_vals[index];
        let range = self.max_vals[index] - min;
        if range > 0.0 {
            (value - min) / range
        } else {
            0.0
        }
    }

    pub fn transform_row(&self, row: &FeatureVector) -> FeatureVector {
        let mut scaled = [0.0f32; FEATURE_COUNT];
        for (i, slot) in scaled.iter_mut().enumerate() {
            *slot = self.scale(i, row.values[i]);
        }
        FeatureVector::from_values(scaled)
    }

    /// Features whose fitted range is empty
    pub fn constant_features(&self) -> Vec<&'static str> {
        (0..FEATURE_COUNT)
            .filter(|&i| self.max_vals[i] == self.min_vals[i])
            .map(|i| FEATURE_LAYOUT[i])
            .collect()
    }

    /// Check invariants of a state loaded from disk
    pub fn validate(&self) -> Result<()> {
        for i in 0..FEATURE_COUNT {
            let (min, max) = (self.min_vals[i], self.max_vals[i]);
            if !min.is_finite() || !max.is_finite() {
                return Err(FloodError::ModelUnavailable(format!(
                    "scaler has non-finite bounds for {}",
                    FEATURE_LAYOUT[i]
                )));
            }
            if min > max {
                return Err(FloodError::ModelUnavailable(format!(
                    "scaler min > max for {} ({} > {})",
                    FEATURE_LAYOUT[i], min, max
                )));
            }
        }
        Ok(())
    }
}

/// Fits and applies `ScalerState`
pub struct FeatureScaler;

impl FeatureScaler {
    /// Single pass over `rows` computing per-feature min and max
    pub fn fit(rows: &[FeatureVector]) -> Result<ScalerState> {
        if rows.is_empty() {
            return Err(FloodError::TrainingData("cannot fit scaler on zero rows".to_string()));
        }

        let mut min_vals = [f32::INFINITY; FEATURE_COUNT];
        let mut max_vals = [f32::NEG_INFINITY; FEATURE_COUNT];

        for (row_index, row) in rows.iter().enumerate() {
            if let Some(i) = row.first_non_finite() {
                return Err(FloodError::TrainingData(format!(
                    "row {} has non-finite {}",
                    row_index, FEATURE_LAYOUT[i]
                )));
            }
            for i in 0..FEATURE_COUNT {
                min_vals[i] = min_vals[i].min(row.values[i]);
                max_vals[i] = max_vals[i].max(row.values[i]);
            }
        }

        let state = ScalerState { min_vals, max_vals };

        for name in state.constant_features() {
            log::warn!("Feature '{}' is constant in training data; it will scale to 0.0", name);
        }

        Ok(state)
    }

    /// Apply `(x - min) / (max - min)` per feature; `state` is never modified
    pub fn transform(rows: &[FeatureVector], state: &ScalerState) -> Vec<FeatureVector> {
        rows.iter().map(|row| state.transform_row(row)).collect()
    }

    pub fn fit_transform(rows: &[FeatureVector]) -> Result<(ScalerState, Vec<FeatureVector>)> {
        let state = Self::fit(rows)?;
        let scaled = Self::transform(rows, &state);
        Ok((state, scaled))
    }
}
