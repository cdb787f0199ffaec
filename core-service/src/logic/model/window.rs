//! Sequence Windower - Fixed-length input windows for the model
//!
//! Turns an ordered table of per-timestep vectors into overlapping windows of
//! `seq_len` steps. During training each window is paired with the label of
//! the step right after it.

use ndarray::Array3;

use crate::constants::SEQ_LEN;
use crate::error::{FloodError, Result};
use crate::logic::features::{FeatureVector, FEATURE_COUNT};

/// `seq_len` consecutive feature vectors, oldest first
pub type Window = Vec<FeatureVector>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindower {
    seq_len: usize,
}

impl Default for SequenceWindower {
    fn default() -> Self {
        Self::new(SEQ_LEN)
    }
}

impl SequenceWindower {
    pub fn new(seq_len: usize) -> Self {
        Self { seq_len }
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Number of windows produced from `rows` rows: max(0, rows - seq_len)
    pub fn window_count(&self, rows: usize) -> usize {
        rows.saturating_sub(self.seq_len)
    }

    /// Build windows and next-step labels.
    ///
    /// Window `i` is `rows[i..i + seq_len]` and its label is
    /// `labels[i + seq_len]`. Too few rows yields empty output, not an error.
    pub fn windows(&self, rows: &[FeatureVector], labels: &[u8]) -> Result<(Vec<Window>, Vec<u8>)> {
        if rows.len() != labels.len() {
            return Err(FloodError::TrainingData(format!(
                "row/label count mismatch: {} rows, {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let count = self.window_count(rows.len());
        let windows: Vec<Window> = (0..count)
            .map(|i| rows[i..i + self.seq_len].to_vec())
            .collect();
        let next_labels: Vec<u8> = (0..count).map(|i| labels[i + self.seq_len]).collect();

        Ok((windows, next_labels))
    }
}

/// Pack windows into a (batch, seq_len, FEATURE_COUNT) tensor.
///
/// Every window must have `seq_len` rows.
pub fn to_tensor(windows: &[Window], seq_len: usize) -> Result<Array3<f32>> {
    let mut data = Vec::with_capacity(windows.len() * seq_len * FEATURE_COUNT);

    for (index, window) in windows.iter().enumerate() {
        if window.len() != seq_len {
            return Err(FloodError::InputShape(format!(
                "window {} has {} timesteps, expected {}",
                index,
                window.len(),
                seq_len
            )));
        }
        for row in window {
            data.extend_from_slice(&row.values);
        }
    }

    Array3::from_shape_vec((windows.len(), seq_len, FEATURE_COUNT), data)
        .map_err(|e| FloodError::InputShape(format!("tensor shape error: {}", e)))
}
