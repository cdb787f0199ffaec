//! Inference Pipeline - Raw windows in, risk categories out
//!
//! Holds one scaler/model pair loaded at construction and never mutated.
//! Only the latency counters change after startup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SEQ_LEN;
use crate::error::{FloodError, Result};
use crate::logic::features::{FeatureVector, FEATURE_COUNT, FEATURE_LAYOUT};
use super::artifacts::{ArtifactStore, LoadedArtifacts};
use super::lstm::RiskModel;
use super::scaler::{FeatureScaler, ScalerState};
use super::threshold::{to_percentage, RiskCategory};
use super::window::{to_tensor, Window};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Prediction output for one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Percentage in [0, 100], 2 decimals
    pub probability: f64,
    pub category: RiskCategory,
}

impl PredictionResult {
    pub fn from_probability(probability: f32) -> Self {
        Self {
            probability: to_percentage(probability),
            category: RiskCategory::from_probability(probability),
        }
    }
}

/// Engine status for health endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model_loaded: bool,
    pub run_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub seq_len: usize,
    pub feature_names: Vec<String>,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
}

#[derive(Debug)]
enum PipelineState {
    Ready(LoadedArtifacts),
    Unavailable(String),
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug)]
pub struct InferencePipeline {
    state: PipelineState,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl InferencePipeline {
    fn with_state(state: PipelineState) -> Self {
        Self {
            state,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    /// Load from a store. A failed load still yields a pipeline, one that
    /// rejects every request with the load error.
    pub fn load(store: &ArtifactStore) -> Self {
        match store.load() {
            Ok(artifacts) => Self::from_artifacts(artifacts),
            Err(e) => {
                log::warn!("Inference disabled: {}", e);
                let reason = match e {
                    FloodError::ModelUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                Self::unavailable(reason)
            }
        }
    }

    pub fn from_artifacts(artifacts: LoadedArtifacts) -> Self {
        log::info!("Inference pipeline ready (run {})", artifacts.run_id);
        Self::with_state(PipelineState::Ready(artifacts))
    }

    /// Pipeline over an in-memory pair, e.g. straight after training
    pub fn new(scaler: ScalerState, model: RiskModel) -> Self {
        Self::from_artifacts(LoadedArtifacts {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            scaler,
            model,
        })
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::with_state(PipelineState::Unavailable(reason.into()))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PipelineState::Ready(_))
    }

    /// Ok when artifacts are loaded, otherwise the load failure as ModelUnavailable
    pub fn ensure_ready(&self) -> Result<()> {
        self.artifacts().map(|_| ())
    }

    fn artifacts(&self) -> Result<&LoadedArtifacts> {
        match &self.state {
            PipelineState::Ready(artifacts) => Ok(artifacts),
            PipelineState::Unavailable(reason) => Err(FloodError::ModelUnavailable(reason.clone())),
        }
    }

    /// Score a batch of raw (unscaled) windows, one result per window in order
    pub fn predict(&self, batch: &[Window]) -> Result<Vec<PredictionResult>> {
        let artifacts = self.artifacts()?;
        validate_batch(batch)?;

        let start = Instant::now();

        let scaled: Vec<Window> = batch
            .iter()
            .map(|window| FeatureScaler::transform(window, &artifacts.scaler))
            .collect();
        let tensor = to_tensor(&scaled, SEQ_LEN)?;
        let probs = artifacts.model.predict_proba(tensor.view())?;

        let results: Vec<PredictionResult> = probs.iter().map(|&p| PredictionResult::from_probability(p)).collect();

        self.latency_sum_us.fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        log::debug!("Scored {} window(s) in {:?}", results.len(), start.elapsed());
        Ok(results)
    }

    /// Same as `predict` for a plain nested array `[batch][SEQ_LEN][4]`
    pub fn predict_nested(&self, batch: &[Vec<Vec<f32>>]) -> Result<Vec<PredictionResult>> {
        self.ensure_ready()?;
        let windows = windows_from_nested(batch)?;
        self.predict(&windows)
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        let (model_loaded, run_id, trained_at, reason) = match &self.state {
            PipelineState::Ready(a) => (true, Some(a.run_id), Some(a.created_at), None),
            PipelineState::Unavailable(reason) => (false, None, None, Some(reason.clone())),
        };

        EngineStatus {
            model_loaded,
            run_id,
            trained_at,
            reason,
            seq_len: SEQ_LEN,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            avg_latency_ms: avg,
            inference_count: count,
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_batch(batch: &[Window]) -> Result<()> {
    if batch.is_empty() {
        return Err(FloodError::InputShape("batch contains no windows".to_string()));
    }

    for (w, window) in batch.iter().enumerate() {
        if window.len() != SEQ_LEN {
            return Err(FloodError::InputShape(format!(
                "window {} has {} timesteps, expected {}",
                w,
                window.len(),
                SEQ_LEN
            )));
        }
        for (t, row) in window.iter().enumerate() {
            if let Some(f) = row.first_non_finite() {
                return Err(FloodError::InputShape(format!(
                    "window {} step {} has non-finite {}",
                    w, t, FEATURE_LAYOUT[f]
                )));
            }
        }
    }

    Ok(())
}

fn windows_from_nested(batch: &[Vec<Vec<f32>>]) -> Result<Vec<Window>> {
    if batch.is_empty() {
        return Err(FloodError::InputShape("batch contains no windows".to_string()));
    }

    batch
        .iter()
        .enumerate()
        .map(|(w, steps)| {
            if steps.len() != SEQ_LEN {
                return Err(FloodError::InputShape(format!(
                    "window {} has {} timesteps, expected {}",
                    w,
                    steps.len(),
                    SEQ_LEN
                )));
            }
            steps
                .iter()
                .enumerate()
                .map(|(t, values)| {
                    FeatureVector::from_slice(values).ok_or_else(|| {
                        FloodError::InputShape(format!(
                            "window {} step {} has {} features, expected {}",
                            w,
                            t,
                            values.len(),
                            FEATURE_COUNT
                        ))
                    })
                })
                .collect::<Result<Window>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::lstm::ModelConfig;
    use tempfile::tempdir;

    fn ready_pipeline() -> InferencePipeline {
        let scaler = FeatureScaler::fit(&[
            FeatureVector::new(0.0, 20.0, 40.0, 990.0),
            FeatureVector::new(20.0, 35.0, 100.0, 1030.0),
        ])
        .unwrap();
        let model = RiskModel::new(ModelConfig { lstm_units: 8, dense_units: 4, ..Default::default() }, 42);
        InferencePipeline::new(scaler, model)
    }

    fn window(row: FeatureVector) -> Window {
        vec![row; SEQ_LEN]
    }

    #[test]
    fn test_predict_lower_bound_window() {
        let pipeline = ready_pipeline();
        let results = pipeline.predict(&[window(FeatureVector::new(0.0, 20.0, 40.0, 990.0))]).unwrap();

        assert_eq!(results.len(), 1);
        let r = results[0];
        assert!((0.0..=100.0).contains(&r.probability));
        let expected = if r.probability > 70.0 {
            RiskCategory::Awas
        } else if r.probability > 40.0 {
            RiskCategory::Siaga
        } else {
            RiskCategory::Aman
        };
        if r.probability != 40.0 && r.probability != 70.0 {
            assert_eq!(r.category, expected);
        }
    }

    #[test]
    fn test_predict_is_idempotent() {
        let pipeline = ready_pipeline();
        let batch = vec![
            window(FeatureVector::new(3.0, 27.0, 80.0, 1008.0)),
            window(FeatureVector::new(18.0, 25.0, 95.0, 1000.0)),
        ];

        let first = pipeline.predict(&batch).unwrap();
        let second = pipeline.predict(&batch).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(pipeline.status().inference_count, 2);
    }

    #[test]
    fn test_unavailable_rejects_everything() {
        let pipeline = InferencePipeline::unavailable("no artifacts");
        assert!(!pipeline.is_ready());

        // Even malformed input reports the availability problem first
        let err = pipeline.predict(&[]).unwrap_err();
        assert!(matches!(err, FloodError::ModelUnavailable(ref r) if r == "no artifacts"));
        assert!(matches!(pipeline.predict_nested(&[]), Err(FloodError::ModelUnavailable(_))));

        let status = pipeline.status();
        assert!(!status.model_loaded);
        assert_eq!(status.reason.as_deref(), Some("no artifacts"));
        assert_eq!(status.inference_count, 0);
    }

    #[test]
    fn test_load_from_empty_dir_is_unavailable() {
        let dir = tempdir().unwrap();
        let pipeline = InferencePipeline::load(&ArtifactStore::new(dir.path()));
        assert!(!pipeline.is_ready());
        assert!(matches!(
            pipeline.predict(&[window(FeatureVector::default())]),
            Err(FloodError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_load_saved_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let reference = ready_pipeline();
        let artifacts = reference.artifacts().unwrap();
        let run_id = Uuid::new_v4();
        store.save(run_id, &artifacts.scaler, &artifacts.model).unwrap();

        let loaded = InferencePipeline::load(&store);
        assert!(loaded.is_ready());
        assert_eq!(loaded.status().run_id, Some(run_id));

        let batch = vec![window(FeatureVector::new(7.5, 29.0, 88.0, 1004.0))];
        assert_eq!(loaded.predict(&batch).unwrap(), reference.predict(&batch).unwrap());
    }

    #[test]
    fn test_shape_errors() {
        let pipeline = ready_pipeline();

        assert!(matches!(pipeline.predict(&[]), Err(FloodError::InputShape(_))));

        let short = vec![window(FeatureVector::default()), vec![FeatureVector::default(); SEQ_LEN - 1]];
        match pipeline.predict(&short) {
            Err(FloodError::InputShape(msg)) => assert!(msg.contains("window 1")),
            other => panic!("expected InputShape, got {:?}", other),
        }

        let mut bad = window(FeatureVector::default());
        bad[3] = FeatureVector::new(0.0, f32::NAN, 0.0, 0.0);
        match pipeline.predict(&[bad]) {
            Err(FloodError::InputShape(msg)) => assert!(msg.contains("temperature")),
            other => panic!("expected InputShape, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_nested_shapes() {
        let pipeline = ready_pipeline();

        let good = vec![vec![vec![1.0, 28.0, 75.0, 1010.0]; SEQ_LEN]];
        assert_eq!(pipeline.predict_nested(&good).unwrap().len(), 1);

        let mut three_features = good.clone();
        three_features[0][5] = vec![1.0, 2.0, 3.0];
        match pipeline.predict_nested(&three_features) {
            Err(FloodError::InputShape(msg)) => assert!(msg.contains("step 5")),
            other => panic!("expected InputShape, got {:?}", other),
        }

        assert!(matches!(pipeline.predict_nested(&[]), Err(FloodError::InputShape(_))));
    }
}
