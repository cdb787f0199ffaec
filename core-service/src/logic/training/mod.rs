//! Training Pipeline - Offline fit of scaler and model
//!
//! Stages run strictly in order and stop at the first error:
//! acquire rows → fit scaler → window → chronological split → fit model → persist.
//! Nothing touches the artifact directory before the last stage.

use ndarray::{s, Array1, ArrayView1, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SEQ_LEN;
use crate::error::{FloodError, Result};
use crate::logic::dataset::{self, split_columns, DatasetRecord, SyntheticConfig};
use crate::logic::features::FEATURE_COUNT;
use crate::logic::model::{
    to_tensor, Adam, ArtifactStore, FeatureScaler, ModelConfig, RiskModel, SequenceWindower,
};

pub use crate::logic::config::TrainingConfig;


/// Validation is scored in slices of this many windows
const EVAL_CHUNK: usize = 512;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub rows: usize,
    pub train_windows: usize,
    pub val_windows: usize,
    pub parameter_count: usize,
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingReport {
    pub fn final_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct TrainingPipeline {
    config: TrainingConfig,
    store: ArtifactStore,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        let store = ArtifactStore::new(&config.artifact_dir);
        Self { config, store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Read the training table, generating (and saving) synthetic history
    /// when the file is missing or regeneration is requested
    pub fn acquire_rows(&self) -> Result<Vec<DatasetRecord>> {
        let path = &self.config.data_path;

        if self.config.regenerate_data || !path.exists() {
            log::info!(
                "Generating {} synthetic rows (seed {}) into {}",
                self.config.synthetic_rows,
                self.config.seed,
                path.display()
            );
            let records = dataset::generate(&SyntheticConfig {
                rows: self.config.synthetic_rows,
                seed: self.config.seed,
                ..Default::default()
            })?;
            dataset::write_csv(path, &records)?;
            return Ok(records);
        }

        dataset::read_csv(path)
    }

    /// Full run: acquire rows, then train on them
    pub fn run(&self) -> Result<TrainingReport> {
        self.config.validate()?;
        let records = self.acquire_rows()?;
        self.run_on(&records)
    }

    /// Train on caller-supplied rows (already in chronological order)
    pub fn run_on(&self, records: &[DatasetRecord]) -> Result<TrainingReport> {
        let cfg = &self.config;
        cfg.validate()?;

        // Stage 2: scale
        let (features, labels) = split_columns(records);
        let (scaler, scaled) = FeatureScaler::fit_transform(&features)?;

        // Stage 3: window
        if records.len() <= SEQ_LEN {
            return Err(FloodError::TrainingData(format!(
                "need more than {} rows to build a window, got {}",
                SEQ_LEN,
                records.len()
            )));
        }
        let (windows, next_labels) = SequenceWindower::new(SEQ_LEN).windows(&scaled, &labels)?;
        let x = to_tensor(&windows, SEQ_LEN)?;
        let y: Array1<f32> = next_labels.iter().map(|&l| f32::from(l)).collect();

        // Stage 4: split
        let (train_n, val_n) = chronological_split(windows.len(), cfg.validation_split)?;
        log::info!(
            "{} rows -> {} windows ({} train / {} validation)",
            records.len(),
            windows.len(),
            train_n,
            val_n
        );

        let x_train = x.slice(s![..train_n, .., ..]);
        let y_train = y.slice(s![..train_n]);
        let x_val = x.slice(s![train_n.., .., ..]);
        let y_val = y.slice(s![train_n..]);

        // Stage 5: fit
        let model_config = ModelConfig {
            input_size: FEATURE_COUNT,
            seq_len: SEQ_LEN,
            ..Default::default()
        };
        let mut model = RiskModel::new(model_config, cfg.seed);
        log::info!("Model has {} trainable parameters", model.parameter_count());

        let epochs = self.fit(&mut model, x_train, y_train, x_val, y_val)?;

        // Stage 6: persist
        let run_id = Uuid::new_v4();
        self.store.save(run_id, &scaler, &model)?;

        Ok(TrainingReport {
            run_id,
            rows: records.len(),
            train_windows: train_n,
            val_windows: val_n,
            parameter_count: model.parameter_count(),
            epochs,
        })
    }

    fn fit(
        &self,
        model: &mut RiskModel,
        x_train: ArrayView3<f32>,
        y_train: ArrayView1<f32>,
        x_val: ArrayView3<f32>,
        y_val: ArrayView1<f32>,
    ) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;
        let mut optimizer = Adam::new(cfg.learning_rate);
        let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(1));
        let train_n = y_train.len();
        let mut history = Vec::with_capacity(cfg.epochs);

        for epoch in 1..=cfg.epochs {
            let mut order: Vec<usize> = (0..train_n).collect();
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0f32;
            let mut correct = 0usize;

            for batch in order.chunks(cfg.batch_size) {
                let xb = x_train.select(Axis(0), batch);
                let yb = y_train.select(Axis(0), batch);
                let (loss, hits) = model.train_step(xb.view(), yb.view(), &mut optimizer, &mut rng)?;
                loss_sum += loss * batch.len() as f32;
                correct += hits;
            }

            let loss = loss_sum / train_n as f32;
            if !loss.is_finite() {
                return Err(FloodError::TrainingData(format!("loss diverged at epoch {}", epoch)));
            }

            let (val_loss, val_accuracy) = evaluate_chunked(model, x_val, y_val)?;
            let metrics = EpochMetrics {
                epoch,
                loss,
                accuracy: correct as f32 / train_n as f32,
                val_loss,
                val_accuracy,
            };

            log::info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4}",
                epoch,
                cfg.epochs,
                metrics.loss,
                metrics.accuracy,
                metrics.val_loss,
                metrics.val_accuracy
            );
            history.push(metrics);
        }

        Ok(history)
    }
}

/// Split `n` windows into (train, validation) counts; the validation slice is
/// the last `ceil(fraction * n)` windows
pub fn chronological_split(n: usize, fraction: f64) -> Result<(usize, usize)> {
    let n_val = (fraction * n as f64).ceil() as usize;

    if n_val == 0 || n_val >= n {
        return Err(FloodError::TrainingData(format!(
            "{} windows cannot be split {:.0}% for validation with both sides non-empty",
            n,
            fraction * 100.0
        )));
    }

    Ok((n - n_val, n_val))
}

/// Size-weighted loss and accuracy over a large set, in fixed slices
fn evaluate_chunked(model: &RiskModel, x: ArrayView3<f32>, y: ArrayView1<f32>) -> Result<(f32, f32)> {
    let n = y.len();
    let mut loss_sum = 0.0f32;
    let mut acc_sum = 0.0f32;

    let mut start = 0;
    while start < n {
        let end = (start + EVAL_CHUNK).min(n);
        let (loss, acc) = model.evaluate(x.slice(s![start..end, .., ..]), y.slice(s![start..end]))?;
        let len = (end - start) as f32;
        loss_sum += loss * len;
        acc_sum += acc * len;
        start = end;
    }

    Ok((loss_sum / n.max(1) as f32, acc_sum / n.max(1) as f32))
}
