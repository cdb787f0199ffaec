//! Risk Model - LSTM sequence classifier
//!
//! ```text
//! (batch, seq_len, 4) ─► LSTM(64, last state) ─► Dropout(0.2) ─► Dense(32, ReLU) ─► Dense(1, sigmoid)
//! ```
//!
//! Gate layout inside the fused LSTM matrices is `[input | forget | cell | output]`,
//! each block `lstm_units` wide. Dropout is only applied when a training RNG
//! is supplied; inference is a plain deterministic forward pass.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, ArrayViewMutD, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constants::SEQ_LEN;
use crate::error::{FloodError, Result};
use crate::logic::features::FEATURE_COUNT;
use super::optimizer::Adam;

/// Probabilities are clipped to [EPSILON, 1 - EPSILON] before taking logs
const BCE_EPSILON: f32 = 1e-7;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub input_size: usize,
    pub seq_len: usize,
    pub lstm_units: usize,
    pub dense_units: usize,
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: FEATURE_COUNT,
            seq_len: SEQ_LEN,
            lstm_units: 64,
            dense_units: 32,
            dropout: 0.2,
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    /// (input_size, 4 * units)
    pub kernel: Array2<f32>,
    /// (units, 4 * units)
    pub recurrent: Array2<f32>,
    /// (4 * units)
    pub bias: Array1<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// (inputs, outputs)
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl DenseLayer {
    fn glorot<R: Rng>(rng: &mut R, inputs: usize, outputs: usize) -> Self {
        Self {
            weights: glorot_uniform(rng, inputs, outputs),
            bias: Array1::zeros(outputs),
        }
    }

    fn forward(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.weights) + &self.bias
    }
}

fn glorot_uniform<R: Rng>(rng: &mut R, fan_in: usize, fan_out: usize) -> Array2<f32> {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    Array2::from_shape_simple_fn((fan_in, fan_out), || rng.gen_range(-limit..limit))
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[inline]
fn relu(x: f32) -> f32 {
    x.max(0.0)
}

// ============================================================================
// GRADIENTS
// ============================================================================

/// Gradients with the same shapes and order as the model parameters
#[derive(Debug, Clone)]
pub struct Gradients {
    pub kernel: Array2<f32>,
    pub recurrent: Array2<f32>,
    pub lstm_bias: Array1<f32>,
    pub hidden_weights: Array2<f32>,
    pub hidden_bias: Array1<f32>,
    pub output_weights: Array2<f32>,
    pub output_bias: Array1<f32>,
}

impl Gradients {
    fn views(&self) -> Vec<ArrayViewD<'_, f32>> {
        vec![
            self.kernel.view().into_dyn(),
            self.recurrent.view().into_dyn(),
            self.lstm_bias.view().into_dyn(),
            self.hidden_weights.view().into_dyn(),
            self.hidden_bias.view().into_dyn(),
            self.output_weights.view().into_dyn(),
            self.output_bias.view().into_dyn(),
        ]
    }
}

/// Activations kept from a training forward pass for backpropagation
struct ForwardCache {
    /// Hidden states h_0..h_T (h_0 = zeros)
    hidden: Vec<Array2<f32>>,
    /// Cell states c_0..c_T (c_0 = zeros)
    cells: Vec<Array2<f32>>,
    /// Activated gates per step, (batch, 4 * units)
    gates: Vec<Array2<f32>>,
    /// Inverted-dropout mask on h_T, already scaled by 1 / (1 - rate)
    dropout_mask: Option<Array2<f32>>,
    dropped: Array2<f32>,
    hidden_pre: Array2<f32>,
    hidden_act: Array2<f32>,
    probs: Array1<f32>,
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub config: ModelConfig,
    pub lstm: LstmLayer,
    pub hidden: DenseLayer,
    pub output: DenseLayer,
}

impl RiskModel {
    /// Fresh model with Glorot-uniform weights, zero biases and forget bias 1
    pub fn new(config: ModelConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let units = config.lstm_units;

        let mut bias: Array1<f32> = Array1::zeros(4 * units);
        bias.slice_mut(s![units..2 * units]).fill(1.0);

        let lstm = LstmLayer {
            kernel: glorot_uniform(&mut rng, config.input_size, 4 * units),
            recurrent: glorot_uniform(&mut rng, units, 4 * units),
            bias,
        };
        let hidden = DenseLayer::glorot(&mut rng, units, config.dense_units);
        let output = DenseLayer::glorot(&mut rng, config.dense_units, 1);

        Self { config, lstm, hidden, output }
    }

    /// Check that weight shapes agree with the config and contain no NaN/Inf
    pub fn validate(&self) -> Result<()> {
        let c = &self.config;
        let units = c.lstm_units;
        let expected: [(&str, &[usize], &[usize]); 7] = [
            ("lstm.kernel", self.lstm.kernel.shape(), &[c.input_size, 4 * units]),
            ("lstm.recurrent", self.lstm.recurrent.shape(), &[units, 4 * units]),
            ("lstm.bias", self.lstm.bias.shape(), &[4 * units]),
            ("hidden.weights", self.hidden.weights.shape(), &[units, c.dense_units]),
            ("hidden.bias", self.hidden.bias.shape(), &[c.dense_units]),
            ("output.weights", self.output.weights.shape(), &[c.dense_units, 1]),
            ("output.bias", self.output.bias.shape(), &[1]),
        ];

        for (name, actual, wanted) in expected {
            if actual != wanted {
                return Err(FloodError::ModelUnavailable(format!(
                    "{} has shape {:?}, expected {:?}",
                    name, actual, wanted
                )));
            }
        }

        let finite = self.parameter_views().iter().all(|p| p.iter().all(|v| v.is_finite()));
        if !finite {
            return Err(FloodError::ModelUnavailable("model weights contain non-finite values".to_string()));
        }

        if !(0.0..1.0).contains(&c.dropout) {
            return Err(FloodError::ModelUnavailable(format!("invalid dropout rate {}", c.dropout)));
        }

        Ok(())
    }

    fn parameter_views(&self) -> Vec<ArrayViewD<'_, f32>> {
        vec![
            self.lstm.kernel.view().into_dyn(),
            self.lstm.recurrent.view().into_dyn(),
            self.lstm.bias.view().into_dyn(),
            self.hidden.weights.view().into_dyn(),
            self.hidden.bias.view().into_dyn(),
            self.output.weights.view().into_dyn(),
            self.output.bias.view().into_dyn(),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![
            self.lstm.kernel.view_mut().into_dyn(),
            self.lstm.recurrent.view_mut().into_dyn(),
            self.lstm.bias.view_mut().into_dyn(),
            self.hidden.weights.view_mut().into_dyn(),
            self.hidden.bias.view_mut().into_dyn(),
            self.output.weights.view_mut().into_dyn(),
            self.output.bias.view_mut().into_dyn(),
        ]
    }

    /// Total number of trainable scalars
    pub fn parameter_count(&self) -> usize {
        self.parameter_views().iter().map(|p| p.len()).sum()
    }

    fn check_input(&self, x: &ArrayView3<f32>) -> Result<()> {
        let (_, steps, features) = x.dim();
        if features != self.config.input_size {
            return Err(FloodError::InputShape(format!(
                "expected {} features per step, got {}",
                self.config.input_size, features
            )));
        }
        if steps == 0 {
            return Err(FloodError::InputShape("window has no timesteps".to_string()));
        }
        Ok(())
    }

    /// One LSTM step; returns (activated gates, c_t, h_t)
    fn lstm_step(
        &self,
        x_t: &ArrayView2<f32>,
        h_prev: &Array2<f32>,
        c_prev: &Array2<f32>,
    ) -> (Array2<f32>, Array2<f32>, Array2<f32>) {
        let u = self.config.lstm_units;

        let mut gates = x_t.dot(&self.lstm.kernel) + h_prev.dot(&self.lstm.recurrent) + &self.lstm.bias;
        gates.slice_mut(s![.., 0..2 * u]).mapv_inplace(sigmoid);
        gates.slice_mut(s![.., 2 * u..3 * u]).mapv_inplace(f32::tanh);
        gates.slice_mut(s![.., 3 * u..]).mapv_inplace(sigmoid);

        let i = gates.slice(s![.., 0..u]);
        let f = gates.slice(s![.., u..2 * u]);
        let g = gates.slice(s![.., 2 * u..3 * u]);
        let o = gates.slice(s![.., 3 * u..]);

        let c = &f * c_prev + &i * &g;
        let h = &o * &c.mapv(f32::tanh);

        (gates, c, h)
    }

    fn head(&self, features: &Array2<f32>) -> (Array2<f32>, Array2<f32>, Array1<f32>) {
        let hidden_pre = self.hidden.forward(&features.view());
        let hidden_act = hidden_pre.mapv(relu);
        let logits = self.output.forward(&hidden_act.view());
        let probs = logits.column(0).mapv(sigmoid);
        (hidden_pre, hidden_act, probs)
    }

    /// Deterministic forward pass; returns one probability per window
    pub fn predict_proba(&self, x: ArrayView3<f32>) -> Result<Array1<f32>> {
        self.check_input(&x)?;
        let (batch, steps, _) = x.dim();
        let units = self.config.lstm_units;

        let mut h: Array2<f32> = Array2::zeros((batch, units));
        let mut c: Array2<f32> = Array2::zeros((batch, units));
        for t in 0..steps {
            let x_t = x.slice(s![.., t, ..]);
            let (_, c_next, h_next) = self.lstm_step(&x_t, &h, &c);
            h = h_next;
            c = c_next;
        }

        let (_, _, probs) = self.head(&h);
        Ok(probs)
    }

    fn forward_train(&self, x: &ArrayView3<f32>, rng: Option<&mut StdRng>) -> ForwardCache {
        let (batch, steps, _) = x.dim();
        let units = self.config.lstm_units;

        let mut hidden: Vec<Array2<f32>> = Vec::with_capacity(steps + 1);
        let mut cells: Vec<Array2<f32>> = Vec::with_capacity(steps + 1);
        let mut gates: Vec<Array2<f32>> = Vec::with_capacity(steps);
        hidden.push(Array2::zeros((batch, units)));
        cells.push(Array2::zeros((batch, units)));

        for t in 0..steps {
            let x_t = x.slice(s![.., t, ..]);
            let (g, c, h) = self.lstm_step(&x_t, &hidden[t], &cells[t]);
            gates.push(g);
            cells.push(c);
            hidden.push(h);
        }

        let rate = self.config.dropout;
        let dropout_mask = match rng {
            Some(rng) if rate > 0.0 => {
                let keep = 1.0 - rate;
                Some(Array2::from_shape_simple_fn((batch, units), || {
                    if rng.gen::<f32>() < keep { 1.0 / keep } else { 0.0 }
                }))
            }
            _ => None,
        };

        let last = &hidden[steps];
        let dropped = match &dropout_mask {
            Some(mask) => last * mask,
            None => last.clone(),
        };

        let (hidden_pre, hidden_act, probs) = self.head(&dropped);

        ForwardCache { hidden, cells, gates, dropout_mask, dropped, hidden_pre, hidden_act, probs }
    }

    fn backward(&self, x: &ArrayView3<f32>, y: &ArrayView1<f32>, cache: &ForwardCache) -> Gradients {
        let (batch, steps, _) = x.dim();
        let u = self.config.lstm_units;

        // d(mean BCE)/d(logit) = (p - y) / batch
        let d_logits = ((&cache.probs - y) / batch as f32).insert_axis(Axis(1));
        let output_weights = cache.hidden_act.t().dot(&d_logits);
        let output_bias = d_logits.sum_axis(Axis(0));

        let d_act = d_logits.dot(&self.output.weights.t());
        let d_pre = d_act * &cache.hidden_pre.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let hidden_weights = cache.dropped.t().dot(&d_pre);
        let hidden_bias = d_pre.sum_axis(Axis(0));

        let d_dropped = d_pre.dot(&self.hidden.weights.t());
        let mut dh_next = match &cache.dropout_mask {
            Some(mask) => d_dropped * mask,
            None => d_dropped,
        };
        let mut dc_next: Array2<f32> = Array2::zeros((batch, u));

        let mut kernel: Array2<f32> = Array2::zeros(self.lstm.kernel.raw_dim());
        let mut recurrent: Array2<f32> = Array2::zeros(self.lstm.recurrent.raw_dim());
        let mut lstm_bias: Array1<f32> = Array1::zeros(self.lstm.bias.raw_dim());

        for t in (0..steps).rev() {
            let gates = &cache.gates[t];
            let i = gates.slice(s![.., 0..u]);
            let f = gates.slice(s![.., u..2 * u]);
            let g = gates.slice(s![.., 2 * u..3 * u]);
            let o = gates.slice(s![.., 3 * u..]);

            let c_prev = &cache.cells[t];
            let tanh_c = cache.cells[t + 1].mapv(f32::tanh);

            let d_o = &dh_next * &tanh_c;
            let dc = &dc_next + &(&dh_next * &o * &tanh_c.mapv(|v| 1.0 - v * v));
            let d_i = &dc * &g;
            let d_g = &dc * &i;
            let d_f = &dc * c_prev;
            dc_next = &dc * &f;

            let mut dz: Array2<f32> = Array2::zeros((batch, 4 * u));
            dz.slice_mut(s![.., 0..u]).assign(&(d_i * &i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., u..2 * u]).assign(&(d_f * &f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * u..3 * u]).assign(&(d_g * &g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * u..]).assign(&(d_o * &o.mapv(|v| v * (1.0 - v))));

            let x_t = x.slice(s![.., t, ..]);
            kernel += &x_t.t().dot(&dz);
            recurrent += &cache.hidden[t].t().dot(&dz);
            lstm_bias += &dz.sum_axis(Axis(0));

            dh_next = dz.dot(&self.lstm.recurrent.t());
        }

        Gradients {
            kernel,
            recurrent,
            lstm_bias,
            hidden_weights,
            hidden_bias,
            output_weights,
            output_bias,
        }
    }

    /// Mean binary cross-entropy and analytic gradients for one batch.
    ///
    /// Dropout is applied only when `rng` is given.
    pub fn loss_and_gradients(
        &self,
        x: ArrayView3<f32>,
        y: ArrayView1<f32>,
        rng: Option<&mut StdRng>,
    ) -> Result<(f32, Gradients)> {
        self.check_input(&x)?;
        let cache = self.forward_train(&x, rng);
        let loss = binary_cross_entropy(&cache.probs.view(), &y);
        let grads = self.backward(&x, &y, &cache);
        Ok((loss, grads))
    }

    /// One optimizer step on a mini-batch; returns (loss, correct predictions)
    pub fn train_step(
        &mut self,
        x: ArrayView3<f32>,
        y: ArrayView1<f32>,
        optimizer: &mut Adam,
        rng: &mut StdRng,
    ) -> Result<(f32, usize)> {
        self.check_input(&x)?;
        let cache = self.forward_train(&x, Some(rng));
        let loss = binary_cross_entropy(&cache.probs.view(), &y);
        let correct = count_correct(&cache.probs.view(), &y);
        let grads = self.backward(&x, &y, &cache);

        optimizer.update(self.parameters_mut(), grads.views());

        Ok((loss, correct))
    }

    /// Deterministic loss and accuracy over a batch
    pub fn evaluate(&self, x: ArrayView3<f32>, y: ArrayView1<f32>) -> Result<(f32, f32)> {
        let probs = self.predict_proba(x)?;
        let loss = binary_cross_entropy(&probs.view(), &y);
        let accuracy = count_correct(&probs.view(), &y) as f32 / y.len().max(1) as f32;
        Ok((loss, accuracy))
    }
}

/// Mean binary cross-entropy with probability clipping
pub fn binary_cross_entropy(probs: &ArrayView1<f32>, labels: &ArrayView1<f32>) -> f32 {
    if probs.is_empty() {
        return 0.0;
    }
    let total: f32 = probs
        .iter()
        .zip(labels.iter())
        .map(|(&p, &y)| {
            let p = p.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / probs.len() as f32
}

/// Predictions on the correct side of 0.5
pub fn count_correct(probs: &ArrayView1<f32>, labels: &ArrayView1<f32>) -> usize {
    probs
        .iter()
        .zip(labels.iter())
        .filter(|&(&p, &y)| (p > 0.5) == (y > 0.5))
        .count()
}
