//! Adam optimizer
//!
//! Moment buffers are created lazily on the first step and matched to
//! parameters by position, so callers must always pass parameters and
//! gradients in the same order.

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    step: i32,
    first_moments: Vec<ArrayD<f32>>,
    second_moments: Vec<ArrayD<f32>>,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    /// Number of updates applied so far
    pub fn steps(&self) -> i32 {
        self.step
    }

    /// Apply one bias-corrected update to every parameter
    pub fn update(&mut self, params: Vec<ArrayViewMutD<'_, f32>>, grads: Vec<ArrayViewD<'_, f32>>) {
        debug_assert_eq!(params.len(), grads.len());

        if self.first_moments.is_empty() {
            self.first_moments = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.second_moments = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
        }

        self.step += 1;
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let lr_t = self.learning_rate * (1.0 - beta2.powi(self.step)).sqrt()
            / (1.0 - beta1.powi(self.step));

        let moments = self.first_moments.iter_mut().zip(self.second_moments.iter_mut());

        for ((param, grad), (m, v)) in params.into_iter().zip(grads).zip(moments) {
            Zip::from(param)
                .and(&grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *p -= lr_t * *m / (v.sqrt() + epsilon);
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1};

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut param: Array1<f32> = arr1(&[1.0, -1.0]);
        let grad: Array1<f32> = arr1(&[0.5, -2.0]);
        let mut adam = Adam::new(0.1);

        adam.update(vec![param.view_mut().into_dyn()], vec![grad.view().into_dyn()]);

        // Bias-corrected first step is lr * sign(g)
        assert!((param[0] - 0.9).abs() < 1e-4);
        assert!((param[1] + 0.9).abs() < 1e-4);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut x: Array1<f32> = arr1(&[3.0]);
        let mut adam = Adam::new(0.1);

        for _ in 0..500 {
            let grad = x.mapv(|v| 2.0 * v);
            adam.update(vec![x.view_mut().into_dyn()], vec![grad.view().into_dyn()]);
        }

        assert!(x[0].abs() < 0.05);
    }
}
