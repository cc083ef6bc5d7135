//! Dense, batch-norm and dropout layers with hand-written gradients.

use ndarray::{Array1, Array2, Axis, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully connected layer, weight stored as (out, in).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

#[derive(Debug, Clone)]
pub struct LinearGrads {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    /// Uniform in ±1/sqrt(fan_in) for weight and bias.
    pub fn new<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (fan_in as f32).sqrt();
        let weight = Array2::from_shape_fn((fan_out, fan_in), |_| rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound));
        Self { weight, bias }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }

    /// Returns the gradient w.r.t. the input alongside the parameter gradients.
    pub fn backward(&self, x: &Array2<f32>, grad_out: &Array2<f32>) -> (Array2<f32>, LinearGrads) {
        let grads = LinearGrads {
            weight: grad_out.t().dot(x),
            bias: grad_out.sum_axis(Axis(0)),
        };
        (grad_out.dot(&self.weight), grads)
    }
}

/// Batch normalization over the feature axis of a (batch, features) matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNorm1d {
    pub gamma: Array1<f32>,
    pub beta: Array1<f32>,
    pub running_mean: Array1<f32>,
    pub running_var: Array1<f32>,
}

#[derive(Debug, Clone)]
pub struct BatchNormGrads {
    pub gamma: Array1<f32>,
    pub beta: Array1<f32>,
}

/// Batch statistics kept from a training-mode forward pass.
#[derive(Debug, Clone)]
pub struct BatchNormCache {
    pub xhat: Array2<f32>,
    pub inv_std: Array1<f32>,
    pub mean: Array1<f32>,
    /// Unbiased variance, folded into the running estimate
    pub var: Array1<f32>,
}

impl BatchNorm1d {
    pub const EPS: f32 = 1e-5;
    pub const MOMENTUM: f32 = 0.1;

    pub fn new(features: usize) -> Self {
        Self {
            gamma: Array1::ones(features),
            beta: Array1::zeros(features),
            running_mean: Array1::zeros(features),
            running_var: Array1::ones(features),
        }
    }

    pub fn features(&self) -> usize {
        self.gamma.len()
    }

    /// Normalizes with the batch's own mean and biased variance.
    /// The caller must pass at least one row.
    pub fn forward_batch(&self, x: &Array2<f32>) -> (Array2<f32>, BatchNormCache) {
        let n = x.nrows().max(1) as f32;
        let mean = x.sum_axis(Axis(0)) / n;
        let centered = x - &mean;
        let biased = centered.mapv(|v| v * v).sum_axis(Axis(0)) / n;
        let inv_std = biased.mapv(|v| 1.0 / (v + Self::EPS).sqrt());
        let xhat = centered * &inv_std;
        let out = &xhat * &self.gamma + &self.beta;
        let var = if n > 1.0 {
            biased * (n / (n - 1.0))
        } else {
            biased
        };
        (
            out,
            BatchNormCache {
                xhat,
                inv_std,
                mean,
                var,
            },
        )
    }

    /// Normalizes with the running population statistics.
    pub fn forward_running(&self, x: &Array2<f32>) -> Array2<f32> {
        let inv_std = self.running_var.mapv(|v| 1.0 / (v + Self::EPS).sqrt());
        (x - &self.running_mean) * &inv_std * &self.gamma + &self.beta
    }

    pub fn update_running(&mut self, cache: &BatchNormCache) {
        let m = Self::MOMENTUM;
        Zip::from(&mut self.running_mean)
            .and(&cache.mean)
            .for_each(|r, &b| *r = (1.0 - m) * *r + m * b);
        Zip::from(&mut self.running_var)
            .and(&cache.var)
            .for_each(|r, &b| *r = (1.0 - m) * *r + m * b);
    }

    pub fn backward(&self, cache: &BatchNormCache, grad_out: &Array2<f32>) -> (Array2<f32>, BatchNormGrads) {
        let n = grad_out.nrows().max(1) as f32;
        let grads = BatchNormGrads {
            gamma: (grad_out * &cache.xhat).sum_axis(Axis(0)),
            beta: grad_out.sum_axis(Axis(0)),
        };
        let dxhat = grad_out * &self.gamma;
        let sum_dxhat = dxhat.sum_axis(Axis(0));
        let sum_dxhat_xhat = (&dxhat * &cache.xhat).sum_axis(Axis(0));
        let grad_in = (&dxhat * n - &sum_dxhat - &(&cache.xhat * &sum_dxhat_xhat)) * &cache.inv_std / n;
        (grad_in, grads)
    }
}

pub fn relu(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|v| v.max(0.0))
}

/// Zeroes the gradient where the pre-activation was not positive.
pub fn relu_backward(z: &Array2<f32>, mut grad: Array2<f32>) -> Array2<f32> {
    Zip::from(&mut grad).and(z).for_each(|g, &z| {
        if z <= 0.0 {
            *g = 0.0;
        }
    });
    grad
}

/// Inverted dropout mask: 0 with probability `p`, else `1 / (1 - p)`.
pub fn dropout_mask<R: Rng + ?Sized>(shape: (usize, usize), p: f32, rng: &mut R) -> Array2<f32> {
    let keep = 1.0 / (1.0 - p);
    Array2::from_shape_fn(shape, |_| if rng.gen::<f32>() < p { 0.0 } else { keep })
}

pub fn sigmoid(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}
