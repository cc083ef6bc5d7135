//! Per-feature affine normalization with statistics fitted once at training time.

use super::{FeatureVector, FEATURE_DIM};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Added to every fitted deviation so constant features stay divisible.
pub const STD_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: [f32; FEATURE_DIM],
    pub std: [f32; FEATURE_DIM],
}

impl NormalizationStats {
    /// Mean and sample standard deviation (n - 1) per column, plus [`STD_EPSILON`].
    /// With a single row the deviation is 0 before the epsilon.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyInput("feature matrix"));
        }
        let n = rows.len() as f64;
        let mut mean = [0.0f32; FEATURE_DIM];
        let mut std = [0.0f32; FEATURE_DIM];
        for j in 0..FEATURE_DIM {
            let m = rows.iter().map(|r| r.0[j] as f64).sum::<f64>() / n;
            let var = if rows.len() > 1 {
                rows.iter()
                    .map(|r| {
                        let d = r.0[j] as f64 - m;
                        d * d
                    })
                    .sum::<f64>()
                    / (n - 1.0)
            } else {
                0.0
            };
            mean[j] = m as f32;
            std[j] = var.sqrt() as f32 + STD_EPSILON;
        }
        Ok(Self { mean, std })
    }

    /// Every deviation strictly positive and finite, every mean finite.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (index, &value) in self.std.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ModelError::ZeroStd { index, value });
            }
        }
        for (index, &value) in self.mean.iter().enumerate() {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteMean { index, value });
            }
        }
        Ok(())
    }

    pub fn apply(&self, v: &FeatureVector) -> Result<FeatureVector, ModelError> {
        let mut out = [0.0f32; FEATURE_DIM];
        for i in 0..FEATURE_DIM {
            let s = self.std[i];
            if s == 0.0 || !s.is_finite() {
                return Err(ModelError::ZeroStd { index: i, value: s });
            }
            out[i] = (v.0[i] - self.mean[i]) / s;
        }
        Ok(FeatureVector(out))
    }
}

/// `(x[i] - mean[i]) / std[i]`. No epsilon here: zero deviations are an error.
pub fn normalize(v: &FeatureVector, stats: &NormalizationStats) -> Result<FeatureVector, ModelError> {
    stats.apply(v)
}
