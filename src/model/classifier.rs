//! Bot classifier: 7 → 64 → ReLU → BatchNorm → Dropout → 32 → ReLU → 1 → sigmoid.

use super::layers::{
    dropout_mask, relu, relu_backward, sigmoid, BatchNorm1d, BatchNormCache, BatchNormGrads,
    Linear, LinearGrads,
};
use super::optim::Adam;
use super::{Mode, DROPOUT, HIDDEN_1, HIDDEN_2};
use crate::error::ModelError;
use crate::features::FEATURE_DIM;
use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Natural-log floor used by the cross-entropy loss.
const LOG_FLOOR: f32 = -100.0;

/// Full learned state, keyed by layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub fc1: Linear,
    pub bn: BatchNorm1d,
    pub fc2: Linear,
    pub fc3: Linear,
}

impl ModelParameters {
    pub fn init<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            fc1: Linear::new(FEATURE_DIM, HIDDEN_1, rng),
            bn: BatchNorm1d::new(HIDDEN_1),
            fc2: Linear::new(HIDDEN_1, HIDDEN_2, rng),
            fc3: Linear::new(HIDDEN_2, 1, rng),
        }
    }

    /// Checks every tensor against the fixed topology.
    pub fn validate(&self) -> Result<(), ModelError> {
        fn check(name: &'static str, actual: &[usize], expected: &[usize]) -> Result<(), ModelError> {
            if actual != expected {
                return Err(ModelError::ShapeMismatch {
                    name,
                    expected: expected.to_vec(),
                    actual: actual.to_vec(),
                });
            }
            Ok(())
        }
        check("fc1.weight", self.fc1.weight.shape(), &[HIDDEN_1, FEATURE_DIM])?;
        check("fc1.bias", self.fc1.bias.shape(), &[HIDDEN_1])?;
        check("bn.gamma", self.bn.gamma.shape(), &[HIDDEN_1])?;
        check("bn.beta", self.bn.beta.shape(), &[HIDDEN_1])?;
        check("bn.running_mean", self.bn.running_mean.shape(), &[HIDDEN_1])?;
        check("bn.running_var", self.bn.running_var.shape(), &[HIDDEN_1])?;
        check("fc2.weight", self.fc2.weight.shape(), &[HIDDEN_2, HIDDEN_1])?;
        check("fc2.bias", self.fc2.bias.shape(), &[HIDDEN_2])?;
        check("fc3.weight", self.fc3.weight.shape(), &[1, HIDDEN_2])?;
        check("fc3.bias", self.fc3.bias.shape(), &[1])?;
        Ok(())
    }

    /// Trainable tensors in a fixed order (running statistics excluded).
    pub fn trainable_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![
            self.fc1.weight.view_mut().into_dyn(),
            self.fc1.bias.view_mut().into_dyn(),
            self.bn.gamma.view_mut().into_dyn(),
            self.bn.beta.view_mut().into_dyn(),
            self.fc2.weight.view_mut().into_dyn(),
            self.fc2.bias.view_mut().into_dyn(),
            self.fc3.weight.view_mut().into_dyn(),
            self.fc3.bias.view_mut().into_dyn(),
        ]
    }
}

/// Gradients of the trainable tensors.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub fc1: LinearGrads,
    pub bn: BatchNormGrads,
    pub fc2: LinearGrads,
    pub fc3: LinearGrads,
}

impl Gradients {
    /// Same order as [`ModelParameters::trainable_mut`].
    pub fn views(&self) -> Vec<ArrayViewD<'_, f32>> {
        vec![
            self.fc1.weight.view().into_dyn(),
            self.fc1.bias.view().into_dyn(),
            self.bn.gamma.view().into_dyn(),
            self.bn.beta.view().into_dyn(),
            self.fc2.weight.view().into_dyn(),
            self.fc2.bias.view().into_dyn(),
            self.fc3.weight.view().into_dyn(),
            self.fc3.bias.view().into_dyn(),
        ]
    }
}

/// Intermediate activations of one forward pass.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    pub mode: Mode,
    input: Array2<f32>,
    z1: Array2<f32>,
    bn: Option<BatchNormCache>,
    mask: Option<Array2<f32>>,
    dropped: Array2<f32>,
    z2: Array2<f32>,
    a2: Array2<f32>,
    /// (batch, 1) probabilities
    pub output: Array2<f32>,
}

impl ForwardPass {
    pub fn probabilities(&self) -> Array1<f32> {
        self.output.column(0).to_owned()
    }
}

#[derive(Debug, Clone)]
pub struct BotClassifier {
    params: ModelParameters,
}

impl BotClassifier {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            params: ModelParameters::init(rng),
        }
    }

    /// Rejects parameters whose shapes do not fit the topology.
    pub fn from_parameters(params: ModelParameters) -> Result<Self, ModelError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn into_parameters(self) -> ModelParameters {
        self.params
    }

    fn check_input(x: &Array2<f32>) -> Result<(), ModelError> {
        if x.ncols() != FEATURE_DIM {
            return Err(ModelError::ShapeMismatch {
                name: "input",
                expected: vec![x.nrows(), FEATURE_DIM],
                actual: x.shape().to_vec(),
            });
        }
        if x.nrows() == 0 {
            return Err(ModelError::EmptyInput("batch"));
        }
        Ok(())
    }

    /// Runs the network on a (batch, 7) matrix of normalized features.
    ///
    /// `Mode::Training` normalizes with batch statistics and applies dropout
    /// drawn from `rng`; `Mode::Inference` uses the running statistics, skips
    /// dropout and never touches `rng`. Running statistics are not updated
    /// here, see [`BotClassifier::train_step`].
    pub fn forward<R: Rng + ?Sized>(
        &self,
        x: &Array2<f32>,
        mode: Mode,
        rng: &mut R,
    ) -> Result<ForwardPass, ModelError> {
        Self::check_input(x)?;
        let p = &self.params;
        let z1 = p.fc1.forward(x);
        let a1 = relu(&z1);
        let (normed, bn, mask) = match mode {
            Mode::Training => {
                let (out, cache) = p.bn.forward_batch(&a1);
                let mask = dropout_mask(out.dim(), DROPOUT, rng);
                (out, Some(cache), Some(mask))
            }
            Mode::Inference => (p.bn.forward_running(&a1), None, None),
        };
        let dropped = match &mask {
            Some(m) => normed * m,
            None => normed,
        };
        let z2 = p.fc2.forward(&dropped);
        let a2 = relu(&z2);
        let output = sigmoid(&p.fc3.forward(&a2));
        Ok(ForwardPass {
            mode,
            input: x.clone(),
            z1,
            bn,
            mask,
            dropped,
            z2,
            a2,
            output,
        })
    }

    /// Inference-mode probabilities, one per row.
    pub fn predict(&self, x: &Array2<f32>) -> Result<Array1<f32>, ModelError> {
        Ok(self.forward(x, Mode::Inference, &mut NoDraws)?.probabilities())
    }

    /// Binary cross-entropy of a forward pass against 0/1 targets, and the
    /// gradients of that loss. Only valid for training-mode passes.
    pub fn backward(&self, pass: &ForwardPass, targets: &Array1<f32>) -> Result<(f32, Gradients), ModelError> {
        let n = pass.output.nrows();
        if targets.len() != n {
            return Err(ModelError::LabelCount {
                rows: n,
                labels: targets.len(),
            });
        }
        let (Some(bn_cache), Some(mask)) = (&pass.bn, &pass.mask) else {
            return Err(ModelError::EmptyInput("training-mode activations"));
        };
        let probs = pass.probabilities();
        let loss = bce_loss(&probs, targets);

        let p = &self.params;
        // sigmoid + BCE collapse to (p - y) / n at the logit
        let dz3 = ((&probs - targets) / n as f32).insert_axis(Axis(1));
        let (da2, g3) = p.fc3.backward(&pass.a2, &dz3);
        let dz2 = relu_backward(&pass.z2, da2);
        let (ddropped, g2) = p.fc2.backward(&pass.dropped, &dz2);
        let dnormed = ddropped * mask;
        let (da1, gbn) = p.bn.backward(bn_cache, &dnormed);
        let dz1 = relu_backward(&pass.z1, da1);
        let (_, g1) = p.fc1.backward(&pass.input, &dz1);

        Ok((
            loss,
            Gradients {
                fc1: g1,
                bn: gbn,
                fc2: g2,
                fc3: g3,
            },
        ))
    }

    /// One optimisation step on a mini-batch; returns the batch loss.
    pub fn train_step<R: Rng + ?Sized>(
        &mut self,
        x: &Array2<f32>,
        targets: &Array1<f32>,
        optimizer: &mut Adam,
        rng: &mut R,
    ) -> Result<f32, ModelError> {
        let pass = self.forward(x, Mode::Training, rng)?;
        let (loss, grads) = self.backward(&pass, targets)?;
        optimizer.step(&mut self.params, &grads);
        if let Some(cache) = &pass.bn {
            self.params.bn.update_running(cache);
        }
        Ok(loss)
    }
}

/// Mean binary cross-entropy with each log clamped at -100.
pub fn bce_loss(probs: &Array1<f32>, targets: &Array1<f32>) -> f32 {
    let n = probs.len().max(1) as f32;
    probs
        .iter()
        .zip(targets.iter())
        .map(|(&p, &y)| -(y * p.ln().max(LOG_FLOOR) + (1.0 - y) * (1.0 - p).ln().max(LOG_FLOOR)))
        .sum::<f32>()
        / n
}

/// Stand-in RNG for inference passes, which draw nothing.
struct NoDraws;

impl rand::RngCore for NoDraws {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        dest.fill(0);
        Ok(())
    }
}
