//! Feed-forward bot classifier, its layers, and the Adam optimizer used to fit it.

mod classifier;
pub mod layers;
mod optim;

pub use classifier::{bce_loss, BotClassifier, ForwardPass, Gradients, ModelParameters};
pub use optim::Adam;

pub const HIDDEN_1: usize = 64;
pub const HIDDEN_2: usize = 32;
/// Dropout probability, applied only in [`Mode::Training`].
pub const DROPOUT: f32 = 0.3;

/// Execution mode of a forward pass. Batch norm and dropout depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}
