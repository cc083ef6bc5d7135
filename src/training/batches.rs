//! Train/validation split and the per-epoch batch loops.

use crate::error::ModelError;
use crate::model::{Adam, BotClassifier};
use crate::score::is_bot;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Row indices of the two partitions.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

impl Split {
    /// Shuffles `0..n` and keeps the first `floor(train_fraction * n)` for training.
    pub fn shuffled<R: Rng + ?Sized>(n: usize, train_fraction: f64, rng: &mut R) -> Self {
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(rng);
        let train_size = ((train_fraction.clamp(0.0, 1.0) * n as f64) as usize).min(n);
        let validation = idx.split_off(train_size);
        Self {
            train: idx,
            validation,
        }
    }
}

/// One pass over shuffled training batches. Returns the mean batch loss, or
/// `None` when no batch could be formed.
///
/// A trailing batch of one row is skipped: batch statistics are undefined for it.
pub fn train_epoch<R: Rng + ?Sized>(
    clf: &mut BotClassifier,
    optimizer: &mut Adam,
    x: &Array2<f32>,
    y: &Array1<f32>,
    rows: &[usize],
    batch_size: usize,
    rng: &mut R,
) -> Result<Option<f32>, ModelError> {
    let mut order = rows.to_vec();
    order.shuffle(rng);
    let mut total = 0.0f32;
    let mut batches = 0usize;
    for chunk in order.chunks(batch_size.max(1)) {
        if chunk.len() < 2 {
            tracing::debug!(rows = chunk.len(), "skipping undersized batch");
            continue;
        }
        let bx = x.select(Axis(0), chunk);
        let by = y.select(Axis(0), chunk);
        total += clf.train_step(&bx, &by, optimizer, rng)?;
        batches += 1;
    }
    Ok((batches > 0).then(|| total / batches as f32))
}

/// Accuracy at the bot threshold over the given rows, in inference mode.
pub fn evaluate(
    clf: &BotClassifier,
    x: &Array2<f32>,
    y: &Array1<f32>,
    rows: &[usize],
    batch_size: usize,
) -> Result<Option<f32>, ModelError> {
    if rows.is_empty() {
        return Ok(None);
    }
    let mut correct = 0usize;
    for chunk in rows.chunks(batch_size.max(1)) {
        let probs = clf.predict(&x.select(Axis(0), chunk))?;
        correct += probs
            .iter()
            .zip(chunk)
            .filter(|&(&p, &row)| is_bot(p) == (y[row] > 0.5))
            .count();
    }
    Ok(Some(correct as f32 / rows.len() as f32))
}
