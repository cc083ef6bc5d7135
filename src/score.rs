//! Turns a classifier probability into the served verdict.

use serde::{Deserialize, Serialize};

/// Probabilities strictly above this are bots.
pub const BOT_THRESHOLD: f32 = 0.5;

pub fn is_bot(probability: f32) -> bool {
    probability > BOT_THRESHOLD
}

/// Score for a single request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub bot_score: f32,
    pub is_bot: bool,
}

impl ScoreResult {
    pub fn from_probability(probability: f32) -> Self {
        Self {
            bot_score: probability,
            is_bot: is_bot(probability),
        }
    }
}
