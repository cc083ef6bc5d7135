//! Local storage for training run history.

mod history;

pub use history::{EpochRecord, RunHistory, RunRecord};
