//! botscore: estimates the probability that an HTTP request comes from an
//! automated client.
//!
//! Modular structure:
//! - [`features`]: 7-dimension request feature extraction and normalization
//! - [`model`]: MLP classifier, layers and Adam optimizer
//! - [`dataset`]: labeled sample sources and their aggregation
//! - [`training`]: offline training pipeline
//! - [`artifacts`]: versioned statistics/model files shared by trainer and server
//! - [`serving`]: HTTP scoring service
//! - [`storage`]: training run history
//! - [`logging`]: structured logging

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod score;
pub mod serving;
pub mod storage;
pub mod training;

pub use config::BotscoreConfig;
pub use dataset::{DatasetAggregator, SampleSource};
pub use features::{extract, FeatureVector, Label, LabeledSample, NormalizationStats, RequestRecord};
pub use logging::StructuredLogger;
pub use model::BotClassifier;
pub use score::ScoreResult;
pub use serving::{LoadedModel, ModelState};
pub use training::{Trainer, TrainingReport};
