//! Offline training: collect → extract → fit statistics → persist statistics →
//! split → optimize → report → persist model.

mod batches;

pub use batches::{evaluate, train_epoch, Split};

use crate::artifacts;
use crate::config::{ArtifactsConfig, BotscoreConfig, TrainingConfig};
use crate::dataset::DatasetAggregator;
use crate::error::TrainingError;
use crate::features::{extract, FeatureVector, LabeledSample, NormalizationStats, FEATURE_DIM};
use crate::model::{Adam, BotClassifier};
use crate::storage::{EpochRecord, RunHistory, RunRecord};
use chrono::Utc;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub run_id: String,
    pub samples: usize,
    pub train_size: usize,
    pub val_size: usize,
    pub seed: u64,
    pub stats: NormalizationStats,
    pub stats_digest: String,
    pub epochs: Vec<EpochRecord>,
    pub stats_path: PathBuf,
    pub model_path: PathBuf,
}

pub struct Trainer {
    training: TrainingConfig,
    artifacts: ArtifactsConfig,
}

impl Trainer {
    pub fn new(training: TrainingConfig, artifacts: ArtifactsConfig) -> Self {
        Self {
            training,
            artifacts,
        }
    }

    pub fn from_config(config: &BotscoreConfig) -> Self {
        Self::new(config.training.clone(), config.artifacts.clone())
    }

    /// Full pipeline over whatever the aggregator yields.
    pub fn run(&self, aggregator: &DatasetAggregator) -> Result<TrainingReport, TrainingError> {
        info!(sources = aggregator.len(), "collecting samples");
        let samples = aggregator.collect();
        self.fit(&samples)
    }

    /// Trains on the given samples and writes both artifacts.
    ///
    /// Statistics are fitted on all samples before the split, so training
    /// and validation share one normalization. They are persisted before
    /// optimization starts; the model is persisted after the last epoch
    /// whatever its validation accuracy.
    pub fn fit(&self, samples: &[LabeledSample]) -> Result<TrainingReport, TrainingError> {
        if samples.is_empty() {
            error!("no training samples collected");
            return Err(TrainingError::NoSamples);
        }
        let n = samples.len();
        let run_id = Uuid::new_v4().to_string();
        let seed = self.training.seed.unwrap_or_else(rand::random);
        info!(%run_id, seed, samples = n, "training run started");

        let raw: Vec<FeatureVector> = samples.iter().map(|s| extract(&s.record)).collect();
        let stats = NormalizationStats::fit(&raw)?;
        let stats_digest = artifacts::save_stats(&self.artifacts.stats_path, &stats)?;
        info!(
            path = %self.artifacts.stats_path.display(),
            mean = ?stats.mean,
            std = ?stats.std,
            "normalization stats saved"
        );

        let normalized = raw
            .iter()
            .map(|v| stats.apply(v))
            .collect::<Result<Vec<_>, _>>()?;
        let x = Array2::from_shape_fn((n, FEATURE_DIM), |(i, j)| normalized[i].0[j]);
        let y: Array1<f32> = samples.iter().map(|s| s.label.target()).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let split = Split::shuffled(n, self.training.train_fraction, &mut rng);
        let history = self.open_history(&RunRecord {
            run_id: run_id.clone(),
            started_at: Utc::now(),
            samples: n,
            train_size: split.train.len(),
            val_size: split.validation.len(),
            seed,
            stats_digest: stats_digest.clone(),
            model_path: None,
        });

        let mut clf = BotClassifier::new(&mut rng);
        let mut adam = Adam::new(self.training.learning_rate);
        let batch = self.training.batch_size;
        info!(
            train = split.train.len(),
            validation = split.validation.len(),
            epochs = self.training.epochs,
            batch,
            "optimizing"
        );

        let mut epochs = Vec::with_capacity(self.training.epochs);
        for epoch in 1..=self.training.epochs {
            let avg_loss = train_epoch(&mut clf, &mut adam, &x, &y, &split.train, batch, &mut rng)?;
            let val_accuracy = evaluate(&clf, &x, &y, &split.validation, batch)?;
            info!(epoch, avg_loss = ?avg_loss, val_accuracy = ?val_accuracy, "epoch complete");
            let record = EpochRecord {
                epoch,
                avg_loss,
                val_accuracy,
            };
            if let Some(h) = &history {
                if let Err(e) = h.record_epoch(&run_id, &record) {
                    warn!(error = %e, "run history: epoch not recorded");
                }
            }
            epochs.push(record);
        }

        artifacts::save_model(&self.artifacts.model_path, clf.parameters(), &stats_digest)?;
        info!(path = %self.artifacts.model_path.display(), "model saved");
        if let Some(h) = &history {
            let path = self.artifacts.model_path.to_string_lossy();
            if let Err(e) = h.finish_run(&run_id, &path) {
                warn!(error = %e, "run history: run not finalized");
            }
        }

        Ok(TrainingReport {
            run_id,
            samples: n,
            train_size: split.train.len(),
            val_size: split.validation.len(),
            seed,
            stats,
            stats_digest,
            epochs,
            stats_path: self.artifacts.stats_path.clone(),
            model_path: self.artifacts.model_path.clone(),
        })
    }

    /// History is best-effort: a broken DB never blocks the model artifact.
    fn open_history(&self, run: &RunRecord) -> Option<RunHistory> {
        let path = self.training.history_db.as_ref()?;
        let opened = RunHistory::open(path).and_then(|h| h.begin_run(run).map(|_| h));
        match opened {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "run history disabled");
                None
            }
        }
    }
}
