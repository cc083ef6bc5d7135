//! Online scoring: artifacts loaded once at startup into an immutable value
//! shared read-only by every request.

pub mod api;

pub use api::{router, AppState};

use crate::artifacts;
use crate::config::ArtifactsConfig;
use crate::error::{ArtifactError, ModelError};
use crate::features::{extract, FeatureVector, NormalizationStats, RequestRecord, FEATURE_DIM};
use crate::model::BotClassifier;
use crate::score::ScoreResult;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::sync::Arc;
use tracing::{info, warn};

/// Statistics plus a classifier that only ever runs in inference mode.
#[derive(Debug)]
pub struct LoadedModel {
    stats: NormalizationStats,
    classifier: BotClassifier,
    stats_digest: String,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn new(stats: NormalizationStats, classifier: BotClassifier) -> Result<Self, ModelError> {
        stats.validate()?;
        Ok(Self {
            stats_digest: artifacts::stats_digest(&stats),
            stats,
            classifier,
            loaded_at: Utc::now(),
        })
    }

    /// Reads both artifacts; they must belong to the same training run.
    pub fn load(config: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        let (stats, model) = artifacts::load_pair(&config.stats_path, &config.model_path)?;
        let classifier = BotClassifier::from_parameters(model.parameters).map_err(|source| ArtifactError::Corrupt {
            path: config.model_path.clone(),
            source,
        })?;
        Self::new(stats, classifier).map_err(|source| ArtifactError::Corrupt {
            path: config.stats_path.clone(),
            source,
        })
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    pub fn stats_digest(&self) -> &str {
        &self.stats_digest
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Raw and normalized features for a request.
    pub fn features(&self, record: &RequestRecord) -> Result<(FeatureVector, FeatureVector), ModelError> {
        let raw = extract(record);
        let normalized = self.stats.apply(&raw)?;
        Ok((raw, normalized))
    }

    /// extract → normalize → classifier in inference mode.
    pub fn score(&self, record: &RequestRecord) -> Result<ScoreResult, ModelError> {
        let (_, normalized) = self.features(record)?;
        let x = Array2::from_shape_fn((1, FEATURE_DIM), |(_, j)| normalized.0[j]);
        let probs = self.classifier.predict(&x)?;
        let p = probs.first().copied().ok_or(ModelError::EmptyInput("classifier output"))?;
        Ok(ScoreResult::from_probability(p))
    }
}

/// Serving lifecycle after startup: ready to score, or degraded for good.
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(Arc<LoadedModel>),
    Degraded { reason: String },
}

impl ModelState {
    /// Missing artifacts degrade the service; malformed or mismatched ones are errors.
    pub fn load(config: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        match LoadedModel::load(config) {
            Ok(model) => {
                info!(
                    stats = %config.stats_path.display(),
                    model = %config.model_path.display(),
                    "model loaded"
                );
                Ok(ModelState::Ready(Arc::new(model)))
            }
            Err(e) if e.is_missing() => {
                warn!(error = %e, "artifacts missing; run `botscore train` first. Scoring disabled");
                Ok(ModelState::Degraded {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready(_))
    }

    pub fn model(&self) -> Option<&Arc<LoadedModel>> {
        match self {
            ModelState::Ready(m) => Some(m),
            ModelState::Degraded { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model() -> LoadedModel {
        let stats = NormalizationStats {
            mean: [1.0, 20.0, 2.0, 1.0, 4.0, 60.0, 8.0],
            std: [1.5, 15.0, 1.0, 2.0, 3.0, 40.0, 6.0],
        };
        LoadedModel::new(stats, BotClassifier::new(&mut StdRng::seed_from_u64(1))).unwrap()
    }

    #[test]
    fn scoring_twice_is_identical() {
        let m = model();
        let r = RequestRecord::new("/login?user=' OR 1=1", "GET", "sqlmap/1.5.2");
        let a = m.score(&r).unwrap();
        let b = m.score(&r).unwrap();
        assert_eq!(a.bot_score.to_bits(), b.bot_score.to_bits());
        assert!((0.0..=1.0).contains(&a.bot_score));
        assert_eq!(a.is_bot, a.bot_score > 0.5);
    }

    #[test]
    fn features_follow_the_stats() {
        let m = model();
        let (raw, norm) = m.features(&RequestRecord::get("/")).unwrap();
        assert_eq!(raw.0[1], 1.0);
        assert!((norm.0[1] - (1.0 - 20.0) / 15.0).abs() < 1e-6);
    }

    #[test]
    fn zero_std_rejected_at_construction() {
        let stats = NormalizationStats {
            mean: [0.0; FEATURE_DIM],
            std: [0.0; FEATURE_DIM],
        };
        let clf = BotClassifier::new(&mut StdRng::seed_from_u64(2));
        assert!(matches!(
            LoadedModel::new(stats, clf),
            Err(ModelError::ZeroStd { index: 0, .. })
        ));
    }

    #[test]
    fn missing_artifacts_degrade() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactsConfig {
            stats_path: dir.path().join("stats.json"),
            model_path: dir.path().join("model.json"),
        };
        let state = ModelState::load(&config).unwrap();
        assert!(!state.is_ready());
        assert!(state.model().is_none());
    }

    #[test]
    fn malformed_artifacts_fail_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactsConfig {
            stats_path: dir.path().join("stats.json"),
            model_path: dir.path().join("model.json"),
        };
        std::fs::write(&config.stats_path, b"{").unwrap();
        assert!(ModelState::load(&config).is_err());
    }
}
