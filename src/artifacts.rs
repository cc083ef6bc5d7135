//! The two persisted artifacts shared by trainer and server: normalization
//! statistics and model parameters.
//!
//! Both are JSON envelopes stamped with the feature schema fingerprint. The
//! model additionally records the digest of the statistics it was trained
//! with, so a stale statistics file cannot be paired with a newer model.

use crate::error::ArtifactError;
use crate::features::{feature_schema, NormalizationStats};
use crate::model::ModelParameters;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub format_version: u32,
    pub feature_schema: String,
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// [`stats_digest`] of the statistics used during training
    pub stats_digest: String,
    pub parameters: ModelParameters,
}

/// SHA-256 of the canonical JSON encoding of the statistics.
pub fn stats_digest(stats: &NormalizationStats) -> String {
    let mut h = Sha256::new();
    // serializing plain float arrays cannot fail
    if let Ok(bytes) = serde_json::to_vec(stats) {
        h.update(&bytes);
    }
    format!("{:x}", h.finalize())
}

fn io_err(path: &Path, source: std::io::Error) -> ArtifactError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ArtifactError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn write<T: Serialize>(path: &Path, payload: T) -> Result<(), ArtifactError> {
    let artifact = Artifact {
        format_version: FORMAT_VERSION,
        feature_schema: feature_schema().to_string(),
        created_at: Utc::now(),
        payload,
    };
    let bytes = serde_json::to_vec_pretty(&artifact).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    // write-then-rename so a reader never sees a half-written file
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<Artifact<T>, ArtifactError> {
    let data = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let artifact: Artifact<T> = serde_json::from_slice(&data).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(ArtifactError::Version {
            path: path.to_path_buf(),
            found: artifact.format_version,
            expected: FORMAT_VERSION,
        });
    }
    if artifact.feature_schema != feature_schema() {
        return Err(ArtifactError::SchemaMismatch {
            path: path.to_path_buf(),
        });
    }
    Ok(artifact)
}

/// Writes the statistics artifact and returns its digest.
pub fn save_stats(path: &Path, stats: &NormalizationStats) -> Result<String, ArtifactError> {
    write(path, stats)?;
    Ok(stats_digest(stats))
}

/// Reads and validates the statistics artifact (strictly positive deviations).
pub fn load_stats(path: &Path) -> Result<NormalizationStats, ArtifactError> {
    let stats = read::<NormalizationStats>(path)?.payload;
    stats.validate().map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(stats)
}

pub fn save_model(path: &Path, parameters: &ModelParameters, stats_digest: &str) -> Result<(), ArtifactError> {
    #[derive(Serialize)]
    struct ModelRef<'a> {
        stats_digest: &'a str,
        parameters: &'a ModelParameters,
    }
    write(
        path,
        ModelRef {
            stats_digest,
            parameters,
        },
    )
}

/// Reads the model artifact and checks tensor shapes against the topology.
pub fn load_model(path: &Path) -> Result<ModelArtifact, ArtifactError> {
    let model = read::<ModelArtifact>(path)?.payload;
    model.parameters.validate().map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(model)
}

/// Loads both artifacts and verifies the model was trained with these statistics.
pub fn load_pair(stats_path: &Path, model_path: &Path) -> Result<(NormalizationStats, ModelArtifact), ArtifactError> {
    let stats = load_stats(stats_path)?;
    let model = load_model(model_path)?;
    let found = stats_digest(&stats);
    if found != model.stats_digest {
        return Err(ArtifactError::StatsDigestMismatch {
            expected: model.stats_digest,
            found,
        });
    }
    Ok((stats, model))
}
