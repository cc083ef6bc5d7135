//! Error types, one enum per concern.

use std::path::PathBuf;
use thiserror::Error;

/// The config file exists but cannot be used.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Numeric failures in normalization and the classifier.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Statistics with a zero (or non-finite) deviation would divide by zero.
    #[error("division by zero: std[{index}] = {value}")]
    ZeroStd { index: usize, value: f32 },

    #[error("non-finite mean[{index}] = {value}")]
    NonFiniteMean { index: usize, value: f32 },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("batch has {rows} rows but {labels} labels")]
    LabelCount { rows: usize, labels: usize },
}

/// Persisted statistics/model artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("artifact I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact {} has format version {found}, expected {expected}", path.display())]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("artifact {} was produced by a different feature extractor", path.display())]
    SchemaMismatch { path: PathBuf },

    #[error("model was trained with statistics {expected}, loaded statistics are {found}")]
    StatsDigestMismatch { expected: String, found: String },

    #[error("corrupt artifact {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}

impl ArtifactError {
    pub fn is_missing(&self) -> bool {
        matches!(self, ArtifactError::NotFound { .. })
    }
}

/// A single training data source failed; the aggregator drops it.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("source file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("malformed CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("no training samples collected; check the dataset paths")]
    NoSamples,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_std_message_names_the_feature() {
        let e = ModelError::ZeroStd {
            index: 3,
            value: 0.0,
        };
        assert_eq!(e.to_string(), "division by zero: std[3] = 0");
    }

    #[test]
    fn only_not_found_counts_as_missing() {
        let missing = ArtifactError::NotFound {
            path: PathBuf::from("model.json"),
        };
        let corrupt = ArtifactError::SchemaMismatch {
            path: PathBuf::from("model.json"),
        };
        assert!(missing.is_missing());
        assert!(!corrupt.is_missing());
    }
}
