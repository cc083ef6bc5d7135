//! Service configuration. Shared by the trainer and the scoring service so both
//! resolve the same artifact paths.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file when `--config` is not given.
pub const CONFIG_PATH_ENV: &str = "BOTSCORE_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotscoreConfig {
    /// Where the statistics and model artifacts live
    pub artifacts: ArtifactsConfig,
    /// Training data sources
    pub dataset: DatasetConfig,
    /// Optimizer and split parameters
    pub training: TrainingConfig,
    /// HTTP scoring service
    pub serve: ServeConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Normalization statistics (mean/std per feature)
    pub stats_path: PathBuf,
    /// Classifier parameters
    pub model_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Root of all training sources; the file names below are relative to it
    pub data_dir: PathBuf,
    /// Session logs + annotations (`phase*/...`) under `data_dir`
    pub session_logs: bool,
    pub csic_file: PathBuf,
    pub good_queries_file: PathBuf,
    pub bad_queries_file: PathBuf,
    /// Max lines read from each query list
    pub query_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Share of samples used for training; the rest is validation
    pub train_fraction: f64,
    /// Shuffle/initialisation seed. Drawn at random (and logged) when absent.
    pub seed: Option<u64>,
    /// SQLite file recording runs and per-epoch metrics. Disabled when absent.
    pub history_db: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub bind: String,
    /// Environment variable holding the shared credential for `/predict`
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            stats_path: PathBuf::from("model_stats.json"),
            model_path: PathBuf::from("model.json"),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            session_logs: true,
            csic_file: PathBuf::from("csic_database.csv"),
            good_queries_file: PathBuf::from("goodqueries.txt"),
            bad_queries_file: PathBuf::from("badqueries.txt"),
            query_limit: 50_000,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 64,
            learning_rate: 1e-3,
            train_fraction: 0.8,
            seed: None,
            history_db: None,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            api_key_env: "BOTSCORE_API_KEY".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DatasetConfig {
    pub fn resolve(&self, file: &Path) -> PathBuf {
        self.data_dir.join(file)
    }
}

impl BotscoreConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        Self::try_load(path).unwrap_or_default()
    }

    /// Like [`BotscoreConfig::load`], but an unreadable or malformed file is
    /// an error instead of silently becoming the defaults.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Config path from the explicit argument, else the environment, else `config.json`.
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "training": { "epochs": 2, "seed": 7 }, "log": { "json": true } }"#;
        let c: BotscoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.training.epochs, 2);
        assert_eq!(c.training.seed, Some(7));
        assert_eq!(c.training.batch_size, 64);
        assert!(c.log.json);
        assert_eq!(c.log.level, "info");
        assert_eq!(c.artifacts.model_path, PathBuf::from("model.json"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "artifacts": { "model_path": 3 } }"#).unwrap();
        assert!(matches!(
            BotscoreConfig::try_load(&path),
            Err(ConfigError::Json { .. })
        ));
        // the lenient loader still falls back
        assert_eq!(BotscoreConfig::load(&path).artifacts.model_path, PathBuf::from("model.json"));
    }

    #[test]
    fn missing_file_means_defaults() {
        let c = BotscoreConfig::try_load(Path::new("/nonexistent/botscore.json")).unwrap();
        assert_eq!(c.serve.bind, "0.0.0.0:8000");
    }

    #[test]
    fn dataset_files_resolve_under_data_dir() {
        let d = DatasetConfig {
            data_dir: PathBuf::from("/srv/data"),
            ..DatasetConfig::default()
        };
        assert_eq!(
            d.resolve(&d.csic_file),
            PathBuf::from("/srv/data/csic_database.csv")
        );
    }
}
