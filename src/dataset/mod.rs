//! Training data aggregation: independent labeled sources merged in order.
//!
//! A source that fails contributes nothing; the failure is logged and the
//! remaining sources still run.

mod csic;
mod queries;
mod sessions;

pub use csic::CsicSource;
pub use queries::QueryListSource;
pub use sessions::SessionLogSource;

use crate::config::DatasetConfig;
use crate::error::DatasetError;
use crate::features::{Label, LabeledSample};
use tracing::{info, warn};

/// One kind of labeled traffic.
pub trait SampleSource: Send + Sync {
    fn name(&self) -> &str;
    fn read(&self) -> Result<Vec<LabeledSample>, DatasetError>;
}

pub struct DatasetAggregator {
    sources: Vec<Box<dyn SampleSource>>,
}

impl DatasetAggregator {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl SampleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Session logs, CSIC table, then the good and bad query lists.
    pub fn from_config(config: &DatasetConfig) -> Self {
        let mut agg = Self::new();
        if config.session_logs {
            agg = agg.with_source(SessionLogSource::new(&config.data_dir));
        }
        agg.with_source(CsicSource::new(config.resolve(&config.csic_file)))
            .with_source(QueryListSource::new(
                config.resolve(&config.good_queries_file),
                Label::Legitimate,
                config.query_limit,
            ))
            .with_source(QueryListSource::new(
                config.resolve(&config.bad_queries_file),
                Label::Automated,
                config.query_limit,
            ))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn collect(&self) -> Vec<LabeledSample> {
        let mut out = Vec::new();
        for source in &self.sources {
            match source.read() {
                Ok(samples) => {
                    info!(source = source.name(), count = samples.len(), "loaded samples");
                    out.extend(samples);
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "source skipped");
                }
            }
        }
        info!(total = out.len(), "dataset aggregated");
        out
    }
}

impl Default for DatasetAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory source, handy for tests and synthetic data.
pub struct StaticSource {
    name: String,
    samples: Vec<LabeledSample>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, samples: Vec<LabeledSample>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }
}

impl SampleSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Vec<LabeledSample>, DatasetError> {
        Ok(self.samples.clone())
    }
}

/// Datasets are latin-1; every byte maps to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn read_latin1(path: &std::path::Path) -> Result<String, DatasetError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(decode_latin1(&bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DatasetError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RequestRecord;
    use std::path::PathBuf;

    struct Broken;

    impl SampleSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn read(&self) -> Result<Vec<LabeledSample>, DatasetError> {
            Err(DatasetError::NotFound {
                path: PathBuf::from("nowhere"),
            })
        }
    }

    fn sample(url: &str, label: Label) -> LabeledSample {
        LabeledSample::new(RequestRecord::get(url), label)
    }

    #[test]
    fn failing_source_contributes_nothing() {
        let agg = DatasetAggregator::new()
            .with_source(StaticSource::new("a", vec![sample("/a", Label::Legitimate)]))
            .with_source(Broken)
            .with_source(StaticSource::new("b", vec![sample("/b", Label::Automated)]));
        let all = agg.collect();
        assert_eq!(agg.len(), 3);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].record.url, "/a");
        assert_eq!(all[1].label, Label::Automated);
    }

    #[test]
    fn empty_data_dir_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig {
            data_dir: dir.path().to_path_buf(),
            ..DatasetConfig::default()
        };
        let agg = DatasetAggregator::from_config(&config);
        assert_eq!(agg.len(), 4);
        assert!(agg.collect().is_empty());
    }

    #[test]
    fn latin1_maps_high_bytes() {
        assert_eq!(decode_latin1(b"caf\xe9"), "café");
    }
}
