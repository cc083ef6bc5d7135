//! Plain newline-delimited URL lists with one label for the whole file.

use super::{read_latin1, SampleSource};
use crate::error::DatasetError;
use crate::features::{Label, LabeledSample, RequestRecord};
use std::path::PathBuf;

pub struct QueryListSource {
    path: PathBuf,
    label: Label,
    /// Lines considered, blank ones included
    limit: usize,
    name: String,
}

impl QueryListSource {
    pub fn new(path: PathBuf, label: Label, limit: usize) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "queries".to_string());
        Self {
            path,
            label,
            limit,
            name,
        }
    }
}

impl SampleSource for QueryListSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Vec<LabeledSample>, DatasetError> {
        let text = read_latin1(&self.path)?;
        Ok(text
            .lines()
            .take(self.limit)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| LabeledSample::new(RequestRecord::get(url), self.label))
            .collect())
    }
}
