//! CSIC-style tabular dataset: one request per row with an explicit class column.
//!
//! The table is UTF-8; invalid sequences become U+FFFD rather than failing the row.

use super::SampleSource;
use crate::error::DatasetError;
use crate::features::{Label, LabeledSample, RequestRecord};
use std::path::PathBuf;

const COL_METHOD: &str = "Method";
const COL_USER_AGENT: &str = "User-Agent";
const COL_CLASS: &str = "classification";
const COL_URL: &str = "URL";

/// Rows whose class is exactly this are legitimate; everything else is a bot.
const NORMAL_CLASS: &str = "Normal";

pub struct CsicSource {
    path: PathBuf,
}

impl CsicSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn csv_err(&self, source: csv::Error) -> DatasetError {
        DatasetError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl SampleSource for CsicSource {
    fn name(&self) -> &str {
        "csic"
    }

    fn read(&self) -> Result<Vec<LabeledSample>, DatasetError> {
        if !self.path.exists() {
            return Err(DatasetError::NotFound {
                path: self.path.clone(),
            });
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_err(e))?;
        let headers = reader.byte_headers().map_err(|e| self.csv_err(e))?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| String::from_utf8_lossy(h).trim() == name)
                .ok_or(DatasetError::MissingColumn {
                    path: self.path.clone(),
                    column: name,
                })
        };
        let (method, ua, class, url) = (
            column(COL_METHOD)?,
            column(COL_USER_AGENT)?,
            column(COL_CLASS)?,
            column(COL_URL)?,
        );

        let mut samples = Vec::new();
        for row in reader.byte_records() {
            let row = row.map_err(|e| self.csv_err(e))?;
            let field = |i: usize| {
                row.get(i)
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default()
            };
            let label = Label::from_is_bot(field(class) != NORMAL_CLASS);
            samples.push(LabeledSample::new(
                RequestRecord::new(field(url), field(method), field(ua)),
                label,
            ));
        }
        Ok(samples)
    }
}
