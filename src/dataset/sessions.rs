//! Web server session logs paired with per-session bot/human annotations.
//!
//! Layout under the data directory:
//! - `phase*/annotations/<set>/{train,test}`: `<session_id> <label>` per line
//! - `phase*/data/web_logs/<set>/*.log`: Apache-style lines carrying the session id

use super::{read_latin1, SampleSource};
use crate::error::DatasetError;
use crate::features::{Label, LabeledSample, RequestRecord};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

static LOG_LINE: OnceLock<Regex> = OnceLock::new();

// - - [date] "METHOD URL HTTP/x" status size "referrer" session "user-agent"
fn log_line() -> &'static Regex {
    LOG_LINE.get_or_init(|| {
        Regex::new(r#"^- - \[.*?\] "(.*?) (.*?) HTTP/.*?" \d+ \d+ "(.*?)" (\S+) "(.*?)""#)
            .expect("log line pattern")
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Role {
    Annotation,
    Log,
}

pub struct SessionLogSource {
    root: PathBuf,
}

impl SessionLogSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Classifies a file by its path relative to the data root.
    fn role(rel: &Path) -> Option<Role> {
        let parts: Vec<&str> = rel.iter().filter_map(|p| p.to_str()).collect();
        let phase = parts.first()?;
        if !phase.starts_with("phase") || parts.iter().any(|p| p.starts_with('.')) {
            return None;
        }
        match parts.as_slice() {
            [_, "annotations", _, "train" | "test"] => Some(Role::Annotation),
            [_, "data", "web_logs", _, file] if file.ends_with(".log") => Some(Role::Log),
            _ => None,
        }
    }

    /// Annotation and log files, each list sorted for reproducible runs.
    /// Every `train` annotation file precedes every `test` one, so test labels
    /// win for a session listed in both.
    fn discover(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>), DatasetError> {
        let mut annotations = Vec::new();
        let mut logs = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(5).follow_links(true) {
            let entry = entry.map_err(|source| DatasetError::Walk {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            match Self::role(rel) {
                Some(Role::Annotation) => annotations.push(entry.path().to_path_buf()),
                Some(Role::Log) => logs.push(entry.path().to_path_buf()),
                None => {}
            }
        }
        annotations.sort_by_key(|p| (p.file_name().map_or(false, |n| n == "test"), p.clone()));
        logs.sort();
        Ok((annotations, logs))
    }
}

/// Later files override earlier ones for the same session.
fn parse_annotations(text: &str, labels: &mut HashMap<String, Label>) {
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if let [sid, label] = parts.as_slice() {
            let is_bot = label.to_lowercase().contains("bot");
            labels.insert(sid.to_string(), Label::from_is_bot(is_bot));
        }
    }
}

fn parse_log(text: &str, labels: &HashMap<String, Label>, out: &mut Vec<LabeledSample>) {
    let re = log_line();
    for line in text.lines() {
        let Some(c) = re.captures(line) else {
            continue;
        };
        let sid = c[4].trim();
        if let Some(label) = labels.get(sid) {
            out.push(LabeledSample::new(
                RequestRecord::new(&c[2], &c[1], &c[5]),
                *label,
            ));
        }
    }
}

impl SampleSource for SessionLogSource {
    fn name(&self) -> &str {
        "session_logs"
    }

    fn read(&self) -> Result<Vec<LabeledSample>, DatasetError> {
        if !self.root.is_dir() {
            return Err(DatasetError::NotFound {
                path: self.root.clone(),
            });
        }
        let (annotation_files, log_files) = self.discover()?;
        tracing::debug!(
            annotations = annotation_files.len(),
            logs = log_files.len(),
            "session dataset files"
        );

        let mut labels = HashMap::new();
        for path in &annotation_files {
            parse_annotations(&read_latin1(path)?, &mut labels);
        }
        let mut samples = Vec::new();
        for path in &log_files {
            parse_log(&read_latin1(path)?, &labels, &mut samples);
        }
        Ok(samples)
    }
}
