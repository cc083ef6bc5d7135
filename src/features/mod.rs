//! Request-level feature extraction and normalization.
//!
//! The position scheme of [`FeatureVector`] is part of the trained model: both
//! persisted artifacts record [`feature_schema`] and are refused when it changes.

mod extract;
mod normalize;

pub use extract::{extract, feature_schema, method_index, METHODS};
pub use normalize::{normalize, NormalizationStats, STD_EPSILON};

use serde::{Deserialize, Serialize};

pub const FEATURE_DIM: usize = 7;

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "method_index",
    "url_length",
    "url_depth",
    "url_digits",
    "url_special",
    "ua_length",
    "ua_digits",
];

fn default_method() -> String {
    "GET".to_string()
}

/// One observed or synthetic HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub user_agent: String,
}

impl RequestRecord {
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            user_agent: user_agent.into(),
        }
    }

    /// GET with an empty User-Agent.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, default_method(), String::new())
    }
}

/// Ground truth attached to a training sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Legitimate,
    Automated,
}

impl Label {
    pub fn from_is_bot(is_bot: bool) -> Self {
        if is_bot {
            Label::Automated
        } else {
            Label::Legitimate
        }
    }

    /// Regression target: 0 = legitimate, 1 = automated.
    pub fn target(self) -> f32 {
        match self {
            Label::Legitimate => 0.0,
            Label::Automated => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSample {
    pub record: RequestRecord,
    pub label: Label,
}

impl LabeledSample {
    pub fn new(record: RequestRecord, label: Label) -> Self {
        Self { record, label }
    }
}

/// Fixed-size model input, see [`FEATURE_NAMES`] for the meaning of each slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f32; FEATURE_DIM]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Bit patterns, for exact equality checks.
    pub fn to_bits(&self) -> [u32; FEATURE_DIM] {
        self.0.map(f32::to_bits)
    }
}
