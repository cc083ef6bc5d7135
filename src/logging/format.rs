//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One scored request as printed by `botscore inspect`.
#[derive(Serialize)]
pub struct ScoreLine<'a> {
    pub ts: String,
    pub url: &'a str,
    pub method: &'a str,
    pub user_agent: &'a str,
    pub raw_features: &'a [f32],
    pub normalized_features: &'a [f32],
    pub bot_score: f32,
    pub is_bot: bool,
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber to stderr, level from RUST_LOG or default.
    /// Stdout stays free for report lines.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    /// Emit a single structured line (e.g. an inspection result) without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(w, "{}", line);
        }
    }
}
