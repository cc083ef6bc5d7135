//! botscore entrypoint: `train` builds the artifacts offline, `serve` answers
//! scoring requests over HTTP, `inspect` prints the feature path for a few
//! requests and `history` lists recorded training runs.

use botscore::{
    config::BotscoreConfig,
    dataset::DatasetAggregator,
    features::RequestRecord,
    logging::{ScoreLine, StructuredLogger},
    serving::{router, AppState, LoadedModel, ModelState},
    storage::RunHistory,
    training::Trainer,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "botscore", version, about = "Bot-probability scoring for HTTP requests")]
struct Cli {
    /// JSON config file (defaults to $BOTSCORE_CONFIG_PATH, then config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect the datasets, fit statistics and train the classifier
    Train,
    /// Run the HTTP scoring service
    Serve {
        /// Listen address, overrides the config
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print raw features, normalized features and score for sample requests
    Inspect {
        /// Score this URL instead of the built-in probes
        #[arg(long)]
        url: Option<String>,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long, default_value = "")]
        user_agent: String,
    },
    /// List recent training runs from the history database
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config_path = BotscoreConfig::resolve_path(cli.config);
    let (config, config_error) = match BotscoreConfig::try_load(&config_path) {
        Ok(c) => (c, None),
        Err(e) => (BotscoreConfig::default(), Some(e)),
    };

    StructuredLogger::init(config.log.json, &config.log.level);
    if let Some(e) = config_error {
        warn!(error = %e, "config ignored; using built-in defaults");
    }
    info!(
        config = %config_path.display(),
        stats = %config.artifacts.stats_path.display(),
        model = %config.artifacts.model_path.display(),
        "botscore starting"
    );

    match cli.command {
        Command::Train => train(&config),
        Command::Serve { bind } => serve(&config, bind),
        Command::Inspect {
            url,
            method,
            user_agent,
        } => inspect(&config, url.map(|u| RequestRecord::new(u, method, user_agent))),
        Command::History { limit } => history(&config, limit),
    }
}

fn train(config: &BotscoreConfig) -> Result<(), BoxError> {
    let aggregator = DatasetAggregator::from_config(&config.dataset);
    let report = Trainer::from_config(config).run(&aggregator)?;
    let last = report.epochs.last();
    info!(
        run_id = %report.run_id,
        samples = report.samples,
        seed = report.seed,
        final_loss = ?last.and_then(|e| e.avg_loss),
        final_val_accuracy = ?last.and_then(|e| e.val_accuracy),
        stats = %report.stats_path.display(),
        model = %report.model_path.display(),
        "training complete"
    );
    Ok(())
}

fn serve(config: &BotscoreConfig, bind: Option<String>) -> Result<(), BoxError> {
    // Artifacts load before the listener binds.
    let model = ModelState::load(&config.artifacts)?;
    let state = AppState::from_env(model, &config.serve.api_key_env);
    let addr = bind.unwrap_or_else(|| config.serve.bind.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, model_loaded = state.model.is_ready(), "scoring service listening");
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown requested");
            })
            .await?;
        Ok::<_, BoxError>(())
    })?;
    info!("scoring service stopped");
    Ok(())
}

fn probes() -> Vec<RequestRecord> {
    vec![
        RequestRecord::new(
            "/",
            "GET",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
        RequestRecord::new("/login?user=admin' OR 1=1--", "GET", "sqlmap/1.5.2#stable"),
        RequestRecord::new(
            "/about",
            "GET",
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
        ),
    ]
}

fn inspect(config: &BotscoreConfig, request: Option<RequestRecord>) -> Result<(), BoxError> {
    let model = LoadedModel::load(&config.artifacts)?;
    info!(
        mean = ?model.stats().mean,
        std = ?model.stats().std,
        stats_digest = model.stats_digest(),
        "loaded normalization stats"
    );

    let requests = request.map(|r| vec![r]).unwrap_or_else(probes);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &requests {
        let (raw, normalized) = model.features(record)?;
        let result = model.score(record)?;
        let line = ScoreLine {
            ts: Utc::now().to_rfc3339(),
            url: &record.url,
            method: &record.method,
            user_agent: &record.user_agent,
            raw_features: raw.as_slice(),
            normalized_features: normalized.as_slice(),
            bot_score: result.bot_score,
            is_bot: result.is_bot,
        };
        StructuredLogger::emit_json(&line, &mut out);
    }
    Ok(())
}

fn history(config: &BotscoreConfig, limit: usize) -> Result<(), BoxError> {
    let path = config
        .training
        .history_db
        .as_ref()
        .ok_or("training.history_db is not configured")?;
    let history = RunHistory::open(path)?;
    for run in history.recent_runs(limit)? {
        let epochs = history.epochs(&run.run_id)?;
        let last = epochs.last();
        println!(
            "{}  {}  samples={} train={} val={} seed={} loss={} val_acc={} model={}",
            run.started_at.to_rfc3339(),
            run.run_id,
            run.samples,
            run.train_size,
            run.val_size,
            run.seed,
            fmt_metric(last.and_then(|e| e.avg_loss)),
            fmt_metric(last.and_then(|e| e.val_accuracy)),
            run.model_path.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn fmt_metric(v: Option<f32>) -> String {
    v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}
