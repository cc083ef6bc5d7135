//! Integration test: config defaults, dataset aggregation, train → load → score,
//! and the HTTP boundary.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use botscore::{
    config::{ArtifactsConfig, BotscoreConfig, DatasetConfig},
    dataset::DatasetAggregator,
    error::TrainingError,
    features::{Label, LabeledSample, RequestRecord},
    serving::{api::API_KEY_HEADER, router, AppState, ModelState},
    training::Trainer,
};
use http_body_util::BodyExt;
use std::path::Path;
use tower::ServiceExt;

fn samples() -> Vec<LabeledSample> {
    (0..60)
        .map(|i| {
            if i % 3 == 0 {
                LabeledSample::new(
                    RequestRecord::new(
                        format!("/search?q=1' UNION SELECT {} FROM users--", i),
                        "POST",
                        "python-requests/2.31.0",
                    ),
                    Label::Automated,
                )
            } else {
                LabeledSample::new(
                    RequestRecord::new(
                        format!("/products/item-{}", i),
                        "GET",
                        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Safari/605.1.15",
                    ),
                    Label::Legitimate,
                )
            }
        })
        .collect()
}

fn config(dir: &Path) -> BotscoreConfig {
    let mut c = BotscoreConfig::default();
    c.artifacts = ArtifactsConfig {
        stats_path: dir.join("model_stats.json"),
        model_path: dir.join("model.json"),
    };
    c.training.seed = Some(7);
    c.training.epochs = 3;
    c
}

fn trained_state(dir: &Path) -> ModelState {
    let c = config(dir);
    Trainer::from_config(&c).fit(&samples()).unwrap();
    ModelState::load(&c.artifacts).unwrap()
}

fn degraded() -> ModelState {
    ModelState::Degraded {
        reason: "artifacts missing".to_string(),
    }
}

fn predict_request(key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json");
    if let Some(k) = key {
        builder = builder.header(API_KEY_HEADER, k);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn config_load_default() {
    let c = BotscoreConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.training.epochs, 5);
    assert_eq!(c.training.batch_size, 64);
    assert_eq!(c.serve.api_key_env, "BOTSCORE_API_KEY");
    assert_eq!(c.artifacts.stats_path, Path::new("model_stats.json"));
}

#[test]
fn aggregates_query_lists_from_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("goodqueries.txt"), "/index.html\n\n/about\n").unwrap();
    std::fs::write(dir.path().join("badqueries.txt"), "/etc/passwd\n").unwrap();
    let dataset = DatasetConfig {
        data_dir: dir.path().to_path_buf(),
        session_logs: true,
        ..DatasetConfig::default()
    };
    // No CSIC file and no phase directories: those sources contribute nothing.
    let samples = DatasetAggregator::from_config(&dataset).collect();
    assert_eq!(samples.len(), 3);
    assert_eq!(samples.iter().filter(|s| s.label == Label::Automated).count(), 1);
    assert!(samples.iter().all(|s| s.record.method == "GET" && s.record.user_agent.is_empty()));
}

#[test]
fn empty_dataset_aborts_without_model() {
    let dir = tempfile::tempdir().unwrap();
    let c = config(dir.path());
    let result = Trainer::from_config(&c).run(&DatasetAggregator::new());
    assert!(matches!(result, Err(TrainingError::NoSamples)));
    assert!(!c.artifacts.model_path.exists());
}

#[test]
fn train_then_serve_scores_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let state = trained_state(dir.path());
    let model = state.model().unwrap();
    let record = RequestRecord::new("/search?q=1' UNION SELECT 9 FROM users--", "POST", "python-requests/2.31.0");
    let a = model.score(&record).unwrap();
    let b = model.score(&record).unwrap();
    assert_eq!(a.bot_score.to_bits(), b.bot_score.to_bits());
    assert!((0.0..=1.0).contains(&a.bot_score));
    assert_eq!(a.is_bot, a.bot_score > 0.5);
}

#[tokio::test]
async fn health_reports_degraded_service() {
    let app = router(AppState::new(degraded(), Some("secret")));
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["model_loaded"], false);
}

#[tokio::test]
async fn predict_requires_configured_secret() {
    let app = router(AppState::new(degraded(), None));
    let resp = app.oneshot(predict_request(Some("anything"), r#"{"url":"/"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn predict_rejects_bad_credentials() {
    let app = router(AppState::new(degraded(), Some("secret")));
    let missing = app.clone().oneshot(predict_request(None, r#"{"url":"/"}"#)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    let wrong = app.oneshot(predict_request(Some("Secret"), r#"{"url":"/"}"#)).await.unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn credentials_are_checked_before_the_body() {
    let app = router(AppState::new(degraded(), Some("secret")));
    let empty_object = app.clone().oneshot(predict_request(None, "{}")).await.unwrap();
    assert_eq!(empty_object.status(), StatusCode::FORBIDDEN);

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from("not json"))
        .unwrap();
    let resp = app.oneshot(no_content_type).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let unset = router(AppState::new(degraded(), None));
    let resp = unset.oneshot(predict_request(None, "{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn malformed_body_rejected_after_authorization() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(AppState::new(trained_state(dir.path()), Some("secret")));
    let resp = app.oneshot(predict_request(Some("secret"), "{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(resp).await.get("bot_score").is_none());
}

#[tokio::test]
async fn predict_while_degraded_is_unavailable() {
    let app = router(AppState::new(degraded(), Some("secret")));
    let resp = app.oneshot(predict_request(Some("secret"), r#"{"url":"/"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let v = json_body(resp).await;
    assert!(v.get("bot_score").is_none());
    assert!(v["detail"].is_string());
}

#[tokio::test]
async fn predict_scores_with_loaded_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(AppState::new(trained_state(dir.path()), Some("secret")));

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(health).await["model_loaded"], true);

    let body = r#"{"url":"/login?user=admin' OR 1=1--","method":"GET","user_agent":"sqlmap/1.5.2"}"#;
    let resp = app.oneshot(predict_request(Some("secret"), body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    let score = v["bot_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
    assert_eq!(v["is_bot"].as_bool().unwrap(), score > 0.5);
}

#[tokio::test]
async fn predict_defaults_method_and_user_agent() {
    let dir = tempfile::tempdir().unwrap();
    let state = trained_state(dir.path());
    let expected = state.model().unwrap().score(&RequestRecord::get("/about")).unwrap();

    let app = router(AppState::new(state, Some("secret")));
    let resp = app.oneshot(predict_request(Some("secret"), r#"{"url":"/about"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert!((v["bot_score"].as_f64().unwrap() - expected.bot_score as f64).abs() < 1e-6);
}
