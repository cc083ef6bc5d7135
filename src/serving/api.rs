//! HTTP boundary: `GET /health` and `POST /predict`.

use super::ModelState;
use crate::error::ModelError;
use crate::features::RequestRecord;
use crate::score::ScoreResult;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Header carrying the caller credential.
pub const API_KEY_HEADER: &str = "x-api-key";

fn digest(secret: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(secret));
    out
}

#[derive(Clone)]
pub struct AppState {
    pub model: ModelState,
    /// SHA-256 of the configured credential; `None` when unset or empty
    api_key: Option<[u8; 32]>,
}

impl AppState {
    pub fn new(model: ModelState, api_key: Option<&str>) -> Self {
        Self {
            model,
            api_key: api_key.filter(|k| !k.is_empty()).map(|k| digest(k.as_bytes())),
        }
    }

    /// Reads the credential from the named environment variable.
    pub fn from_env(model: ModelState, api_key_env: &str) -> Self {
        let key = std::env::var(api_key_env).ok();
        if key.as_deref().map_or(true, str::is_empty) {
            tracing::warn!(env = api_key_env, "no API key configured; /predict will answer 500");
        }
        Self::new(model, key.as_deref())
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let expected = self.api_key.ok_or(ApiError::Misconfigured)?;
        let provided = headers
            .get(API_KEY_HEADER)
            .map(|v| digest(v.as_bytes()))
            .ok_or(ApiError::Unauthorized)?;
        if provided != expected {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("server misconfiguration")]
    Misconfigured,

    #[error("could not validate credentials")]
    Unauthorized,

    #[error("model not loaded")]
    ModelUnavailable,

    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("scoring failed")]
    Scoring(#[from] ModelError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Scoring(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Scoring(e) => error!(error = %e, "scoring failed"),
            ApiError::Misconfigured => error!("predict called without a configured API key"),
            _ => debug!(error = %self, "predict rejected"),
        }
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.model.is_ready(),
    })
}

/// The body stays raw bytes until the caller is authorized and a model is loaded.
async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ScoreResult>, ApiError> {
    state.authorize(&headers)?;
    let model = state.model.model().ok_or(ApiError::ModelUnavailable)?;
    let record: RequestRecord = serde_json::from_slice(&body)?;
    let result = model.score(&record)?;
    debug!(url = %record.url, score = result.bot_score, is_bot = result.is_bot, "scored");
    Ok(Json(result))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
