//! HTTP surface: three routes over the relay service.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::counter::CounterMap;
use crate::service::{RelayService, ServiceError};

// ── Shared state ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    service: Arc<RelayService>,
}

impl AppState {
    pub fn new(service: Arc<RelayService>) -> Self {
        Self { service }
    }
}

// ── Request / response types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterRequest {
    /// An absent field behaves exactly like an empty one.
    #[serde(default)]
    id: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    #[serde(rename = "encodedID")]
    encoded_id: String,
}

#[derive(Deserialize)]
struct NotifyRequest {
    #[serde(rename = "encodedID", default)]
    encoded_id: String,
    /// Requested attempt count; non-positive values are treated as 1 and
    /// the dispatcher caps the upper end.
    #[serde(rename = "notifyRetries", default = "default_retries")]
    notify_retries: i64,
}

fn default_retries() -> i64 {
    1
}

/// Non-positive requests collapse to a single attempt; the dispatcher caps
/// the upper end.
fn clamp_retries(raw: i64) -> u32 {
    u32::try_from(raw.max(1)).unwrap_or(u32::MAX)
}

#[derive(Serialize)]
struct NotifyResponse {
    status: &'static str,
}

// ── Error mapping ──────────────────────────────────────────────────────────────

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::MissingInput | ServiceError::InvalidToken(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        warn!("Request failed ({}): {}", status, self);
        let body = Json(json!({
            "error": self.kind(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

// ── Handlers ───────────────────────────────────────────────────────────────────

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ServiceError> {
    let encoded_id = state.service.register(&body.id).await?;
    Ok(Json(RegisterResponse { encoded_id }))
}

async fn notify(
    State(state): State<AppState>,
    Json(body): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, ServiceError> {
    let retries = clamp_retries(body.notify_retries);
    state.service.notify(&body.encoded_id, retries).await?;
    Ok(Json(NotifyResponse { status: "sent" }))
}

async fn counters(State(state): State<AppState>) -> Result<Json<CounterMap>, ServiceError> {
    Ok(Json(state.service.counters().await?))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/notify", post(notify))
        .route("/counters", get(counters))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
