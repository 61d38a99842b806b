//! REST gateway in front of the orchestrator.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use resilience::{CircuitBreaker, CircuitState, RateLimiter, TtlCache};
use shared_types::{AdvisorError, MarketContext, RawQuery};

use crate::orchestrator::Orchestrator;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

const DEFAULT_MILEAGE: i64 = 50_000;
const DEFAULT_CONDITION: &str = "good";
const DEFAULT_REGION: &str = "california";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub cache: Arc<TtlCache<String, MarketContext>>,
    pub reasoning_breaker: Arc<CircuitBreaker>,
}

/// Build the service router. `Lazy::force` pins the uptime clock to
/// router construction rather than the first health probe.
pub fn router(state: AppState) -> Router {
    Lazy::force(&START_TIME);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", get(predict))
        .route("/reset-cache", post(reset_cache))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

fn error_response(err: &AdvisorError) -> Response {
    let code = err.status_code();
    let retry_after_seconds = match err {
        AdvisorError::RateLimitExceeded { retry_after_secs, .. } => Some(*retry_after_secs),
        _ => None,
    };
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
            code,
            retry_after_seconds,
        }),
    )
        .into_response()
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "car-market-advisor",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/predict", "/reset-cache"],
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let circuit = state.reasoning_breaker.state();
    let status = match circuit {
        CircuitState::Closed => "SERVING",
        CircuitState::Open | CircuitState::HalfOpen => "DEGRADED",
    };
    Json(serde_json::json!({
        "status": status,
        "uptime_secs": START_TIME.elapsed().as_secs(),
        "reasoning_circuit": circuit.as_str(),
        "cached_contexts": state.cache.len(),
        "tracked_clients": state.rate_limiter.tracked_clients().await,
    }))
}

#[derive(Debug, Deserialize)]
struct PredictParams {
    make: String,
    model: String,
    year: i32,
    mileage: Option<i64>,
    condition: Option<String>,
    region: Option<String>,
}

fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("X-Client-Id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PredictParams>,
) -> Response {
    let client = client_id(&headers);

    if !state.rate_limiter.admit(&client).await {
        let retry_after_secs = state.rate_limiter.retry_after_secs(&client).await;
        return error_response(&AdvisorError::RateLimitExceeded {
            client_id: client,
            retry_after_secs,
        });
    }

    let raw = RawQuery {
        make: params.make,
        model: params.model,
        year: params.year,
        mileage: params.mileage.unwrap_or(DEFAULT_MILEAGE),
        condition: params.condition.unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
        region: params.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
    };

    match state.orchestrator.run(raw).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => {
            log::warn!("Predict request from '{}' failed: {}", client, err);
            error_response(&err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResetCacheParams {
    make: Option<String>,
    model: Option<String>,
    year: Option<i32>,
    region: Option<String>,
}

/// Drop cached market contexts: one vehicle when fully specified,
/// everything otherwise.
async fn reset_cache(
    State(state): State<AppState>,
    Query(params): Query<ResetCacheParams>,
) -> impl IntoResponse {
    match (params.make, params.model, params.year, params.region) {
        (Some(make), Some(model), Some(year), Some(region)) => {
            let key = format!(
                "{}:{}:{}:{}",
                make.trim().to_ascii_lowercase(),
                model.trim().to_ascii_lowercase(),
                year,
                region.trim().to_ascii_lowercase()
            );
            let removed = state.cache.invalidate(&key);
            Json(serde_json::json!({ "cleared": u64::from(removed), "key": key }))
        }
        _ => {
            let cleared = state.cache.clear();
            Json(serde_json::json!({ "cleared": cleared }))
        }
    }
}
