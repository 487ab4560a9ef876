use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::api::state::AppState;
use crate::infrastructure::{cache::redis, CacheBackend};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub cache: String,
    pub sessions: usize,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let (cache, is_healthy) = match (&state.config.config.cache.backend, &state.redis_pool) {
        (CacheBackend::Redis, Some(pool)) => {
            if redis::ping(pool).await {
                ("redis: connected", true)
            } else {
                ("redis: disconnected", false)
            }
        }
        (CacheBackend::Redis, None) => ("redis: not configured", false),
        (CacheBackend::File, _) => ("file", true),
        (CacheBackend::Memory, _) => ("memory", true),
    };

    let response = ReadinessResponse {
        status: if is_healthy { "ready" } else { "not_ready" }.into(),
        cache: cache.into(),
        sessions: state.sessions.len(),
    };

    if is_healthy {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
