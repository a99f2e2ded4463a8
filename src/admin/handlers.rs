use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::AdminState;
use crate::auth::CacheStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub name: &'static str,
    pub version: &'static str,
    pub realm: String,
    pub cache_enabled: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        realm: state.realm.to_string(),
        cache_enabled: state.cache.is_some(),
    })
}

/// Runs every probe now; nothing here is served from a previous run.
pub async fn get_healthcheck(State(state): State<AdminState>) -> Response {
    let report = state.health.run_all().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStats> {
    Json(
        state
            .cache
            .as_ref()
            .map(|cache| cache.stats())
            .unwrap_or_default(),
    )
}

pub async fn flush_cache(State(state): State<AdminState>) -> StatusCode {
    if let Some(cache) = &state.cache {
        cache.invalidate_all();
        tracing::info!("Authentication cache flushed by operator");
    }
    StatusCode::NO_CONTENT
}
