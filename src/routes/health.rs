use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::response::success;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthData {
    environment: String,
    uptime_seconds: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoData {
    version: String,
    documentation: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Response {
    success(
        "Server is healthy",
        HealthData {
            environment: std::env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string()),
            uptime_seconds: state.uptime_seconds(),
        },
    )
}

pub async fn info(State(state): State<AppState>) -> Response {
    success(
        "APTX Learning Platform API",
        InfoData {
            version: state.config().api_version.clone(),
            documentation: "/api-docs",
        },
    )
}
