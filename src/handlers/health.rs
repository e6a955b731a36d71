use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{db, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub timestamp: String,
}

/// Liveness plus a database ping.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database_up = db::check_connection(&state.db).await.is_ok();
    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_up { "up" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database: if database_up { "up" } else { "down" },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}
