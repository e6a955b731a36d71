use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use super::common::success_response;
use crate::{errors::ServiceError, services::audit::HistoryFilter, AppState};

#[derive(Debug, Serialize)]
pub struct ConservationReport {
    pub consistent: bool,
    pub violations: Vec<i32>,
}

async fn supply_history(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<HistoryFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.audit.supply_history(filter).await?,
    ))
}

async fn verify_conservation(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let violations = state.services.audit.verify_conservation().await?;
    Ok(success_response(ConservationReport {
        consistent: violations.is_empty(),
        violations,
    }))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(supply_history))
        .route("/history/conservation", get(verify_conservation))
}
