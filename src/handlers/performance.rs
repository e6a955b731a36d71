use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::common::{no_content_response, success_response, validate_input};
use crate::{auth::CallerIdentity, errors::ServiceError, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct RateVendorRequest {
    /// Tenths of a star, 10..=50 in steps of 5
    #[validate(range(min = 10, max = 50))]
    pub rating: i32,
}

async fn vendor_performance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.vendor_performance.vendor_performance(id).await?,
    ))
}

async fn verify_vendor(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .vendor_performance
        .verify_vendor(&caller, id)
        .await?;
    Ok(no_content_response())
}

async fn rate_vendor(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
    Json(payload): Json<RateVendorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    state
        .services
        .vendor_performance
        .rate_vendor(&caller, id, payload.rating)
        .await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vendors/:id/performance", get(vendor_performance))
        .route("/vendors/:id/verify", post(verify_vendor))
        .route("/vendors/:id/rating", post(rate_vendor))
}
