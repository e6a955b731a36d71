use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::common::{created_response, success_response, validate_input, Count, CreatedId};
use crate::{
    auth::CallerIdentity,
    errors::ServiceError,
    services::lifecycle::{stage_label, NewProduct},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct AssignMaterialRequest {
    #[validate(range(min = 1))]
    pub material_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StageLabel {
    pub stage: i32,
    pub label: String,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<NewProduct>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state
        .services
        .lifecycle
        .create_product(&caller, payload)
        .await?;
    Ok(created_response(CreatedId { id }))
}

async fn list_products(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.lifecycle.list_products().await?))
}

async fn product_count(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.lifecycle.product_count().await?;
    Ok(success_response(Count { count }))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.lifecycle.get_product(id).await?))
}

async fn assign_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
    Json(payload): Json<AssignMaterialRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let usage = state
        .services
        .lifecycle
        .assign_material(&caller, id, payload.material_id, payload.quantity)
        .await?;
    Ok(success_response(usage))
}

async fn get_product_materials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.lifecycle.get_product_materials(id).await?,
    ))
}

async fn get_product_materials_count(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let count = state
        .services
        .lifecycle
        .get_product_materials_count(id)
        .await?;
    Ok(success_response(Count { count }))
}

async fn get_product_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.lifecycle.get_product_timeline(id).await?,
    ))
}

async fn start_manufacturing(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .lifecycle
        .start_manufacturing(&caller, id)
        .await?;
    Ok(success_response(product))
}

async fn start_distribution(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .lifecycle
        .start_distribution(&caller, id)
        .await?;
    Ok(success_response(product))
}

async fn receive_at_retail(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .lifecycle
        .receive_at_retail(&caller, id)
        .await?;
    Ok(success_response(product))
}

async fn mark_as_sold(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.lifecycle.mark_as_sold(&caller, id).await?;
    Ok(success_response(product))
}

async fn get_stage_label(Path(stage): Path<i32>) -> impl IntoResponse {
    success_response(StageLabel {
        stage,
        label: stage_label(stage).to_string(),
    })
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/count", get(product_count))
        .route("/products/:id", get(get_product))
        .route(
            "/products/:id/materials",
            post(assign_material).get(get_product_materials),
        )
        .route(
            "/products/:id/materials/count",
            get(get_product_materials_count),
        )
        .route("/products/:id/timeline", get(get_product_timeline))
        .route("/products/:id/manufacture", post(start_manufacturing))
        .route("/products/:id/distribute", post(start_distribution))
        .route("/products/:id/receive", post(receive_at_retail))
        .route("/products/:id/sell", post(mark_as_sold))
        .route("/stages/:stage/label", get(get_stage_label))
}
