use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::common::{
    created_response, no_content_response, success_response, validate_input, Count, CreatedId,
    QuantityRequest,
};
use crate::{
    auth::CallerIdentity,
    errors::ServiceError,
    services::{inventory::MaterialDetails, non_negative},
    AppState,
};

/// Owner listing on behalf of a vendor. Vendors calling this endpoint always
/// list for themselves.
#[derive(Debug, Deserialize, Validate)]
pub struct AddMaterialRequest {
    #[validate(range(min = 1))]
    pub vendor_id: i32,
    #[validate]
    #[serde(flatten)]
    pub material: MaterialDetails,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RestockRequest {
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(custom = "non_negative")]
    pub price_per_unit: Decimal,
}

async fn add_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<AddMaterialRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state
        .services
        .inventory
        .add_material(&caller, payload.vendor_id, payload.material)
        .await?;
    Ok(created_response(CreatedId { id }))
}

async fn vendor_add_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<MaterialDetails>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state
        .services
        .inventory
        .vendor_add_material(&caller, payload)
        .await?;
    Ok(created_response(CreatedId { id }))
}

async fn restock_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
    Json(payload): Json<RestockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let material = state
        .services
        .inventory
        .restock_material(&caller, id, payload.quantity, payload.price_per_unit)
        .await?;
    Ok(success_response(material))
}

async fn vendor_restock_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
    Json(payload): Json<RestockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let material = state
        .services
        .inventory
        .vendor_restock_material(&caller, id, payload.quantity, payload.price_per_unit)
        .await?;
    Ok(success_response(material))
}

async fn return_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
    Json(payload): Json<QuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let material = state
        .services
        .inventory
        .return_material(&caller, id, payload.quantity)
        .await?;
    Ok(success_response(material))
}

async fn deactivate_material(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .inventory
        .deactivate_material(&caller, id)
        .await?;
    Ok(no_content_response())
}

async fn list_materials(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.inventory.list_materials().await?))
}

async fn material_count(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.inventory.material_count().await?;
    Ok(success_response(Count { count }))
}

async fn get_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.inventory.get_material(id).await?))
}

async fn materials_by_vendor(
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.inventory.materials_by_vendor(vendor_id).await?,
    ))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/materials", post(add_material).get(list_materials))
        .route("/materials/count", get(material_count))
        .route("/materials/:id", get(get_material))
        .route("/materials/:id/restock", post(restock_material))
        .route("/materials/:id/return", post(return_material))
        .route("/materials/:id/deactivate", post(deactivate_material))
        .route("/vendor/materials", post(vendor_add_material))
        .route("/vendor/materials/:id/restock", post(vendor_restock_material))
        .route("/vendors/:id/materials", get(materials_by_vendor))
}
