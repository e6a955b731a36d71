use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use super::common::{created_response, no_content_response, success_response, validate_input, Count, CreatedId};
use crate::{
    auth::{CallerIdentity, Identity},
    errors::ServiceError,
    services::registry::{ParticipantRegistration, VendorRegistration},
    AppState,
};

async fn register_vendor(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<VendorRegistration>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state.services.registry.register_vendor(&caller, payload).await?;
    info!("Vendor registered: {}", id);
    Ok(created_response(CreatedId { id }))
}

async fn list_vendors(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.list_vendors().await?))
}

async fn vendor_count(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.registry.vendor_count().await?;
    Ok(success_response(Count { count }))
}

async fn get_vendor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.get_vendor(id).await?))
}

async fn deactivate_vendor(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.registry.deactivate_vendor(&caller, id).await?;
    Ok(no_content_response())
}

async fn register_manufacturer(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<ParticipantRegistration>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state
        .services
        .registry
        .register_manufacturer(&caller, payload)
        .await?;
    Ok(created_response(CreatedId { id }))
}

async fn list_manufacturers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.list_manufacturers().await?))
}

async fn manufacturer_count(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.registry.manufacturer_count().await?;
    Ok(success_response(Count { count }))
}

async fn get_manufacturer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.get_manufacturer(id).await?))
}

async fn register_distributor(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<ParticipantRegistration>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state
        .services
        .registry
        .register_distributor(&caller, payload)
        .await?;
    Ok(created_response(CreatedId { id }))
}

async fn list_distributors(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.list_distributors().await?))
}

async fn distributor_count(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.registry.distributor_count().await?;
    Ok(success_response(Count { count }))
}

async fn get_distributor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.get_distributor(id).await?))
}

async fn register_retailer(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(payload): Json<ParticipantRegistration>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = state
        .services
        .registry
        .register_retailer(&caller, payload)
        .await?;
    Ok(created_response(CreatedId { id }))
}

async fn list_retailers(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.list_retailers().await?))
}

async fn retailer_count(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    let count = state.services.registry.retailer_count().await?;
    Ok(success_response(Count { count }))
}

async fn get_retailer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.registry.get_retailer(id).await?))
}

/// Role of an arbitrary identity, e.g. for a client deciding which forms to show
async fn resolve_role(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let identity = Identity::parse(&identity)?;
    Ok(success_response(
        state.services.registry.resolve_role(&identity).await?,
    ))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/roles/:identity", get(resolve_role))
        .route("/vendors", post(register_vendor).get(list_vendors))
        .route("/vendors/count", get(vendor_count))
        .route("/vendors/:id", get(get_vendor))
        .route("/vendors/:id/deactivate", post(deactivate_vendor))
        .route(
            "/manufacturers",
            post(register_manufacturer).get(list_manufacturers),
        )
        .route("/manufacturers/count", get(manufacturer_count))
        .route("/manufacturers/:id", get(get_manufacturer))
        .route(
            "/distributors",
            post(register_distributor).get(list_distributors),
        )
        .route("/distributors/count", get(distributor_count))
        .route("/distributors/:id", get(get_distributor))
        .route("/retailers", post(register_retailer).get(list_retailers))
        .route("/retailers/count", get(retailer_count))
        .route("/retailers/:id", get(get_retailer))
}
