use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ServiceError;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// Body returned when a command creates a record
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedId {
    pub id: i32,
}

/// Body returned by the count endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct Count {
    pub count: u64,
}

/// Quantity-only command body (returns, assignments without a material)
#[derive(Debug, Deserialize, Validate)]
pub struct QuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: i64,
}
