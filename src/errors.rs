use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

use crate::entities::product::Stage;

/// Error body returned by every failing HTTP call
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

/// Every ledger command either commits or fails with exactly one of these.
///
/// A failed command leaves all ledger state untouched: the enclosing
/// transaction is dropped before any write becomes visible.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Duplicate identity: {0} already holds a role")]
    DuplicateIdentity(String),

    #[error("Vendor {0} not found")]
    VendorNotFound(i32),

    #[error("Material {0} not found")]
    MaterialNotFound(i32),

    #[error("Product {0} not found")]
    ProductNotFound(i32),

    #[error("Manufacturer {0} not found")]
    ManufacturerNotFound(i32),

    #[error("Distributor {0} not found")]
    DistributorNotFound(i32),

    #[error("Retailer {0} not found")]
    RetailerNotFound(i32),

    #[error(
        "Insufficient inventory for material {material_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        material_id: i32,
        requested: i64,
        available: i64,
    },

    #[error("Invalid stage: {operation} is not allowed for product {product_id} in stage {stage}")]
    InvalidStage {
        product_id: i32,
        stage: Stage,
        operation: &'static str,
    },

    #[error("Product {0} has no materials assigned")]
    NoMaterialsAssigned(i32),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Stable machine code clients can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::DuplicateIdentity(_) => "duplicate_identity",
            Self::VendorNotFound(_) => "vendor_not_found",
            Self::MaterialNotFound(_) => "material_not_found",
            Self::ProductNotFound(_) => "product_not_found",
            Self::ManufacturerNotFound(_) => "manufacturer_not_found",
            Self::DistributorNotFound(_) => "distributor_not_found",
            Self::RetailerNotFound(_) => "retailer_not_found",
            Self::InsufficientInventory { .. } => "insufficient_inventory",
            Self::InvalidStage { .. } => "invalid_stage",
            Self::NoMaterialsAssigned(_) => "no_materials_assigned",
            Self::InvalidInput(_) => "invalid_input",
            Self::ValidationError(_) => "validation_error",
            Self::MigrationError(_) => "migration_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// True for failures caused by the command itself rather than the store.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::DatabaseError(_) | Self::MigrationError(_) | Self::InternalError(_)
        )
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::MigrationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::DuplicateIdentity(_) => StatusCode::CONFLICT,
            Self::VendorNotFound(_)
            | Self::MaterialNotFound(_)
            | Self::ProductNotFound(_)
            | Self::ManufacturerNotFound(_)
            | Self::DistributorNotFound(_)
            | Self::RetailerNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientInventory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidStage { .. } | Self::NoMaterialsAssigned(_) => StatusCode::CONFLICT,
            Self::InvalidInput(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::MigrationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if !self.is_rejection() {
            tracing::error!(error = %self, "ledger command failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_client_statuses() {
        let err = ServiceError::InsufficientInventory {
            material_id: 1,
            requested: 200,
            available: 120,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "insufficient_inventory");
        assert!(err.is_rejection());

        let err = ServiceError::InvalidStage {
            product_id: 3,
            stage: Stage::Retail,
            operation: "start_manufacturing",
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("start_manufacturing"));
    }

    #[test]
    fn database_errors_hide_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("disk on fire".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_message(), "Database error");
        assert!(!err.is_rejection());
    }
}
