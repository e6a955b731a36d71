pub mod common;
pub mod health;
pub mod history;
pub mod inventory;
pub mod performance;
pub mod products;
pub mod registry;

use axum::Router;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Every `/api/v1` route of the ledger
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(registry::routes())
        .merge(inventory::routes())
        .merge(products::routes())
        .merge(performance::routes())
        .merge(history::routes())
}
