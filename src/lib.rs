//! Supply-chain provenance ledger
//!
//! Tracks raw materials from vendor supply through manufacturing,
//! distribution and retail to final sale. Every quantity change and stage
//! transition is recorded and attributed to the identity that made it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::Identity;
use crate::db::{DbPool, LedgerStore};
use crate::events::EventSender;
use crate::services::LedgerServices;

/// Shared state handed to every HTTP handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: LedgerServices,
}

impl AppState {
    /// Wires the ledger services over `db` with the configured owner.
    pub fn new(
        db: Arc<DbPool>,
        config: config::AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, errors::ServiceError> {
        let owner = Identity::parse(&config.owner_identity)?;
        let event_sender = Arc::new(event_sender);
        let services = LedgerServices::new(
            LedgerStore::new(db.clone()),
            event_sender.clone(),
            owner,
        );

        Ok(Self {
            db,
            config,
            event_sender,
            services,
        })
    }
}

/// Builds the HTTP router: `/health` plus the `/api/v1` command/query surface
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", handlers::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
