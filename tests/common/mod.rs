#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use supplychain_ledger::{
    auth::{Identity, CALLER_HEADER},
    build_router,
    config::AppConfig,
    db,
    events::{self, EventSender},
    services::{
        inventory::MaterialDetails,
        lifecycle::NewProduct,
        registry::{ParticipantRegistration, VendorRegistration},
        LedgerServices,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const OWNER: &str = "0xowner";

pub fn id(raw: &str) -> Identity {
    Identity::parse(raw).expect("valid identity")
}

/// Helper harness for spinning up the ledger backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub owner: Identity,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            OWNER.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_with_config(&db::DbConfig::from(&cfg))
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = Arc::new(
            AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx))
                .expect("valid app state"),
        );
        let router = build_router(state.clone());

        Self {
            router,
            state,
            owner: id(OWNER),
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &LedgerServices {
        &self.state.services
    }

    /// Send a request against the router, optionally as `caller`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        caller: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, caller);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn register_vendor(&self, identity: &str, name: &str) -> i32 {
        self.services()
            .registry
            .register_vendor(
                &self.owner,
                VendorRegistration {
                    identity: identity.to_string(),
                    name: name.to_string(),
                    location: "Pune".to_string(),
                    contact_info: "sales@example.com".to_string(),
                    material_types: "Metal".to_string(),
                },
            )
            .await
            .expect("register vendor")
    }

    pub async fn register_manufacturer(&self, identity: &str) -> i32 {
        self.services()
            .registry
            .register_manufacturer(&self.owner, participant(identity, "Cell Works"))
            .await
            .expect("register manufacturer")
    }

    pub async fn register_distributor(&self, identity: &str) -> i32 {
        self.services()
            .registry
            .register_distributor(&self.owner, participant(identity, "Fast Freight"))
            .await
            .expect("register distributor")
    }

    pub async fn register_retailer(&self, identity: &str) -> i32 {
        self.services()
            .registry
            .register_retailer(&self.owner, participant(identity, "Corner Shop"))
            .await
            .expect("register retailer")
    }

    pub async fn add_material(&self, vendor_id: i32, name: &str, quantity: i64) -> i32 {
        self.services()
            .inventory
            .add_material(&self.owner, vendor_id, details(name, quantity, Decimal::new(5, 0)))
            .await
            .expect("add material")
    }

    pub async fn create_product(&self, name: &str) -> i32 {
        self.services()
            .lifecycle
            .create_product(
                &self.owner,
                NewProduct {
                    name: name.to_string(),
                    description: "desc".to_string(),
                    target_quantity: 10,
                },
            )
            .await
            .expect("create product")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn participant(identity: &str, name: &str) -> ParticipantRegistration {
    ParticipantRegistration {
        identity: identity.to_string(),
        name: name.to_string(),
        location: "Chennai".to_string(),
    }
}

pub fn details(name: &str, quantity: i64, price_per_unit: Decimal) -> MaterialDetails {
    MaterialDetails {
        name: name.to_string(),
        category: "Metal".to_string(),
        unit: "kg".to_string(),
        quantity,
        price_per_unit,
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    }
}
