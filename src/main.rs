use std::sync::Arc;

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use supplychain_ledger as ledger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ledger::config::load_config().context("failed to load configuration")?;
    ledger::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB
    let db_config = ledger::db::DbConfig::from(&cfg);
    let db_pool = ledger::db::establish_connection_with_config(&db_config)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        ledger::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = ledger::events::EventSender::new(event_tx);
    tokio::spawn(ledger::events::process_events(event_rx));

    let app_state = Arc::new(ledger::AppState::new(
        Arc::new(db_pool),
        cfg.clone(),
        event_sender,
    )?);
    info!(owner = %cfg.owner_identity, "Ledger opened");

    let mut app = ledger::build_router(app_state);
    if !cfg.is_production() {
        info!("Using permissive CORS outside production");
        app = app.layer(CorsLayer::permissive());
    }

    let addr = cfg.bind_address();
    info!("supplychain-ledger listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
