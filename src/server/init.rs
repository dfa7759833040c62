//! Server initialization
//!
//! Contains the main `run()` function: load config, restore the session
//! snapshot, serve the API until Ctrl-C, then persist the store.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use vaporvibe_session::SessionStore;

use super::config::AppConfig;
use super::loader::load_config;
use super::persistence;
use crate::api::{api_router, ApiSettings, AppState};

/// Handler settings derived from the loaded config
pub fn api_settings(config: &AppConfig) -> ApiSettings {
    ApiSettings {
        cookie_name: config.session.cookie_name.clone(),
        runtime: config.runtime_summary(),
        llm: config.llm_summary(),
    }
}

fn restore_snapshot(store: &SessionStore, config: &AppConfig) {
    if !config.snapshot.enabled {
        return;
    }
    match persistence::restore(store, &config.snapshot.path) {
        Ok(Some(report)) => info!(
            imported = report.imported,
            expired = report.expired,
            evicted = report.evicted,
            "Restored session snapshot"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %format!("{:#}", e), "Session snapshot not restored, starting empty"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}

/// Run the server
pub async fn run() -> Result<()> {
    let config = load_config()?;
    info!(
        ttl_secs = config.session.ttl_secs,
        capacity = config.session.capacity,
        snapshot = config.snapshot.enabled,
        "Configuration loaded"
    );

    let store = Arc::new(SessionStore::new(config.store_config()));
    restore_snapshot(&store, &config);

    let state = AppState::new(store.clone(), api_settings(&config), config.brief.clone());
    let app = api_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if config.snapshot.enabled {
        if let Err(e) = persistence::persist(&store, &config.snapshot.path) {
            warn!(error = %format!("{:#}", e), "Failed to persist session snapshot");
        }
    }

    info!("Vaporvibe shutdown complete");
    Ok(())
}
