//! Health check endpoints.
//!
//! Provides:
//! - `/health`: simple "healthy" + version (for load balancers)
//! - `/health/detailed`: session store occupancy

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use super::AppState;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Store occupancy
#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub sessions: usize,
    pub capacity: usize,
    pub active_forks: usize,
}

/// Detailed health response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: StoreHealth,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let store = StoreHealth {
        sessions: state.store.len(),
        capacity: state.store.capacity(),
        active_forks: state.store.get_active_fork_summaries().len(),
    };
    Json(DetailedHealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store,
    })
}

/// Create health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}
