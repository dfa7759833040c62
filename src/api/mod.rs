//! Web API module for Vaporvibe
//!
//! Provides HTTP endpoints for:
//! - Session canvas, history and REST audit reads/writes
//! - A/B fork start, commit and discard
//! - Admin listings and history import/export
//! - REST mutation recording for generated pages

pub mod admin;
pub mod context;
pub mod forks;
pub mod health;
pub mod rest;
pub mod session;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;
use vaporvibe_session::{LlmSummary, RuntimeSummary, SessionStore};

pub use admin::admin_routes;
pub use forks::forks_routes;
pub use health::health_routes;
pub use rest::rest_routes;
pub use session::session_routes;

/// Handler settings taken from the config at startup
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub cookie_name: String,
    pub runtime: RuntimeSummary,
    pub llm: LlmSummary,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            runtime: RuntimeSummary {
                history_limit: 30,
                history_max_bytes: 200_000,
                ..RuntimeSummary::default()
            },
            llm: LlmSummary::default(),
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub cookie_name: Arc<str>,
    /// Prompt budget and panel flag; a history import may overwrite them
    pub runtime: Arc<RwLock<RuntimeSummary>>,
    pub llm: Arc<RwLock<LlmSummary>>,
    /// Replaced when a history import carries a brief
    pub brief: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(store: Arc<SessionStore>, settings: ApiSettings, brief: Option<String>) -> Self {
        Self {
            store,
            cookie_name: settings.cookie_name.into(),
            runtime: Arc::new(RwLock::new(settings.runtime)),
            llm: Arc::new(RwLock::new(settings.llm)),
            brief: Arc::new(RwLock::new(brief)),
        }
    }
}

/// Generic API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code),
        }
    }
}

/// Handler failure rendered as an `ApiResponse` with a status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }
}

impl From<vaporvibe_session::Error> for ApiError {
    fn from(err: vaporvibe_session::Error) -> Self {
        use vaporvibe_session::Error as E;
        let status = match &err {
            E::ForkActive { .. } | E::ForkAlreadyActive { .. } | E::NoForkOrigin => {
                StatusCode::CONFLICT
            }
            E::NoActiveFork | E::ForkMismatch { .. } | E::UnknownBranch { .. } => {
                StatusCode::NOT_FOUND
            }
            E::UnsupportedSnapshot(_) | E::Serialization(_) => StatusCode::BAD_REQUEST,
            E::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !err.is_client_error() {
            error!(error = %err, "Session store failure");
        }
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::error(self.message, self.code);
        (self.status, Json(body)).into_response()
    }
}

/// Result of a JSON handler
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Create the API router with all endpoints
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(session_routes())
        .merge(forks_routes())
        .merge(admin_routes())
        .merge(rest_routes())
        .with_state(state)
}
