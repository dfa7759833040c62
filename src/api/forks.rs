//! A/B fork endpoints
//!
//! POST /api/forks                                - Start a fork from an html entry
//! GET  /api/forks/active                         - Active fork of the caller, if any
//! GET  /api/forks/branches/:branch_id/history    - Branch-local entries
//! POST /api/forks/:fork_id/commit                - Keep one branch
//! POST /api/forks/:fork_id/discard               - Drop both branches

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use vaporvibe_session::{ForkHandle, ForkOutcome, ForkSummary, HistoryEntry};

use super::context::{SessionContext, SessionCookie};
use super::{ok, ApiError, ApiResult, AppState};

/// Request to start a fork
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartForkRequest {
    /// Origin entry; the latest html entry when absent or unknown
    pub base_entry_id: Option<String>,
    pub instructions_a: String,
    pub instructions_b: String,
}

/// Request to keep one branch
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitForkRequest {
    pub branch_id: String,
}

async fn start_fork(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<StartForkRequest>,
) -> (SessionCookie, ApiResult<ForkHandle>) {
    let base_entry_id = request
        .base_entry_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let result = state
        .store
        .start_fork(
            &ctx.session_id,
            base_entry_id,
            request.instructions_a.trim(),
            request.instructions_b.trim(),
        )
        .map_err(Into::into)
        .and_then(ok);
    (ctx.cookie(), result)
}

async fn get_active_fork(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> (SessionCookie, ApiResult<Option<ForkSummary>>) {
    let summary = state.store.get_active_fork_summary(&ctx.session_id);
    (ctx.cookie(), ok(summary))
}

async fn get_branch_history(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(branch_id): Path<String>,
) -> (SessionCookie, ApiResult<Vec<HistoryEntry>>) {
    let result = state
        .store
        .get_branch_history(&ctx.session_id, &branch_id)
        .map_err(Into::into)
        .and_then(ok);
    (ctx.cookie(), result)
}

async fn commit_fork(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(fork_id): Path<String>,
    Json(request): Json<CommitForkRequest>,
) -> (SessionCookie, ApiResult<ForkOutcome>) {
    let branch_id = request.branch_id.trim();
    if branch_id.is_empty() {
        return (
            ctx.cookie(),
            Err(ApiError::bad_request("branchId is required")),
        );
    }
    let result = state
        .store
        .resolve_fork(&ctx.session_id, &fork_id, branch_id)
        .map_err(Into::into)
        .and_then(ok);
    (ctx.cookie(), result)
}

/// Discarding a fork that is already gone answers `null`.
async fn discard_fork(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(fork_id): Path<String>,
) -> (SessionCookie, ApiResult<Option<ForkOutcome>>) {
    let result = state
        .store
        .discard_fork(&ctx.session_id, Some(&fork_id))
        .map_err(Into::into)
        .and_then(|outcome| {
            if outcome.is_none() {
                info!(session_id = %ctx.session_id, fork_id = %fork_id, "Discard found no fork");
            }
            ok(outcome)
        });
    (ctx.cookie(), result)
}

/// Create fork routes
pub fn forks_routes() -> Router<AppState> {
    Router::new()
        .route("/api/forks", post(start_fork))
        .route("/api/forks/active", get(get_active_fork))
        .route(
            "/api/forks/branches/:branch_id/history",
            get(get_branch_history),
        )
        .route("/api/forks/:fork_id/commit", post(commit_fork))
        .route("/api/forks/:fork_id/discard", post(discard_fork))
}
