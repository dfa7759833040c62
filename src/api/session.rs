//! Session API endpoints
//!
//! GET  /api/session                  - Resolve the session, canvas and fork state
//! GET  /api/session/history          - Base history, or base + branch for prompting
//! POST /api/session/history          - Append an entry to the base timeline or a branch
//! PUT  /api/session/canvas           - Replace the canvas without recording an entry
//! GET  /api/session/prompt-context   - History selected for the next generation
//! GET  /api/session/rest             - REST audit trail
//! POST /api/session/images           - Attach a generated image to the last page

use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vaporvibe_session::{
    AppendOptions, ForkSummary, GeneratedImage, HistoryEntry, PromptContext, RestState,
};

use super::context::{SessionContext, SessionCookie};
use super::{ok, ApiResult, AppState};

/// Session overview
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub prev_html: String,
    pub history_count: usize,
    pub active_fork: Option<ForkSummary>,
}

/// Query for history and audit reads
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    pub limit: Option<usize>,
    pub branch_id: Option<String>,
    /// REST reads only: return the branch-local trail
    #[serde(default)]
    pub branch_only: bool,
}

/// Request to append a history entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendHistoryRequest {
    pub entry: HistoryEntry,
    pub branch_id: Option<String>,
    #[serde(default)]
    pub preserve_prev_html: bool,
}

/// Id of an appended entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendHistoryResponse {
    pub entry_id: String,
}

/// Request to replace the canvas
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCanvasRequest {
    pub html: String,
    pub branch_id: Option<String>,
}

/// Request to attach a generated image
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordImageRequest {
    pub image: GeneratedImage,
    pub branch_id: Option<String>,
}

/// Whether an image found a page to attach to
#[derive(Debug, Serialize)]
pub struct RecordImageResponse {
    pub attached: bool,
}

fn branch(id: &Option<String>) -> Option<&str> {
    id.as_deref().map(str::trim).filter(|b| !b.is_empty())
}

/// Resolve the session and report its state.
async fn get_session(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> (SessionCookie, ApiResult<SessionView>) {
    let sid = ctx.session_id.as_str();
    let view = SessionView {
        session_id: sid.to_string(),
        prev_html: state.store.get_prev_html(sid, None),
        history_count: state.store.get_history(sid, None).len(),
        active_fork: state.store.get_active_fork_summary(sid),
    };
    (ctx.cookie(), ok(view))
}

/// Base history, or the prompt view of a branch.
async fn get_history(
    State(state): State<AppState>,
    ctx: SessionContext,
    Query(query): Query<TimelineQuery>,
) -> (SessionCookie, ApiResult<Vec<HistoryEntry>>) {
    let sid = ctx.session_id.as_str();
    let result = match branch(&query.branch_id) {
        Some(branch_id) => state
            .store
            .get_history_for_prompt(sid, Some(branch_id))
            .map_err(Into::into)
            .and_then(ok),
        None => ok(state.store.get_history(sid, query.limit)),
    };
    (ctx.cookie(), result)
}

/// Append an entry; the session id on the entry is always the caller's.
async fn append_history(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<AppendHistoryRequest>,
) -> (SessionCookie, ApiResult<AppendHistoryResponse>) {
    let sid = ctx.session_id.as_str();
    let mut entry = request.entry;
    entry.session_id = sid.to_string();
    if entry.id.trim().is_empty() {
        entry.id = Uuid::new_v4().to_string();
    }
    let entry_id = entry.id.clone();
    let options = AppendOptions {
        preserve_prev_html: request.preserve_prev_html,
    };

    let result = match branch(&request.branch_id) {
        Some(branch_id) => state
            .store
            .append_to_branch_history(sid, branch_id, entry, options),
        None => state.store.append_history_entry(sid, entry, options),
    };
    let result = result
        .map_err(Into::into)
        .and_then(|()| ok(AppendHistoryResponse { entry_id }));
    (ctx.cookie(), result)
}

/// Replace the canvas of the base timeline or a branch.
async fn set_canvas(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<SetCanvasRequest>,
) -> (SessionCookie, ApiResult<()>) {
    let result = state
        .store
        .set_prev_html(&ctx.session_id, &request.html, branch(&request.branch_id))
        .map_err(Into::into)
        .and_then(ok);
    (ctx.cookie(), result)
}

/// Prompt history under the configured limit and byte budget.
async fn get_prompt_context(
    State(state): State<AppState>,
    ctx: SessionContext,
    Query(query): Query<TimelineQuery>,
) -> (SessionCookie, ApiResult<PromptContext>) {
    let (history_limit, max_bytes) = {
        let runtime = state.runtime.read().await;
        (runtime.history_limit, runtime.history_max_bytes)
    };
    let limit = query.limit.unwrap_or(history_limit);
    let result = state
        .store
        .prompt_context(&ctx.session_id, branch(&query.branch_id), limit, max_bytes)
        .map_err(Into::into)
        .and_then(ok);
    (ctx.cookie(), result)
}

/// REST audit trail of the base timeline or a branch.
async fn get_rest(
    State(state): State<AppState>,
    ctx: SessionContext,
    Query(query): Query<TimelineQuery>,
) -> (SessionCookie, ApiResult<RestState>) {
    let sid = ctx.session_id.as_str();
    let result = match (branch(&query.branch_id), query.branch_only) {
        (Some(branch_id), true) => state.store.get_branch_rest_state(sid, branch_id),
        (branch_id, _) => state.store.get_rest_state(sid, query.limit, branch_id),
    };
    (ctx.cookie(), result.map_err(Into::into).and_then(ok))
}

/// Attach an image to the latest page of the target timeline.
async fn record_image(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<RecordImageRequest>,
) -> (SessionCookie, ApiResult<RecordImageResponse>) {
    let result = state
        .store
        .record_generated_image(&ctx.session_id, request.image, branch(&request.branch_id))
        .map_err(Into::into)
        .and_then(|attached| ok(RecordImageResponse { attached }));
    (ctx.cookie(), result)
}

/// Create session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/history", get(get_history).post(append_history))
        .route("/api/session/canvas", put(set_canvas))
        .route("/api/session/prompt-context", get(get_prompt_context))
        .route("/api/session/rest", get(get_rest))
        .route("/api/session/images", post(record_image))
}
