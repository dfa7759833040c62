//! Admin endpoints
//!
//! These operate on the whole store and never issue a session cookie.
//!
//! GET  /api/admin/forks                    - Active forks of every session
//! GET  /api/admin/sessions                 - Live session listing
//! GET  /api/admin/history.json             - History export download
//! GET  /api/admin/history.md               - Prompt markdown download
//! GET  /api/admin/history/:entry_id        - Rendered html of one entry
//! POST /api/admin/history                  - Replace the store from an export
//! PUT  /api/admin/sessions/:sid/history    - Replace one session's history

use axum::{
    extract::{Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use vaporvibe_session::{
    render_prompt_markdown, BriefAttachment, ForkSummary, HistoryEntry, HistorySnapshot,
    LlmSummary, RuntimeSummary, SessionSummary,
};

use super::{ok, ApiError, ApiResult, AppState};

/// Outcome of a full history import
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub sessions: usize,
    pub brief_updated: bool,
    /// Runtime or provider settings were taken from the document
    pub settings_updated: bool,
}

/// Body of a single-session history replacement
#[derive(Debug, Deserialize)]
pub struct ReplaceSessionRequest {
    pub history: Vec<HistoryEntry>,
}

/// Options for viewing one entry
#[derive(Debug, Default, Deserialize)]
pub struct EntryViewQuery {
    pub download: Option<String>,
}

/// Attachments of the most recent entry that carried any
fn latest_attachments(history: &[HistoryEntry]) -> Vec<BriefAttachment> {
    history
        .iter()
        .rev()
        .find(|entry| !entry.brief_attachments.is_empty())
        .map(|entry| entry.brief_attachments.clone())
        .unwrap_or_default()
}

async fn build_snapshot(state: &AppState) -> HistorySnapshot {
    let history = state.store.export_history();
    let brief = state.brief.read().await.clone();
    let attachments = latest_attachments(&history);
    HistorySnapshot::new(
        history,
        brief,
        attachments,
        state.runtime.read().await.clone(),
        state.llm.read().await.clone(),
    )
}

fn positive(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_u64).filter(|n| *n > 0)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Copy the well-formed prompt settings of an imported `runtime` object.
/// Returns whether anything changed.
fn apply_runtime(runtime: &mut RuntimeSummary, imported: &Value) -> bool {
    let before = runtime.clone();
    if let Some(limit) = positive(imported.get("historyLimit")) {
        runtime.history_limit = usize::try_from(limit).unwrap_or(usize::MAX);
    }
    if let Some(max_bytes) = positive(imported.get("historyMaxBytes")) {
        runtime.history_max_bytes = usize::try_from(max_bytes).unwrap_or(usize::MAX);
    }
    if let Some(flag) = imported.get("includeInstructionPanel").and_then(Value::as_bool) {
        runtime.include_instruction_panel = flag;
    }
    *runtime != before
}

/// Copy the well-formed provider settings of an imported `llm` object.
/// The key mask is never taken from a document.
fn apply_llm(llm: &mut LlmSummary, imported: &Value) -> bool {
    let before = llm.clone();
    if let Some(provider) = non_empty(imported.get("provider")) {
        llm.provider = provider.to_ascii_lowercase();
    }
    if let Some(model) = non_empty(imported.get("model")) {
        llm.model = model;
    }
    if let Some(tokens) = positive(imported.get("maxOutputTokens")) {
        llm.max_output_tokens = tokens;
    }
    if let Some(mode) = non_empty(imported.get("reasoningMode")) {
        llm.reasoning_mode = mode;
    }
    if let Some(tokens) = positive(imported.get("reasoningTokens")) {
        llm.reasoning_tokens = Some(tokens);
    }
    *llm != before
}

fn safe_file_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

async fn list_forks(State(state): State<AppState>) -> ApiResult<Vec<ForkSummary>> {
    ok(state.store.get_active_fork_summaries())
}

async fn list_sessions(State(state): State<AppState>) -> ApiResult<Vec<SessionSummary>> {
    ok(state.store.session_summaries())
}

async fn export_json(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = build_snapshot(&state).await;
    let body = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| ApiError::from(vaporvibe_session::Error::from(e)))?;
    Ok((
        [
            (CONTENT_TYPE, "application/json; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=history.json"),
        ],
        body,
    ))
}

async fn export_markdown(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = build_snapshot(&state).await;
    (
        [
            (CONTENT_TYPE, "text/markdown; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=prompt.md"),
        ],
        render_prompt_markdown(&snapshot),
    )
}

async fn view_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Query(query): Query<EntryViewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .store
        .export_history()
        .into_iter()
        .find(|entry| entry.id == entry_id)
        .ok_or_else(|| ApiError::not_found(format!("history entry {} not found", entry_id)))?;

    let mut response = (
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        entry.response.html,
    )
        .into_response();
    if query.download.as_deref() == Some("1") {
        let disposition = format!("attachment; filename=history-{}.html", safe_file_id(&entry_id));
        if let Ok(value) = disposition.parse() {
            response.headers_mut().insert(CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}

/// Accepts the export document itself, or a form-style `{historyJson: "..."}`
/// wrapper around it.
async fn import_history(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<ImportResponse> {
    let mut document = match payload.get("historyJson") {
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(ApiError::bad_request("no JSON provided"));
            }
            serde_json::from_str(raw)
                .map_err(|e| ApiError::bad_request(format!("invalid JSON: {}", e)))?
        }
        _ => payload,
    };
    let raw_brief = document.get("brief").cloned();
    // Settings are applied field by field below; malformed ones are skipped.
    let (raw_runtime, raw_llm) = match document.as_object_mut() {
        Some(object) => (
            object.remove("runtime").filter(Value::is_object),
            object.remove("llm").filter(Value::is_object),
        ),
        None => (None, None),
    };
    let snapshot = HistorySnapshot::from_json(document)?;

    let sessions = state.store.replace_history(snapshot.history)?;
    let brief_updated = match raw_brief {
        Some(Value::String(brief)) => {
            let brief = brief.trim();
            *state.brief.write().await = (!brief.is_empty()).then(|| brief.to_string());
            true
        }
        _ => false,
    };
    let mut settings_updated = false;
    if let Some(imported) = raw_runtime {
        settings_updated |= apply_runtime(&mut *state.runtime.write().await, &imported);
    }
    if let Some(imported) = raw_llm {
        settings_updated |= apply_llm(&mut *state.llm.write().await, &imported);
    }

    info!(sessions, brief_updated, settings_updated, "Imported history snapshot");
    ok(ImportResponse {
        sessions,
        brief_updated,
        settings_updated,
    })
}

async fn replace_session(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Json(request): Json<ReplaceSessionRequest>,
) -> ApiResult<usize> {
    let count = request.history.len();
    state.store.replace_session_history(&sid, request.history)?;
    ok(count)
}

/// Create admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/forks", get(list_forks))
        .route("/api/admin/sessions", get(list_sessions))
        .route("/api/admin/history.json", get(export_json))
        .route("/api/admin/history.md", get(export_markdown))
        .route("/api/admin/history", post(import_history))
        .route("/api/admin/history/:entry_id", get(view_entry))
        .route("/api/admin/sessions/:sid/history", put(replace_session))
}
