//! REST mutation recording
//!
//! Generated pages call `/rest_api/mutation/*` for state changes. Nothing is
//! executed; the call is logged on the caller's timeline so the next
//! generation can replay it.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
    routing::post,
    Router,
};
use serde_json::Value;
use tracing::debug;
use vaporvibe_session::{JsonMap, RestHistoryInput, RestMutationRecord};

use super::context::{SessionContext, SessionCookie};
use super::{ok, ApiResult, AppState};

/// Reserved field naming the branch a call belongs to
pub const BRANCH_FIELD: &str = "__vaporvibe_branch";
/// Reserved internal marker field
pub const INTERNAL_FIELD: &str = "__vaporvibe";

fn is_reserved(key: &str) -> bool {
    key == BRANCH_FIELD || key == INTERNAL_FIELD
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Non-object or unparsable bodies record as `{}`
fn parse_body(raw: &[u8]) -> JsonMap {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => JsonMap::new(),
    }
}

/// Query params with reserved fields split off, plus the branch they named
fn split_query(params: Vec<(String, String)>) -> (JsonMap, Option<String>) {
    let mut branch_id = None;
    let mut query = JsonMap::new();
    for (key, value) in params {
        if key == BRANCH_FIELD {
            branch_id = branch_id.or_else(|| non_blank(&value));
        } else if !is_reserved(&key) {
            query.insert(key, Value::String(value));
        }
    }
    (query, branch_id)
}

async fn record_mutation(
    State(state): State<AppState>,
    ctx: SessionContext,
    method: Method,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> (SessionCookie, ApiResult<()>) {
    let sid = ctx.session_id.as_str();
    let (query, query_branch) = split_query(params);
    let mut body = parse_body(&body);
    let body_branch = body
        .get(BRANCH_FIELD)
        .and_then(Value::as_str)
        .and_then(non_blank);
    body.retain(|key, _| !is_reserved(key));
    let branch_id = query_branch.or(body_branch);

    let mut record = RestMutationRecord::new(
        method.as_str(),
        format!("/rest_api/mutation/{}", path.trim_start_matches('/')),
    );
    record.query = query;
    record.body = body;

    let mut input = RestHistoryInput::mutation(record.clone());
    input.response = Some(serde_json::json!({ "success": true }));
    input.ok = Some(true);
    input.branch_id = branch_id.clone();

    let result = state.store.record_rest_mutation(sid, record, input);
    if result.is_ok() {
        debug!(session_id = %sid, path = %path, branch_id = ?branch_id, "Recorded REST mutation");
    }
    (ctx.cookie(), result.map_err(Into::into).and_then(ok))
}

/// Create REST mutation routes
pub fn rest_routes() -> Router<AppState> {
    Router::new().route(
        "/rest_api/mutation/*path",
        post(record_mutation)
            .put(record_mutation)
            .patch(record_mutation),
    )
}
