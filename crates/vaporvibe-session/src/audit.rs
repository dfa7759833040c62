//! REST audit trail
//!
//! Every timeline (base and each branch) keeps its own log of the REST
//! mutations and queries made by generated pages. Each log is clamped to the
//! most recent [`REST_RECORD_LIMIT`] records at append time.

use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{
    AppendOptions, EntryKind, HistoryEntry, HistoryRequest, LlmUsage,
    ReasoningTrace, RestCallType, RestHistoryMetadata, RestMutationRecord, RestQueryRecord,
    RestRequestInfo, RestState, SessionRecord,
};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Records kept per log
pub const REST_RECORD_LIMIT: usize = 25;

/// Drop the oldest items so at most `limit` remain
pub(crate) fn keep_recent<T>(items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        let excess = items.len() - limit;
        items.drain(..excess);
    }
}

fn tail<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items[items.len().saturating_sub(limit)..].to_vec()
}

impl RestState {
    /// Append a mutation, clamping the log
    pub fn push_mutation(&mut self, record: RestMutationRecord) {
        self.mutations.push(record);
        keep_recent(&mut self.mutations, REST_RECORD_LIMIT);
    }

    /// Append a query, clamping the log
    pub fn push_query(&mut self, record: RestQueryRecord) {
        self.queries.push(record);
        keep_recent(&mut self.queries, REST_RECORD_LIMIT);
    }

    /// Copy of the most recent `limit` records of each log
    #[must_use]
    pub fn recent(&self, limit: usize) -> RestState {
        RestState {
            mutations: tail(&self.mutations, limit),
            queries: tail(&self.queries, limit),
        }
    }

    /// `self` followed by `later`, keeping the most recent `limit` overall
    #[must_use]
    pub fn merged_with(&self, later: &RestState, limit: usize) -> RestState {
        let mut mutations = self.mutations.clone();
        mutations.extend(later.mutations.iter().cloned());
        keep_recent(&mut mutations, limit);

        let mut queries = self.queries.clone();
        queries.extend(later.queries.iter().cloned());
        keep_recent(&mut queries, limit);

        RestState { mutations, queries }
    }
}

/// Record produced by one REST call
#[derive(Debug, Clone, PartialEq)]
pub enum RestRecord {
    Mutation(RestMutationRecord),
    Query(RestQueryRecord),
}

/// Everything needed to log a REST call as a history entry
#[derive(Debug, Clone, PartialEq)]
pub struct RestHistoryInput {
    pub record: RestRecord,
    pub response: Option<Value>,
    pub raw_response: Option<String>,
    pub ok: Option<bool>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub usage: Option<LlmUsage>,
    pub reasoning: Option<ReasoningTrace>,
    /// Target branch; the base timeline when `None`
    pub branch_id: Option<String>,
}

impl RestHistoryInput {
    /// Input for a recorded mutation
    #[must_use]
    pub fn mutation(record: RestMutationRecord) -> Self {
        Self {
            record: RestRecord::Mutation(record),
            response: None,
            raw_response: None,
            ok: None,
            error: None,
            duration_ms: 0,
            usage: None,
            reasoning: None,
            branch_id: None,
        }
    }

    /// Input for an answered query, carrying its outcome
    #[must_use]
    pub fn query(record: RestQueryRecord) -> Self {
        let ok = record.ok;
        let error = record.error.clone();
        let raw_response = Some(record.raw_response.clone());
        let response = Some(record.response.clone());
        Self {
            record: RestRecord::Query(record),
            response,
            raw_response,
            ok: Some(ok),
            error,
            duration_ms: 0,
            usage: None,
            reasoning: None,
            branch_id: None,
        }
    }

    /// Build the `rest-mutation` / `rest-query` history entry
    #[must_use]
    pub fn into_entry(self, session_id: &str) -> HistoryEntry {
        let (kind, entry_kind, method, path, query, body, created_at) = match self.record {
            RestRecord::Mutation(r) => (
                RestCallType::Mutation,
                EntryKind::RestMutation,
                r.method,
                r.path,
                r.query,
                r.body,
                r.created_at,
            ),
            RestRecord::Query(r) => (
                RestCallType::Query,
                EntryKind::RestQuery,
                r.method,
                r.path,
                r.query,
                r.body,
                r.created_at,
            ),
        };

        HistoryEntry {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            created_at,
            duration_ms: self.duration_ms,
            request: HistoryRequest {
                method: method.clone(),
                path: path.clone(),
                query: query.clone(),
                body: body.clone(),
                instructions: None,
            },
            entry_kind,
            rest: Some(RestHistoryMetadata {
                kind,
                request: RestRequestInfo {
                    method,
                    path,
                    query,
                    body,
                },
                response: self.response,
                raw_response: self.raw_response,
                ok: self.ok,
                error: self.error,
            }),
            usage: self.usage,
            reasoning: self.reasoning,
            ..HistoryEntry::default()
        }
    }
}

impl SessionRecord {
    fn rest_target(&mut self, branch_id: Option<&str>) -> Result<&mut RestState> {
        match branch_id {
            Some(id) => Ok(&mut self.branch_mut(id)?.rest),
            None => {
                self.ensure_base_writable()?;
                Ok(&mut self.rest)
            }
        }
    }

    /// Log a mutation to the base trail or a branch trail
    pub fn append_mutation(&mut self, record: RestMutationRecord, branch_id: Option<&str>) -> Result<()> {
        self.rest_target(branch_id)?.push_mutation(record);
        Ok(())
    }

    /// Log a query to the base trail or a branch trail
    pub fn append_query(&mut self, record: RestQueryRecord, branch_id: Option<&str>) -> Result<()> {
        self.rest_target(branch_id)?.push_query(record);
        Ok(())
    }

    /// Audit view for prompting.
    ///
    /// With a branch, base and branch logs are concatenated (base first) and
    /// clamped again to `limit`, so older branch records can fall off even if
    /// they were within the branch's own cap.
    pub fn rest_state(&self, limit: Option<usize>, branch_id: Option<&str>) -> Result<RestState> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(REST_RECORD_LIMIT);
        match branch_id {
            Some(id) => Ok(self.rest.merged_with(&self.branch(id)?.rest, limit)),
            None => Ok(self.rest.recent(limit)),
        }
    }

    /// Append a REST call entry, never moving the canvas
    pub fn append_rest_entry(&mut self, input: RestHistoryInput, session_id: &str) -> Result<()> {
        let branch_id = input.branch_id.clone();
        let entry = input.into_entry(session_id);
        match branch_id.as_deref() {
            Some(id) => self.append_branch(id, entry, AppendOptions::preserve()),
            None => self.append_base(entry, AppendOptions::preserve()),
        }
    }
}

impl SessionStore {
    /// Log a REST mutation; base writes fail while a fork is active
    pub fn append_mutation_record(
        &self,
        sid: &str,
        record: RestMutationRecord,
        branch_id: Option<&str>,
    ) -> Result<()> {
        self.write_session(sid, |session, _| session.append_mutation(record, branch_id))?;
        debug!(session_id = %sid, branch_id = ?branch_id, "Recorded REST mutation");
        Ok(())
    }

    /// Log a REST query; base writes fail while a fork is active
    pub fn append_query_record(
        &self,
        sid: &str,
        record: RestQueryRecord,
        branch_id: Option<&str>,
    ) -> Result<()> {
        self.write_session(sid, |session, _| session.append_query(record, branch_id))?;
        debug!(session_id = %sid, branch_id = ?branch_id, "Recorded REST query");
        Ok(())
    }

    /// Audit view of the base trail, or base + branch when a branch is given
    pub fn get_rest_state(
        &self,
        sid: &str,
        limit: Option<usize>,
        branch_id: Option<&str>,
    ) -> Result<RestState> {
        match self.read_session(sid, |record| record.rest_state(limit, branch_id)) {
            Some(result) => result,
            None => match branch_id {
                Some(id) => Err(Error::unknown_branch(id)),
                None => Ok(RestState::default()),
            },
        }
    }

    /// Branch-local audit trail only
    pub fn get_branch_rest_state(&self, sid: &str, branch_id: &str) -> Result<RestState> {
        self.read_session(sid, |record| record.branch(branch_id).map(|b| b.rest.clone()))
            .unwrap_or_else(|| Err(Error::unknown_branch(branch_id)))
    }

    /// Record a REST call as an audit-only history entry
    pub fn append_rest_history_entry(&self, sid: &str, input: RestHistoryInput) -> Result<()> {
        self.write_session(sid, |record, _| record.append_rest_entry(input, sid))
    }

    /// Log a mutation and its history entry in one step, on the branch
    /// named by `input`. Neither lands if either is rejected.
    pub fn record_rest_mutation(
        &self,
        sid: &str,
        record: RestMutationRecord,
        input: RestHistoryInput,
    ) -> Result<()> {
        let branch_id = input.branch_id.clone();
        // The entry append checks the same target as the audit push, so the
        // push cannot fail once the entry has landed.
        self.write_session(sid, |session, _| {
            session.append_rest_entry(input, sid)?;
            session.append_mutation(record, branch_id.as_deref())
        })?;
        debug!(session_id = %sid, branch_id = ?branch_id, "Recorded REST mutation with history entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(n: usize) -> RestMutationRecord {
        RestMutationRecord::new("POST", format!("/rest_api/mutation/item/{}", n))
    }

    #[test]
    fn test_rest_mutation_lands_with_entry() {
        let store = SessionStore::default();
        store
            .append_history_entry("s", HistoryEntry::html("s", "<p>page</p>"), AppendOptions::default())
            .unwrap();
        store
            .record_rest_mutation("s", mutation(1), RestHistoryInput::mutation(mutation(1)))
            .unwrap();

        assert_eq!(store.get_rest_state("s", None, None).unwrap().mutations.len(), 1);
        let history = store.get_history("s", None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].entry_kind, EntryKind::RestMutation);
    }

    #[test]
    fn test_rest_mutation_rejected_as_a_whole() {
        let store = SessionStore::default();
        let mut input = RestHistoryInput::mutation(mutation(1));
        input.branch_id = Some("missing".to_string());
        let err = store.record_rest_mutation("s", mutation(1), input).unwrap_err();
        assert_eq!(err.code(), "unknown_branch");
        assert!(!store.contains("s"));

        store
            .append_history_entry("s", HistoryEntry::html("s", "<p>page</p>"), AppendOptions::default())
            .unwrap();
        store.start_fork("s", None, "a", "b").unwrap();
        let err = store
            .record_rest_mutation("s", mutation(2), RestHistoryInput::mutation(mutation(2)))
            .unwrap_err();
        assert_eq!(err.code(), "fork_active");
        assert!(store.get_rest_state("s", None, None).unwrap().mutations.is_empty());
        assert_eq!(store.get_history("s", None).len(), 1);
    }

    #[test]
    fn test_mutation_log_is_clamped() {
        let mut record = SessionRecord::new(0);
        for i in 0..30 {
            record.append_mutation(mutation(i), None).unwrap();
        }
        let state = record.rest_state(None, None).unwrap();
        assert_eq!(state.mutations.len(), 25);
        assert_eq!(state.mutations[0].path, "/rest_api/mutation/item/5");
        assert_eq!(state.mutations[24].path, "/rest_api/mutation/item/29");
    }

    #[test]
    fn test_rest_state_limit() {
        let mut record = SessionRecord::new(0);
        for i in 0..10 {
            record.append_mutation(mutation(i), None).unwrap();
        }
        let state = record.rest_state(Some(3), None).unwrap();
        assert_eq!(state.mutations.len(), 3);
        assert_eq!(state.mutations[2].path, "/rest_api/mutation/item/9");
    }

    #[test]
    fn test_branch_view_reclamps_concatenation() {
        let mut record = SessionRecord::new(0);
        record
            .append_base(HistoryEntry::html("s", "<p></p>"), AppendOptions::default())
            .unwrap();
        for i in 0..20 {
            record.append_mutation(mutation(i), None).unwrap();
        }
        let handle = record.start_fork(None, "a", "b", 0).unwrap();
        for i in 100..110 {
            record
                .append_mutation(mutation(i), Some(&handle.branch_id_a))
                .unwrap();
        }

        let merged = record.rest_state(None, Some(&handle.branch_id_a)).unwrap();
        assert_eq!(merged.mutations.len(), 25);
        assert_eq!(merged.mutations[0].path, "/rest_api/mutation/item/5");
        assert_eq!(merged.mutations[24].path, "/rest_api/mutation/item/109");

        let other = record.rest_state(None, Some(&handle.branch_id_b)).unwrap();
        assert_eq!(other.mutations.len(), 20);

        assert_eq!(record.branch(&handle.branch_id_a).unwrap().rest.mutations.len(), 10);
    }

    #[test]
    fn test_base_audit_rejected_during_fork() {
        let mut record = SessionRecord::new(0);
        record
            .append_base(HistoryEntry::html("s", "<p></p>"), AppendOptions::default())
            .unwrap();
        record.start_fork(None, "a", "b", 0).unwrap();
        let err = record.append_mutation(mutation(1), None).unwrap_err();
        assert_eq!(err.code(), "fork_active");
        assert!(record.rest.mutations.is_empty());
    }

    #[test]
    fn test_rest_entry_keeps_canvas() {
        let mut record = SessionRecord::new(0);
        record
            .append_base(HistoryEntry::html("s", "<p>page</p>"), AppendOptions::default())
            .unwrap();

        let mut input = RestHistoryInput::mutation(mutation(1));
        input.response = Some(serde_json::json!({ "success": true }));
        record.append_rest_entry(input, "s").unwrap();

        assert_eq!(record.prev_html, "<p>page</p>");
        let entry = record.history.last().unwrap();
        assert_eq!(entry.entry_kind, EntryKind::RestMutation);
        assert_eq!(entry.request.path, "/rest_api/mutation/item/1");
        let rest = entry.rest.as_ref().unwrap();
        assert_eq!(rest.kind, RestCallType::Mutation);
        assert_eq!(rest.response, Some(serde_json::json!({ "success": true })));
    }

    #[test]
    fn test_query_input_carries_outcome() {
        let record = RestQueryRecord {
            id: "q1".to_string(),
            path: "/rest_api/query/items".to_string(),
            method: "GET".to_string(),
            query: Default::default(),
            body: Default::default(),
            created_at: chrono::Utc::now(),
            ok: false,
            response: Value::Null,
            raw_response: "not json".to_string(),
            error: Some("Invalid JSON from model".to_string()),
        };
        let entry = RestHistoryInput::query(record).into_entry("s");
        assert_eq!(entry.entry_kind, EntryKind::RestQuery);
        let rest = entry.rest.unwrap();
        assert_eq!(rest.ok, Some(false));
        assert_eq!(rest.raw_response.as_deref(), Some("not json"));
        assert_eq!(rest.error.as_deref(), Some("Invalid JSON from model"));
    }
}
