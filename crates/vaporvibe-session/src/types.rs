//! Record types held by the session store
//!
//! History entries, REST audit records, fork/branch state and the per-session
//! record that owns them. Field names serialize in camelCase so exported
//! `history.json` files stay readable by the admin UI.
//!
//! All types own their data outright (no `Rc`/`Arc`), so `Clone` is a full
//! value copy; the store relies on that at every boundary crossing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// JSON object used for query strings and request bodies
pub type JsonMap = serde_json::Map<String, Value>;

/// Fragment cache keyed by generated component or style id
pub type FragmentCache = BTreeMap<String, String>;

/// Kind of a history entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// A full rendered page
    #[default]
    Html,
    /// A recorded REST mutation
    RestMutation,
    /// A recorded REST query
    RestQuery,
}

/// Label of one of the two branches of a fork
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BranchLabel {
    /// First alternative
    A,
    /// Second alternative
    B,
}

impl fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Disposition of an entry produced inside a fork
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForkEntryStatus {
    /// Fork still open
    InProgress,
    /// Branch was merged into the base timeline
    Chosen,
    /// Branch was abandoned
    Discarded,
}

/// Fork provenance attached to a history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkInfo {
    pub fork_id: String,
    pub branch_id: String,
    pub label: BranchLabel,
    pub status: ForkEntryStatus,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

/// The request that produced a history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub query: JsonMap,
    #[serde(default)]
    pub body: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Default for HistoryRequest {
    fn default() -> Self {
        Self {
            method: default_method(),
            path: default_path(),
            query: JsonMap::new(),
            body: JsonMap::new(),
            instructions: None,
        }
    }
}

/// The rendered output of a history entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub html: String,
}

/// A file attached to the app brief
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BriefAttachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_name: Option<String>,
}

/// Model settings used for a generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmInfo {
    pub provider: String,
    pub model: String,
    pub max_output_tokens: u64,
    pub reasoning_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_metrics: Option<Value>,
}

/// Reasoning output captured alongside a generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReasoningTrace {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summaries: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// A state-changing REST call made by a generated page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestMutationRecord {
    pub id: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub query: JsonMap,
    #[serde(default)]
    pub body: JsonMap,
    pub created_at: DateTime<Utc>,
}

impl RestMutationRecord {
    /// Create a mutation record stamped now
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.into(),
            method: method.into(),
            query: JsonMap::new(),
            body: JsonMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// A read-only REST call answered by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestQueryRecord {
    pub id: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub query: JsonMap,
    #[serde(default)]
    pub body: JsonMap,
    pub created_at: DateTime<Utc>,
    pub ok: bool,
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub raw_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which kind of REST call a history entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestCallType {
    Mutation,
    Query,
}

/// Request half of [`RestHistoryMetadata`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestRequestInfo {
    pub method: String,
    pub path: String,
    pub query: JsonMap,
    pub body: JsonMap,
}

/// REST details carried by `rest-mutation` / `rest-query` entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestHistoryMetadata {
    #[serde(rename = "type")]
    pub kind: RestCallType,
    pub request: RestRequestInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An image produced by the image generation layer for a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedImage {
    pub id: String,
    pub cache_key: String,
    pub url: String,
    pub prompt: String,
    #[serde(alias = "aspectRatio")]
    pub ratio: String,
    pub provider: String,
    pub model_id: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One rendered page or REST call in a timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub brief: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brief_attachments: Vec<BriefAttachment>,
    #[serde(default)]
    pub request: HistoryRequest,
    #[serde(default)]
    pub response: HistoryResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningTrace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rest_mutations: Vec<RestMutationRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rest_queries: Vec<RestQueryRecord>,
    #[serde(default)]
    pub entry_kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestHistoryMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_cache: Option<FragmentCache>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_cache: Option<FragmentCache>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_images: Vec<GeneratedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_info: Option<ForkInfo>,
}

impl HistoryEntry {
    /// Create an html entry for a rendered page
    #[must_use]
    pub fn html(session_id: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            response: HistoryResponse { html: html.into() },
            ..Self::default()
        }
    }

    /// Set the request that produced this entry
    #[must_use]
    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.request.method = method.into();
        self.request.path = path.into();
        self
    }

    /// Attach the component fragments produced by this render
    #[must_use]
    pub fn with_component_cache(mut self, cache: FragmentCache) -> Self {
        self.component_cache = Some(cache);
        self
    }

    /// Attach the style fragments produced by this render
    #[must_use]
    pub fn with_style_cache(mut self, cache: FragmentCache) -> Self {
        self.style_cache = Some(cache);
        self
    }

    /// Whether this entry is a rendered page
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.entry_kind == EntryKind::Html
    }
}

/// Capped REST audit trail of one timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestState {
    pub mutations: Vec<RestMutationRecord>,
    pub queries: Vec<RestQueryRecord>,
}

/// One labeled alternative timeline inside a fork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchState {
    pub branch_id: String,
    pub label: BranchLabel,
    pub instructions: String,
    pub history: Vec<HistoryEntry>,
    pub rest: RestState,
    pub prev_html: String,
    pub component_cache: FragmentCache,
    pub style_cache: FragmentCache,
    pub next_component_id: u64,
    pub next_style_id: u64,
}

/// Lifecycle of a fork; `Resolved` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkStatus {
    Active,
    Resolved,
}

/// An A/B divergence from one base-timeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkState {
    pub fork_id: String,
    pub origin_entry_id: String,
    pub status: ForkStatus,
    #[serde(with = "crate::codec::branch_pairs")]
    pub branches: HashMap<String, BranchState>,
    pub created_at: u64,
}

/// Everything the store tracks for one browser session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub updated_at: u64,
    #[serde(default)]
    pub prev_html: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub rest: RestState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_fork: Option<ForkState>,
}

impl SessionRecord {
    /// Create an empty record touched at `now_ms`
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            updated_at: now_ms,
            ..Self::default()
        }
    }
}

/// Options for appending to a timeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOptions {
    /// Leave the canvas (`prev_html`) untouched
    pub preserve_prev_html: bool,
}

impl AppendOptions {
    /// Options for audit-only appends that must not move the canvas
    #[must_use]
    pub const fn preserve() -> Self {
        Self {
            preserve_prev_html: true,
        }
    }
}
