//! `history.json` document
//!
//! The flattened, user-facing export of a session: brief, attachments, the
//! history itself and a summary of the runtime and model settings that
//! produced it. Secrets never appear in it; the provider key is masked.

use crate::error::{Error, Result};
use crate::types::{BriefAttachment, HistoryEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Only supported `history.json` version
pub const HISTORY_SNAPSHOT_VERSION: u32 = 1;

/// Image generation settings in effect for the export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageGenerationSummary {
    pub enabled: bool,
    pub provider: String,
    pub model_id: String,
}

/// Prompt-context settings in effect for the export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSummary {
    pub history_limit: usize,
    pub history_max_bytes: usize,
    pub include_instruction_panel: bool,
    pub image_generation: ImageGenerationSummary,
}

/// Provider settings, key masked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSummary {
    pub provider: String,
    pub model: String,
    pub max_output_tokens: u64,
    pub reasoning_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    pub api_key_mask: String,
}

/// Mask a secret for display: up to eight `*`, followed by its length when
/// longer than that. Empty or missing secrets read `not set`.
#[must_use]
pub fn mask_sensitive(value: Option<&str>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return "not set".to_string();
    };
    let length = value.chars().count();
    let masked = "*".repeat(length.min(8));
    if length <= 8 {
        masked
    } else {
        format!("{} ({} chars)", masked, length)
    }
}

/// The `history.json` export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub brief_attachments: Vec<BriefAttachment>,
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub runtime: RuntimeSummary,
    #[serde(default)]
    pub llm: LlmSummary,
}

impl HistorySnapshot {
    /// Build a current-version export stamped now
    #[must_use]
    pub fn new(
        history: Vec<HistoryEntry>,
        brief: Option<String>,
        brief_attachments: Vec<BriefAttachment>,
        runtime: RuntimeSummary,
        llm: LlmSummary,
    ) -> Self {
        Self {
            version: HISTORY_SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            brief,
            brief_attachments,
            history,
            runtime,
            llm,
        }
    }

    /// Parse an uploaded export.
    ///
    /// The payload must be an object with `version: 1` and a `history`
    /// array; entries themselves may be legacy-shaped.
    pub fn from_json(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(Error::unsupported_snapshot("snapshot must be a JSON object"));
        };
        let version_ok = object.get("version").and_then(Value::as_u64)
            == Some(u64::from(HISTORY_SNAPSHOT_VERSION));
        let has_history = object.get("history").is_some_and(Value::is_array);
        if !version_ok || !has_history {
            return Err(Error::unsupported_snapshot("unsupported snapshot format"));
        }

        let mut value = value;
        if let Some(object) = value.as_object_mut() {
            object
                .entry("exportedAt")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Brief with surrounding whitespace removed; `None` when blank
    #[must_use]
    pub fn trimmed_brief(&self) -> Option<&str> {
        self.brief.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}
