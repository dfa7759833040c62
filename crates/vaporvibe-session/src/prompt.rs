//! Prompt context selection
//!
//! Chooses which history entries fit in the next generation's prompt, newest
//! first, under an entry-count limit and a byte budget.

use crate::error::{Error, Result};
use crate::ledger::last_html;
use crate::store::SessionStore;
use crate::types::{HistoryEntry, SessionRecord};
use serde::Serialize;

/// Allowance for labels and formatting around each entry
const ENTRY_OVERHEAD_BYTES: usize = 1024;

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Approximate prompt footprint of one entry, in UTF-8 bytes
#[must_use]
pub fn estimate_entry_size(entry: &HistoryEntry) -> usize {
    let mut bytes = entry.brief.len()
        + entry.request.method.len()
        + entry.request.path.len()
        + pretty(&entry.request.query).len()
        + pretty(&entry.request.body).len()
        + entry.request.instructions.as_deref().map_or(0, str::len)
        + entry.response.html.len();

    if let Some(usage) = &entry.usage {
        bytes += pretty(usage).len();
    }
    for attachment in &entry.brief_attachments {
        bytes += attachment.base64.as_deref().map_or(0, str::len)
            + attachment.name.len()
            + attachment.mime_type.len();
    }
    if let Some(reasoning) = &entry.reasoning {
        if !reasoning.summaries.is_empty() {
            bytes += reasoning.summaries.join("\n").len();
        }
        if !reasoning.details.is_empty() {
            bytes += reasoning.details.join("\n").len();
        }
    }
    bytes + ENTRY_OVERHEAD_BYTES
}

/// Entries chosen by [`select_history_for_prompt`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySelection {
    /// Chronological order
    pub entries: Vec<HistoryEntry>,
    pub bytes: usize,
}

/// Keep the newest entries whose combined size stays within `max_bytes`.
///
/// The newest entry is always kept, even when it alone is over budget.
/// A budget of zero means unbounded.
#[must_use]
pub fn select_history_for_prompt(history: &[HistoryEntry], max_bytes: usize) -> HistorySelection {
    let budget = if max_bytes == 0 { usize::MAX } else { max_bytes };
    let mut selected = Vec::new();
    let mut bytes = 0usize;

    for entry in history.iter().rev() {
        let size = estimate_entry_size(entry);
        if !selected.is_empty() && bytes.saturating_add(size) > budget {
            break;
        }
        selected.push(entry.clone());
        bytes = bytes.saturating_add(size);
    }
    selected.reverse();
    HistorySelection {
        entries: selected,
        bytes,
    }
}

/// Everything the renderer needs from the store for one generation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    pub entries: Vec<HistoryEntry>,
    /// Entries available before any limit applied
    pub total: usize,
    pub omitted_by_limit: usize,
    pub omitted_by_bytes: usize,
    pub bytes: usize,
    /// Canvas the next generation edits
    pub prev_html: String,
}

impl SessionRecord {
    /// Prompt history of the base timeline or a branch, limited to the
    /// most recent `history_limit` entries (zero keeps all), then to the
    /// byte budget.
    pub fn prompt_context(
        &self,
        branch_id: Option<&str>,
        history_limit: usize,
        max_bytes: usize,
    ) -> Result<PromptContext> {
        let history = self.history_for_prompt(branch_id)?;
        let total = history.len();
        let limited = if history_limit > 0 && history_limit < total {
            &history[total - history_limit..]
        } else {
            &history[..]
        };
        let omitted_by_limit = total - limited.len();

        let selection = select_history_for_prompt(limited, max_bytes);
        let omitted_by_bytes = limited.len() - selection.entries.len();

        let prev_html = match last_html(&selection.entries) {
            Some(entry) if !entry.response.html.is_empty() => entry.response.html.clone(),
            _ => self.prev_html(branch_id),
        };

        Ok(PromptContext {
            total,
            omitted_by_limit,
            omitted_by_bytes,
            bytes: selection.bytes,
            entries: selection.entries,
            prev_html,
        })
    }
}

impl SessionStore {
    /// Select prompt history for `sid` (and optionally one branch) from a
    /// single consistent view of the record.
    pub fn prompt_context(
        &self,
        sid: &str,
        branch_id: Option<&str>,
        history_limit: usize,
        max_bytes: usize,
    ) -> Result<PromptContext> {
        match self.read_session(sid, |record| {
            record.prompt_context(branch_id, history_limit, max_bytes)
        }) {
            Some(result) => result,
            None => match branch_id {
                Some(id) => Err(Error::unknown_branch(id)),
                None => Ok(PromptContext::default()),
            },
        }
    }
}
