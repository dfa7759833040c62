//! History ledger
//!
//! The base timeline of a session plus the isolated timelines of its fork
//! branches. Entries are append-only; while a fork is open, every write goes
//! to a branch and the base timeline is frozen.

use crate::cache_ids::{next_id_after, COMPONENT_ID_PREFIX, STYLE_ID_PREFIX};
use crate::codec::{copy_entries, copy_tail, tag_entry};
use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{
    AppendOptions, BranchState, ForkEntryStatus, HistoryEntry, SessionRecord,
};
use tracing::debug;

/// Most recent html entry of a timeline
pub(crate) fn last_html(entries: &[HistoryEntry]) -> Option<&HistoryEntry> {
    entries.iter().rev().find(|entry| entry.is_html())
}

pub(crate) fn last_html_mut(entries: &mut [HistoryEntry]) -> Option<&mut HistoryEntry> {
    entries.iter_mut().rev().find(|entry| entry.is_html())
}

impl BranchState {
    /// Canvas of this branch: its own `prev_html`, else its last html entry
    #[must_use]
    pub fn canvas(&self) -> Option<&str> {
        if !self.prev_html.is_empty() {
            return Some(self.prev_html.as_str());
        }
        last_html(&self.history).map(|entry| entry.response.html.as_str())
    }

    /// Fold an entry's fragment caches into the branch and advance counters
    fn absorb_caches(&mut self, entry: &HistoryEntry) {
        if let Some(cache) = &entry.component_cache {
            self.component_cache
                .extend(cache.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.next_component_id = self
                .next_component_id
                .max(next_id_after(&self.component_cache, COMPONENT_ID_PREFIX));
        }
        if let Some(cache) = &entry.style_cache {
            self.style_cache
                .extend(cache.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.next_style_id = self
                .next_style_id
                .max(next_id_after(&self.style_cache, STYLE_ID_PREFIX));
        }
    }
}

impl SessionRecord {
    /// Canvas for the next generation on the base timeline or a branch
    #[must_use]
    pub fn prev_html(&self, branch_id: Option<&str>) -> String {
        if let Some(canvas) = branch_id
            .and_then(|id| self.branch(id).ok())
            .and_then(BranchState::canvas)
        {
            return canvas.to_string();
        }
        if !self.prev_html.is_empty() {
            return self.prev_html.clone();
        }
        last_html(&self.history)
            .map(|entry| entry.response.html.clone())
            .unwrap_or_default()
    }

    /// Branch of the active fork
    pub fn branch(&self, branch_id: &str) -> Result<&BranchState> {
        self.active_fork
            .as_ref()
            .and_then(|fork| fork.branches.get(branch_id))
            .ok_or_else(|| Error::unknown_branch(branch_id))
    }

    pub(crate) fn branch_mut(&mut self, branch_id: &str) -> Result<&mut BranchState> {
        self.active_fork
            .as_mut()
            .and_then(|fork| fork.branches.get_mut(branch_id))
            .ok_or_else(|| Error::unknown_branch(branch_id))
    }

    /// Fail when a fork is open; the base timeline is frozen meanwhile.
    pub(crate) fn ensure_base_writable(&self) -> Result<()> {
        match &self.active_fork {
            Some(fork) => Err(Error::ForkActive {
                fork_id: fork.fork_id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Replace the canvas of the base timeline or a branch
    pub fn set_prev_html(&mut self, html: &str, branch_id: Option<&str>) -> Result<()> {
        match branch_id {
            Some(id) => self.branch_mut(id)?.prev_html = html.to_string(),
            None => {
                self.ensure_base_writable()?;
                self.prev_html = html.to_string();
            }
        }
        Ok(())
    }

    /// Append to the base timeline
    pub fn append_base(&mut self, entry: HistoryEntry, options: AppendOptions) -> Result<()> {
        self.ensure_base_writable()?;
        if !options.preserve_prev_html {
            self.prev_html = entry.response.html.clone();
        }
        self.history.push(entry);
        Ok(())
    }

    /// Append to a branch of the active fork
    pub fn append_branch(
        &mut self,
        branch_id: &str,
        mut entry: HistoryEntry,
        options: AppendOptions,
    ) -> Result<()> {
        let fork_id = match &self.active_fork {
            Some(fork) => fork.fork_id.clone(),
            None => return Err(Error::unknown_branch(branch_id)),
        };
        let branch = self.branch_mut(branch_id)?;
        tag_entry(
            &mut entry,
            &fork_id,
            branch_id,
            branch.label,
            ForkEntryStatus::InProgress,
        );
        branch.absorb_caches(&entry);
        if !options.preserve_prev_html {
            branch.prev_html = entry.response.html.clone();
        }
        branch.history.push(entry);
        Ok(())
    }

    /// Base timeline followed by the named branch's timeline
    pub fn history_for_prompt(&self, branch_id: Option<&str>) -> Result<Vec<HistoryEntry>> {
        let mut entries = copy_entries(&self.history);
        if let Some(id) = branch_id {
            entries.extend(copy_entries(&self.branch(id)?.history));
        }
        Ok(entries)
    }

    /// True until the first entry lands in the branch
    pub fn is_branch_empty(&self, branch_id: &str) -> Result<bool> {
        Ok(self.branch(branch_id)?.history.is_empty())
    }
}

impl SessionStore {
    /// Canvas the next generation edits.
    ///
    /// With a branch id, the branch's own canvas wins when it has one;
    /// otherwise (or for an unknown branch) the base canvas is used, falling
    /// back to the last html entry and finally to an empty string.
    #[must_use]
    pub fn get_prev_html(&self, sid: &str, branch_id: Option<&str>) -> String {
        self.read_session(sid, |record| record.prev_html(branch_id))
            .unwrap_or_default()
    }

    /// Replace the canvas without recording an entry
    pub fn set_prev_html(&self, sid: &str, html: &str, branch_id: Option<&str>) -> Result<()> {
        self.write_session(sid, |record, _| record.set_prev_html(html, branch_id))
    }

    /// Base timeline, most recent `limit` entries when given
    #[must_use]
    pub fn get_history(&self, sid: &str, limit: Option<usize>) -> Vec<HistoryEntry> {
        self.read_session(sid, |record| copy_tail(&record.history, limit))
            .unwrap_or_default()
    }

    /// Isolated timeline of one branch
    pub fn get_branch_history(&self, sid: &str, branch_id: &str) -> Result<Vec<HistoryEntry>> {
        self.read_session(sid, |record| {
            record.branch(branch_id).map(|branch| copy_entries(&branch.history))
        })
        .unwrap_or_else(|| Err(Error::unknown_branch(branch_id)))
    }

    /// Append to the base timeline; fails while a fork is active
    pub fn append_history_entry(
        &self,
        sid: &str,
        entry: HistoryEntry,
        options: AppendOptions,
    ) -> Result<()> {
        let entry_id = entry.id.clone();
        self.write_session(sid, |record, _| record.append_base(entry, options))?;
        debug!(session_id = %sid, entry_id = %entry_id, "Appended history entry");
        Ok(())
    }

    /// Append to a branch, merging its fragment caches
    pub fn append_to_branch_history(
        &self,
        sid: &str,
        branch_id: &str,
        entry: HistoryEntry,
        options: AppendOptions,
    ) -> Result<()> {
        let entry_id = entry.id.clone();
        self.write_session(sid, |record, _| {
            record.append_branch(branch_id, entry, options)
        })?;
        debug!(
            session_id = %sid,
            branch_id = %branch_id,
            entry_id = %entry_id,
            "Appended branch history entry"
        );
        Ok(())
    }

    /// Conversational context for the next generation
    pub fn get_history_for_prompt(
        &self,
        sid: &str,
        branch_id: Option<&str>,
    ) -> Result<Vec<HistoryEntry>> {
        match self.read_session(sid, |record| record.history_for_prompt(branch_id)) {
            Some(result) => result,
            None => match branch_id {
                Some(id) => Err(Error::unknown_branch(id)),
                None => Ok(Vec::new()),
            },
        }
    }

    /// Whether a branch has not received any entry yet
    pub fn is_branch_empty(&self, sid: &str, branch_id: &str) -> Result<bool> {
        self.read_session(sid, |record| record.is_branch_empty(branch_id))
            .unwrap_or_else(|| Err(Error::unknown_branch(branch_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BranchLabel, FragmentCache};

    fn record_with_fork() -> (SessionRecord, String, String) {
        let mut record = SessionRecord::new(0);
        record
            .append_base(HistoryEntry::html("s", "<p>base</p>"), AppendOptions::default())
            .unwrap();
        let handle = record.start_fork(None, "dark", "light", 0).unwrap();
        (record, handle.branch_id_a, handle.branch_id_b)
    }

    #[test]
    fn test_prev_html_falls_back_to_last_html_entry() {
        let mut record = SessionRecord::new(0);
        assert_eq!(record.prev_html(None), "");

        record.history.push(HistoryEntry::html("s", "<p>one</p>"));
        assert_eq!(record.prev_html(None), "<p>one</p>");

        record.prev_html = "<p>canvas</p>".to_string();
        assert_eq!(record.prev_html(None), "<p>canvas</p>");
    }

    #[test]
    fn test_preserve_prev_html() {
        let mut record = SessionRecord::new(0);
        record
            .append_base(HistoryEntry::html("s", "<p>page</p>"), AppendOptions::default())
            .unwrap();
        record
            .append_base(HistoryEntry::html("s", ""), AppendOptions::preserve())
            .unwrap();
        assert_eq!(record.prev_html, "<p>page</p>");
        assert_eq!(record.history.len(), 2);
    }

    #[test]
    fn test_base_append_rejected_during_fork() {
        let (mut record, _, _) = record_with_fork();
        let err = record
            .append_base(HistoryEntry::html("s", "<p>x</p>"), AppendOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "fork_active");
        assert_eq!(record.history.len(), 1);

        let err = record.set_prev_html("<p>x</p>", None).unwrap_err();
        assert_eq!(err.code(), "fork_active");
    }

    #[test]
    fn test_branch_append_tags_and_isolates() {
        let (mut record, a, b) = record_with_fork();
        record
            .append_branch(&a, HistoryEntry::html("s", "<p>A1</p>"), AppendOptions::default())
            .unwrap();

        assert!(!record.is_branch_empty(&a).unwrap());
        assert!(record.is_branch_empty(&b).unwrap());
        assert_eq!(record.prev_html(Some(&a)), "<p>A1</p>");
        assert_eq!(record.prev_html(Some(&b)), "<p>base</p>");
        assert_eq!(record.prev_html(None), "<p>base</p>");

        let info = record.branch(&a).unwrap().history[0].fork_info.clone().unwrap();
        assert_eq!(info.label, BranchLabel::A);
        assert_eq!(info.status, ForkEntryStatus::InProgress);
    }

    #[test]
    fn test_branch_append_merges_caches() {
        let (mut record, a, _) = record_with_fork();
        let mut cache = FragmentCache::new();
        cache.insert("sl-gen-7".to_string(), "<nav></nav>".to_string());
        let entry = HistoryEntry::html("s", "<p>A1</p>").with_component_cache(cache);
        record.append_branch(&a, entry, AppendOptions::default()).unwrap();

        let branch = record.branch(&a).unwrap();
        assert!(branch.component_cache.contains_key("sl-gen-7"));
        assert_eq!(branch.next_component_id, 8);
        assert_eq!(branch.next_style_id, 1);
    }

    #[test]
    fn test_history_for_prompt_concatenates() {
        let (mut record, a, _) = record_with_fork();
        record
            .append_branch(&a, HistoryEntry::html("s", "<p>A1</p>"), AppendOptions::default())
            .unwrap();

        assert_eq!(record.history_for_prompt(None).unwrap().len(), 1);
        let combined = record.history_for_prompt(Some(&a)).unwrap();
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[1].response.html, "<p>A1</p>");
        assert!(record.history_for_prompt(Some("nope")).is_err());
    }

    #[test]
    fn test_unknown_branch_rejected() {
        let mut record = SessionRecord::new(0);
        let err = record
            .append_branch("missing", HistoryEntry::html("s", ""), AppendOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "unknown_branch");
        assert!(record.is_branch_empty("missing").is_err());
    }
}
