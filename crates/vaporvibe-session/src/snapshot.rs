//! Snapshot codec
//!
//! Two independent mechanisms live here:
//!
//! - whole-store snapshots ([`StoreSnapshot`]) carry every record, forks
//!   included, across process restarts;
//! - flat history exports feed the user-facing `history.json` download and
//!   can rebuild the store from such a list.

use crate::codec::copy_sessions;
use crate::error::{Error, Result};
use crate::ledger::last_html;
use crate::store::SessionStore;
use crate::types::{HistoryEntry, SessionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

/// Current whole-store snapshot format
pub const STORE_SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the whole store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    /// `[sessionId, record]` pairs ordered by session id
    pub sessions: Vec<(String, SessionRecord)>,
}

impl StoreSnapshot {
    /// Number of history entries across all sessions, branches excluded
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.sessions.iter().map(|(_, r)| r.history.len()).sum()
    }

    /// Number of sessions with an open fork
    #[must_use]
    pub fn active_fork_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|(_, r)| r.active_fork.is_some())
            .count()
    }

    /// Parse and version-check a serialized snapshot
    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(raw)?;
        if snapshot.version != STORE_SNAPSHOT_VERSION {
            return Err(Error::unsupported_snapshot(format!(
                "store snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

/// What an import kept and dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub expired: usize,
    pub evicted: usize,
}

/// Bring a legacy or partial entry up to shape for `session_id`
pub(crate) fn normalize_entry(mut entry: HistoryEntry, session_id: &str) -> HistoryEntry {
    if entry.id.trim().is_empty() {
        entry.id = Uuid::new_v4().to_string();
    }
    entry.session_id = session_id.to_string();
    if entry.request.method.trim().is_empty() {
        entry.request.method = "GET".to_string();
    }
    if entry.request.path.trim().is_empty() {
        entry.request.path = "/".to_string();
    }
    entry
}

/// Fresh record holding `entries`, canvas taken from the last html entry
fn rebuild_record(entries: Vec<HistoryEntry>, now: u64) -> SessionRecord {
    let prev_html = last_html(&entries)
        .map(|entry| entry.response.html.clone())
        .unwrap_or_default();
    SessionRecord {
        updated_at: now,
        prev_html,
        history: entries,
        ..SessionRecord::default()
    }
}

impl SessionStore {
    /// Copy every record into a snapshot
    #[must_use]
    pub fn export_snapshot(&self) -> StoreSnapshot {
        let sessions = copy_sessions(&self.lock_recovering());
        info!(sessions = sessions.len(), "Exported store snapshot");
        StoreSnapshot {
            version: STORE_SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            sessions,
        }
    }

    /// Replace the store's contents with `snapshot`.
    ///
    /// Records idle for longer than the TTL are dropped first, then capacity
    /// pruning runs over what remains.
    pub fn import_snapshot(&self, snapshot: StoreSnapshot) -> Result<ImportReport> {
        if snapshot.version != STORE_SNAPSHOT_VERSION {
            return Err(Error::unsupported_snapshot(format!(
                "store snapshot version {}",
                snapshot.version
            )));
        }

        let now = self.now_ms();
        let mut sessions = self.lock()?;
        let mut report = ImportReport::default();

        sessions.clear();
        for (sid, record) in snapshot.sessions {
            if self.is_expired(&record, now) {
                report.expired += 1;
                continue;
            }
            sessions.insert(sid, record);
        }
        report.evicted = self.prune(&mut sessions, None);
        report.imported = sessions.len();

        info!(
            imported = report.imported,
            expired = report.expired,
            evicted = report.evicted,
            "Imported store snapshot"
        );
        Ok(report)
    }

    /// Base-timeline entries of every live session, oldest first
    #[must_use]
    pub fn export_history(&self) -> Vec<HistoryEntry> {
        let now = self.now_ms();
        let sessions = self.lock_recovering();
        let mut entries: Vec<HistoryEntry> = sessions
            .values()
            .filter(|record| !self.is_expired(record, now))
            .flat_map(|record| record.history.iter().cloned())
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }

    /// Rebuild the whole store from a flat entry list.
    ///
    /// Entries are regrouped by `session_id` (entries without one are
    /// skipped), ordered by creation time and normalized. Audit trails and
    /// forks are cleared. Returns the number of sessions created.
    pub fn replace_history(&self, entries: Vec<HistoryEntry>) -> Result<usize> {
        let mut grouped: BTreeMap<String, Vec<HistoryEntry>> = BTreeMap::new();
        for entry in entries {
            if entry.session_id.trim().is_empty() {
                continue;
            }
            let sid = entry.session_id.clone();
            grouped
                .entry(sid.clone())
                .or_default()
                .push(normalize_entry(entry, &sid));
        }

        let now = self.now_ms();
        let mut sessions = self.lock()?;
        sessions.clear();
        for (sid, mut group) in grouped {
            group.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            sessions.insert(sid, rebuild_record(group, now));
        }
        let evicted = self.prune(&mut sessions, None);
        let count = sessions.len();

        info!(sessions = count, evicted, "Replaced store history");
        Ok(count)
    }

    /// Replace one session's record with `entries`; other sessions are left
    /// alone. Every entry is reassigned to `sid`.
    pub fn replace_session_history(&self, sid: &str, entries: Vec<HistoryEntry>) -> Result<()> {
        let mut normalized: Vec<HistoryEntry> = entries
            .into_iter()
            .map(|entry| normalize_entry(entry, sid))
            .collect();
        normalized.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let count = normalized.len();

        let now = self.now_ms();
        let mut sessions = self.lock()?;
        sessions.insert(sid.to_string(), rebuild_record(normalized, now));
        self.prune(&mut sessions, Some(sid));

        info!(session_id = %sid, entries = count, "Replaced session history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::SessionStoreConfig;
    use crate::types::{AppendOptions, EntryKind, RestMutationRecord};
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn store_at(clock: &Arc<ManualClock>, ttl_secs: u64, capacity: usize) -> SessionStore {
        SessionStore::with_clock(
            SessionStoreConfig {
                ttl: Duration::from_secs(ttl_secs),
                capacity,
            },
            clock.clone(),
        )
    }

    fn entry_at(sid: &str, html: &str, secs: i64) -> HistoryEntry {
        let mut entry = HistoryEntry::html(sid, html);
        entry.created_at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        entry
    }

    #[test]
    fn test_snapshot_keeps_forks() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = store_at(&clock, 60, 10);
        store
            .append_history_entry("s1", HistoryEntry::html("s1", "<p>1</p>"), AppendOptions::default())
            .unwrap();
        let handle = store.start_fork("s1", None, "a", "b").unwrap();

        let raw = serde_json::to_string(&store.export_snapshot()).unwrap();
        let snapshot = StoreSnapshot::from_json(&raw).unwrap();
        assert_eq!(snapshot.active_fork_count(), 1);
        assert_eq!(snapshot.entry_count(), 1);

        let restored = store_at(&clock, 60, 10);
        let report = restored.import_snapshot(snapshot).unwrap();
        assert_eq!(report.imported, 1);
        assert!(restored.is_fork_active("s1"));
        assert!(restored.is_branch_empty("s1", &handle.branch_id_b).unwrap());
    }

    #[test]
    fn test_import_drops_expired_records() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_at(&clock, 10, 10);
        store
            .append_mutation_record("old", RestMutationRecord::new("POST", "/x"), None)
            .unwrap();
        clock.advance(8_000);
        store
            .append_mutation_record("new", RestMutationRecord::new("POST", "/y"), None)
            .unwrap();
        let snapshot = store.export_snapshot();

        clock.advance(5_000);
        let restored = store_at(&clock, 10, 10);
        let report = restored.import_snapshot(snapshot).unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.imported, 1);
        assert!(restored.contains("new"));
        assert!(!restored.contains("old"));
    }

    #[test]
    fn test_import_prunes_to_capacity() {
        let clock = Arc::new(ManualClock::new(0));
        let big = store_at(&clock, 600, 10);
        for sid in ["a", "b", "c"] {
            clock.advance(1);
            big.append_mutation_record(sid, RestMutationRecord::new("POST", "/x"), None)
                .unwrap();
        }
        let small = store_at(&clock, 600, 2);
        let report = small.import_snapshot(big.export_snapshot()).unwrap();
        assert_eq!(report.evicted, 1);
        assert!(!small.contains("a"));
        assert!(small.contains("c"));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let store = SessionStore::default();
        let mut snapshot = store.export_snapshot();
        snapshot.version = 7;
        let err = store.import_snapshot(snapshot).unwrap_err();
        assert_eq!(err.code(), "unsupported_snapshot");
        assert!(StoreSnapshot::from_json("{\"version\":2,\"exportedAt\":\"2025-01-01T00:00:00Z\",\"sessions\":[]}").is_err());
    }

    #[test]
    fn test_export_history_is_chronological() {
        let store = SessionStore::default();
        store
            .append_history_entry("s2", entry_at("s2", "<p>late</p>", 20), AppendOptions::default())
            .unwrap();
        store
            .append_history_entry("s1", entry_at("s1", "<p>early</p>", 10), AppendOptions::default())
            .unwrap();
        let html: Vec<String> = store
            .export_history()
            .into_iter()
            .map(|e| e.response.html)
            .collect();
        assert_eq!(html, vec!["<p>early</p>", "<p>late</p>"]);
    }

    #[test]
    fn test_replace_history_regroups_and_resets() {
        let store = SessionStore::default();
        store
            .append_mutation_record("stale", RestMutationRecord::new("POST", "/x"), None)
            .unwrap();

        let mut legacy = entry_at("s1", "", 5);
        legacy.id.clear();
        legacy.request.method.clear();
        legacy.entry_kind = EntryKind::RestMutation;
        let entries = vec![
            entry_at("s1", "<p>second</p>", 2),
            entry_at("s1", "<p>first</p>", 1),
            legacy,
            entry_at("s2", "<p>other</p>", 3),
            entry_at("", "<p>orphan</p>", 4),
        ];

        assert_eq!(store.replace_history(entries).unwrap(), 2);
        assert!(!store.contains("stale"));

        let s1 = store.get_history("s1", None);
        assert_eq!(s1.len(), 3);
        assert_eq!(s1[0].response.html, "<p>first</p>");
        assert!(!s1[2].id.is_empty());
        assert_eq!(s1[2].request.method, "GET");
        // the rest entry is not html, so the canvas comes from "second"
        assert_eq!(store.get_prev_html("s1", None), "<p>second</p>");
        assert!(store.get_rest_state("s1", None, None).unwrap().mutations.is_empty());
    }

    #[test]
    fn test_replace_session_history_only_touches_one_session() {
        let store = SessionStore::default();
        store
            .append_history_entry("keep", HistoryEntry::html("keep", "<p>k</p>"), AppendOptions::default())
            .unwrap();
        store
            .append_history_entry("s", HistoryEntry::html("s", "<p>old</p>"), AppendOptions::default())
            .unwrap();
        store.start_fork("s", None, "a", "b").unwrap();

        store
            .replace_session_history("s", vec![entry_at("elsewhere", "<p>new</p>", 1)])
            .unwrap();

        let history = store.get_history("s", None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session_id, "s");
        assert!(!store.is_fork_active("s"));
        assert_eq!(store.get_prev_html("s", None), "<p>new</p>");
        assert_eq!(store.get_history("keep", None).len(), 1);
    }
}
