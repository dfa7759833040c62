//! Record codec
//!
//! Value-copy and serialization primitives shared by every mutating and
//! snapshotting path. Live state is never handed out by reference: readers get
//! copies produced here, and snapshots are built from copies.

use crate::types::{BranchLabel, ForkEntryStatus, ForkInfo, HistoryEntry, SessionRecord};
use std::collections::HashMap;

/// Serialize the fork branch map as `[[branchId, branch], ...]` pairs,
/// sorted by label so snapshots are stable.
pub mod branch_pairs {
    use crate::types::BranchState;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S>(
        branches: &HashMap<String, BranchState>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut pairs: Vec<(&String, &BranchState)> = branches.iter().collect();
        pairs.sort_by_key(|(_, branch)| branch.label);
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, BranchState>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(String, BranchState)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Copy a slice of entries out of live state.
#[must_use]
pub fn copy_entries(entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    entries.to_vec()
}

/// Copy the most recent `limit` entries (all when `limit` is `None` or zero).
#[must_use]
pub fn copy_tail(entries: &[HistoryEntry], limit: Option<usize>) -> Vec<HistoryEntry> {
    match limit {
        Some(limit) if limit > 0 && limit < entries.len() => {
            copy_entries(&entries[entries.len() - limit..])
        }
        _ => copy_entries(entries),
    }
}

/// Copy every session record, ordered by session id.
#[must_use]
pub fn copy_sessions(sessions: &HashMap<String, SessionRecord>) -> Vec<(String, SessionRecord)> {
    let mut pairs: Vec<(String, SessionRecord)> = sessions
        .iter()
        .map(|(sid, record)| (sid.clone(), record.clone()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

/// Set the fork disposition on an entry, keeping any provenance it already
/// carries and synthesizing it otherwise.
pub fn tag_entry(
    entry: &mut HistoryEntry,
    fork_id: &str,
    branch_id: &str,
    label: BranchLabel,
    status: ForkEntryStatus,
) {
    match entry.fork_info.as_mut() {
        Some(info) => info.status = status,
        None => {
            entry.fork_info = Some(ForkInfo {
                fork_id: fork_id.to_string(),
                branch_id: branch_id.to_string(),
                label,
                status,
            });
        }
    }
}
