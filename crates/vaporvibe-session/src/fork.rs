//! Fork state machine
//!
//! A fork splits a session at one html entry into two labeled branches that
//! evolve independently. It is `active` until resolved (one branch merged
//! into the base timeline) or discarded (both abandoned); either way it is
//! then detached from the session. One active fork per session at most.

use crate::audit::{keep_recent, REST_RECORD_LIMIT};
use crate::cache_ids::{next_id_after, COMPONENT_ID_PREFIX, STYLE_ID_PREFIX};
use crate::codec::tag_entry;
use crate::error::{Error, Result};
use crate::ledger::last_html;
use crate::store::SessionStore;
use crate::types::{
    BranchLabel, BranchState, ForkEntryStatus, ForkState, ForkStatus, HistoryEntry, RestState,
    SessionRecord,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Ids handed back when a fork starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkHandle {
    pub fork_id: String,
    pub branch_id_a: String,
    pub branch_id_b: String,
}

/// What a resolve or discard did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkOutcome {
    pub fork_id: String,
    /// Merged branch, `None` for a discard
    pub chosen_branch_id: Option<String>,
    /// Entries appended to the base timeline
    pub merged_entries: usize,
    /// Entries tagged discarded and dropped with the fork
    pub discarded_entries: usize,
}

/// Read-only view of one branch for the A/B comparison UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    pub branch_id: String,
    pub label: BranchLabel,
    pub instructions: String,
    pub entry_count: usize,
}

/// Read-only view of an active fork
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkSummary {
    pub session_id: String,
    pub fork_id: String,
    pub origin_entry_id: String,
    pub created_at: u64,
    /// Ordered A then B
    pub branches: Vec<BranchSummary>,
}

impl BranchState {
    /// Branch diverging from `origin`, inheriting its canvas and a copy of
    /// its fragment caches
    fn inherit(label: BranchLabel, instructions: &str, origin: &HistoryEntry, prev_html: &str) -> Self {
        let component_cache = origin.component_cache.clone().unwrap_or_default();
        let style_cache = origin.style_cache.clone().unwrap_or_default();
        Self {
            branch_id: Uuid::new_v4().to_string(),
            label,
            instructions: instructions.to_string(),
            history: Vec::new(),
            rest: RestState::default(),
            prev_html: prev_html.to_string(),
            next_component_id: next_id_after(&component_cache, COMPONENT_ID_PREFIX),
            next_style_id: next_id_after(&style_cache, STYLE_ID_PREFIX),
            component_cache,
            style_cache,
        }
    }

    fn summary(&self) -> BranchSummary {
        BranchSummary {
            branch_id: self.branch_id.clone(),
            label: self.label,
            instructions: self.instructions.clone(),
            entry_count: self.history.len(),
        }
    }

    /// Tag every entry with `status`; returns how many were tagged
    fn tag_all(&mut self, fork_id: &str, status: ForkEntryStatus) -> usize {
        let (branch_id, label) = (self.branch_id.clone(), self.label);
        for entry in &mut self.history {
            tag_entry(entry, fork_id, &branch_id, label, status);
        }
        self.history.len()
    }
}

impl ForkState {
    /// Summary projection, branches ordered by label
    #[must_use]
    pub fn summary(&self, session_id: &str) -> ForkSummary {
        let mut branches: Vec<BranchSummary> =
            self.branches.values().map(BranchState::summary).collect();
        branches.sort_by_key(|branch| branch.label);
        ForkSummary {
            session_id: session_id.to_string(),
            fork_id: self.fork_id.clone(),
            origin_entry_id: self.origin_entry_id.clone(),
            created_at: self.created_at,
            branches,
        }
    }
}

impl SessionRecord {
    /// Whether a fork is open
    #[must_use]
    pub fn is_fork_active(&self) -> bool {
        self.active_fork
            .as_ref()
            .is_some_and(|fork| fork.status == ForkStatus::Active)
    }

    /// Open a fork at `base_entry_id` (or the latest html entry)
    pub fn start_fork(
        &mut self,
        base_entry_id: Option<&str>,
        instructions_a: &str,
        instructions_b: &str,
        now_ms: u64,
    ) -> Result<ForkHandle> {
        if let Some(fork) = &self.active_fork {
            return Err(Error::ForkAlreadyActive {
                fork_id: fork.fork_id.clone(),
            });
        }

        let origin = base_entry_id
            .and_then(|id| self.history.iter().find(|entry| entry.id == id))
            .or_else(|| last_html(&self.history))
            .ok_or(Error::NoForkOrigin)?;

        let prev_html = if origin.response.html.is_empty() {
            self.prev_html.as_str()
        } else {
            origin.response.html.as_str()
        };

        let branch_a = BranchState::inherit(BranchLabel::A, instructions_a, origin, prev_html);
        let branch_b = BranchState::inherit(BranchLabel::B, instructions_b, origin, prev_html);
        let handle = ForkHandle {
            fork_id: Uuid::new_v4().to_string(),
            branch_id_a: branch_a.branch_id.clone(),
            branch_id_b: branch_b.branch_id.clone(),
        };

        let mut branches = HashMap::with_capacity(2);
        branches.insert(branch_a.branch_id.clone(), branch_a);
        branches.insert(branch_b.branch_id.clone(), branch_b);

        self.active_fork = Some(ForkState {
            fork_id: handle.fork_id.clone(),
            origin_entry_id: origin.id.clone(),
            status: ForkStatus::Active,
            branches,
            created_at: now_ms,
        });
        Ok(handle)
    }

    /// Detach the active fork if its id matches `fork_id` (any id when
    /// `None`), leaving it in place on mismatch.
    fn take_fork(&mut self, fork_id: Option<&str>) -> Result<Option<ForkState>> {
        match self.active_fork.take() {
            None => Ok(None),
            Some(fork) => match fork_id {
                Some(requested) if requested != fork.fork_id => {
                    let active = fork.fork_id.clone();
                    self.active_fork = Some(fork);
                    Err(Error::ForkMismatch {
                        requested: requested.to_string(),
                        active,
                    })
                }
                _ => Ok(Some(fork)),
            },
        }
    }

    /// Merge `chosen_branch_id` into the base timeline and drop the fork
    pub fn resolve_fork(&mut self, fork_id: &str, chosen_branch_id: &str) -> Result<ForkOutcome> {
        let mut fork = self.take_fork(Some(fork_id))?.ok_or(Error::NoActiveFork)?;
        let Some(chosen) = fork.branches.remove(chosen_branch_id) else {
            self.active_fork = Some(fork);
            return Err(Error::unknown_branch(chosen_branch_id));
        };

        if let Some(origin_idx) = self
            .history
            .iter()
            .position(|entry| entry.id == fork.origin_entry_id)
        {
            self.history.truncate(origin_idx + 1);
        }

        let BranchState {
            branch_id,
            label,
            history,
            rest,
            prev_html,
            ..
        } = chosen;
        let merged_entries = history.len();
        for mut entry in history {
            tag_entry(&mut entry, &fork.fork_id, &branch_id, label, ForkEntryStatus::Chosen);
            self.history.push(entry);
        }
        self.prev_html = prev_html;

        self.rest.mutations.extend(rest.mutations);
        keep_recent(&mut self.rest.mutations, REST_RECORD_LIMIT);
        self.rest.queries.extend(rest.queries);
        keep_recent(&mut self.rest.queries, REST_RECORD_LIMIT);

        let fork_id = fork.fork_id.clone();
        let discarded_entries = fork
            .branches
            .values_mut()
            .map(|branch| branch.tag_all(&fork_id, ForkEntryStatus::Discarded))
            .sum();
        fork.status = ForkStatus::Resolved;

        Ok(ForkOutcome {
            fork_id,
            chosen_branch_id: Some(branch_id),
            merged_entries,
            discarded_entries,
        })
    }

    /// Abandon both branches; base timeline and canvas stay as they were
    pub fn discard_fork(&mut self, fork_id: Option<&str>) -> Result<Option<ForkOutcome>> {
        let Some(mut fork) = self.take_fork(fork_id)? else {
            return Ok(None);
        };
        let id = fork.fork_id.clone();
        let discarded_entries = fork
            .branches
            .values_mut()
            .map(|branch| branch.tag_all(&id, ForkEntryStatus::Discarded))
            .sum();
        fork.status = ForkStatus::Resolved;

        Ok(Some(ForkOutcome {
            fork_id: id,
            chosen_branch_id: None,
            merged_entries: 0,
            discarded_entries,
        }))
    }
}

impl SessionStore {
    /// Split the session into branches A and B.
    ///
    /// Fails if a fork is already active or no html entry can serve as the
    /// origin. `base_entry_id` falls back to the latest html entry when it is
    /// absent or unknown.
    pub fn start_fork(
        &self,
        sid: &str,
        base_entry_id: Option<&str>,
        instructions_a: &str,
        instructions_b: &str,
    ) -> Result<ForkHandle> {
        let handle = self.write_session(sid, |record, now| {
            record.start_fork(base_entry_id, instructions_a, instructions_b, now)
        })?;
        info!(
            session_id = %sid,
            fork_id = %handle.fork_id,
            branch_a = %handle.branch_id_a,
            branch_b = %handle.branch_id_b,
            "Fork started"
        );
        Ok(handle)
    }

    /// Keep `chosen_branch_id`, discard the other branch
    pub fn resolve_fork(&self, sid: &str, fork_id: &str, chosen_branch_id: &str) -> Result<ForkOutcome> {
        let outcome = self.write_session(sid, |record, _| {
            record.resolve_fork(fork_id, chosen_branch_id)
        })?;
        info!(
            session_id = %sid,
            fork_id = %outcome.fork_id,
            chosen_branch = %chosen_branch_id,
            merged = outcome.merged_entries,
            discarded = outcome.discarded_entries,
            "Fork resolved"
        );
        Ok(outcome)
    }

    /// Abandon the active fork; a no-op (`Ok(None)`) when there is none
    pub fn discard_fork(&self, sid: &str, fork_id: Option<&str>) -> Result<Option<ForkOutcome>> {
        let outcome = self
            .write_existing(sid, |record, _| record.discard_fork(fork_id))?
            .flatten();
        if let Some(outcome) = &outcome {
            info!(
                session_id = %sid,
                fork_id = %outcome.fork_id,
                discarded = outcome.discarded_entries,
                "Fork discarded"
            );
        }
        Ok(outcome)
    }

    /// Whether `sid` has an open fork
    #[must_use]
    pub fn is_fork_active(&self, sid: &str) -> bool {
        self.read_session(sid, SessionRecord::is_fork_active)
            .unwrap_or(false)
    }

    /// Whether any live session has an open fork
    #[must_use]
    pub fn has_any_active_fork(&self) -> bool {
        let now = self.now_ms();
        self.lock_recovering()
            .values()
            .any(|record| !self.is_expired(record, now) && record.is_fork_active())
    }

    /// Summary of the active fork of `sid`
    #[must_use]
    pub fn get_active_fork_summary(&self, sid: &str) -> Option<ForkSummary> {
        self.read_session(sid, |record| {
            record.active_fork.as_ref().map(|fork| fork.summary(sid))
        })
        .flatten()
    }

    /// Summaries of every active fork across live sessions, oldest first
    #[must_use]
    pub fn get_active_fork_summaries(&self) -> Vec<ForkSummary> {
        let now = self.now_ms();
        let sessions = self.lock_recovering();
        let mut summaries: Vec<ForkSummary> = sessions
            .iter()
            .filter(|(_, record)| !self.is_expired(record, now))
            .filter_map(|(sid, record)| record.active_fork.as_ref().map(|fork| fork.summary(sid)))
            .collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }
}

#[cfg(test)]
mod tests;
