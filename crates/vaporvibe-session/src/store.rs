//! Session lifecycle
//!
//! `SessionStore` owns every session record behind one lock. Expiry is lazy:
//! a record older than the TTL is dropped the next time anything looks it
//! up. Capacity is enforced on every write by evicting the least recently
//! touched sessions.

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::types::SessionRecord;
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of concurrently tracked sessions
pub const DEFAULT_CAPACITY: usize = 200;

/// Default inactivity timeout
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Store construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStoreConfig {
    /// Inactivity timeout; `Duration::MAX` never expires
    pub ttl: Duration,
    /// Maximum number of tracked sessions (at least 1)
    pub capacity: usize,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Outcome of resolving the session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    /// Session id to use for this request
    pub session_id: String,
    /// Whether the id was freshly minted and must be sent back as a cookie
    pub issued: bool,
}

/// Admin listing row for one live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub updated_at: u64,
    pub history_count: usize,
    pub has_active_fork: bool,
}

pub(crate) type SessionMap = HashMap<String, SessionRecord>;

/// In-memory, TTL- and capacity-bounded session and fork store.
pub struct SessionStore {
    sessions: Mutex<SessionMap>,
    ttl_ms: u64,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl_ms", &self.ttl_ms)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl SessionStore {
    /// Create a store on the system clock
    #[must_use]
    pub fn new(config: SessionStoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store on a caller-supplied clock
    #[must_use]
    pub fn with_clock(config: SessionStoreConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl_ms = u64::try_from(config.ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_ms,
            capacity: config.capacity.max(1),
            clock,
        }
    }

    /// Inactivity timeout in milliseconds
    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Maximum number of tracked sessions
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cookie `Max-Age` matching the TTL, in whole seconds
    #[must_use]
    pub fn cookie_max_age_secs(&self) -> u64 {
        self.ttl_ms / 1000
    }

    /// Resolve the session id carried by the request cookie.
    ///
    /// A missing, unknown or expired id is replaced by a fresh random one
    /// (`issued = true`); the caller must then set it as a cookie. Either way
    /// the record is touched and capacity pruning runs.
    pub fn get_or_create_session_id(&self, cookie_value: Option<&str>) -> Result<SessionIdentity> {
        let now = self.now_ms();
        let mut sessions = self.lock()?;

        let existing = cookie_value
            .map(str::trim)
            .filter(|sid| !sid.is_empty())
            .filter(|sid| self.live_record(&mut sessions, sid, now).is_some())
            .map(str::to_string);

        let (session_id, issued) = match existing {
            Some(sid) => (sid, false),
            None => {
                let sid = create_session_id();
                debug!(session_id = %sid, "Issued new session id");
                (sid, true)
            }
        };

        self.ensure_record(&mut sessions, &session_id, now).0.updated_at = now;
        self.prune(&mut sessions, Some(&session_id));

        Ok(SessionIdentity { session_id, issued })
    }

    /// Number of tracked sessions, expired ones included until next access
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_recovering().len()
    }

    /// Whether no sessions are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live (non-expired) record exists for `sid`
    #[must_use]
    pub fn contains(&self, sid: &str) -> bool {
        let now = self.now_ms();
        let mut sessions = self.lock_recovering();
        self.live_record(&mut sessions, sid, now).is_some()
    }

    /// One summary per live session, most recently touched first
    #[must_use]
    pub fn session_summaries(&self) -> Vec<SessionSummary> {
        let now = self.now_ms();
        let sessions = self.lock_recovering();
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .filter(|(_, record)| !self.is_expired(record, now))
            .map(|(sid, record)| SessionSummary {
                session_id: sid.clone(),
                updated_at: record.updated_at,
                history_count: record.history.len(),
                has_active_fork: record.active_fork.is_some(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    // ── internals shared by the ledger, fork and snapshot modules ─────────

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, SessionMap>> {
        self.sessions
            .lock()
            .map_err(|e| Error::Internal(format!("Lock poisoned: {}", e)))
    }

    /// Lock for read-only projections; a poisoned map is still readable.
    pub(crate) fn lock_recovering(&self) -> MutexGuard<'_, SessionMap> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn is_expired(&self, record: &SessionRecord, now: u64) -> bool {
        now.saturating_sub(record.updated_at) > self.ttl_ms
    }

    /// Drop `sid` if its record outlived the TTL. Returns whether it did.
    pub(crate) fn expire_if_stale(&self, sessions: &mut SessionMap, sid: &str, now: u64) -> bool {
        let expired = sessions
            .get(sid)
            .is_some_and(|record| self.is_expired(record, now));
        if expired {
            sessions.remove(sid);
            debug!(session_id = %sid, "Session expired");
        }
        expired
    }

    pub(crate) fn live_record<'a>(
        &self,
        sessions: &'a mut SessionMap,
        sid: &str,
        now: u64,
    ) -> Option<&'a mut SessionRecord> {
        self.expire_if_stale(sessions, sid, now);
        sessions.get_mut(sid)
    }

    /// Live record for `sid`, created empty when absent. The flag reports
    /// whether it was created by this call.
    pub(crate) fn ensure_record<'a>(
        &self,
        sessions: &'a mut SessionMap,
        sid: &str,
        now: u64,
    ) -> (&'a mut SessionRecord, bool) {
        self.expire_if_stale(sessions, sid, now);
        let created = !sessions.contains_key(sid);
        let record = sessions
            .entry(sid.to_string())
            .or_insert_with(|| SessionRecord::new(now));
        (record, created)
    }

    /// Evict least recently touched sessions until within capacity.
    /// `keep` is never evicted.
    pub(crate) fn prune(&self, sessions: &mut SessionMap, keep: Option<&str>) -> usize {
        if sessions.len() <= self.capacity {
            return 0;
        }
        let mut candidates: Vec<(String, u64)> = sessions
            .iter()
            .filter(|(sid, _)| Some(sid.as_str()) != keep)
            .map(|(sid, record)| (sid.clone(), record.updated_at))
            .collect();
        candidates.sort_by_key(|(_, updated_at)| *updated_at);

        let excess = sessions.len() - self.capacity;
        let mut evicted = 0;
        for (sid, _) in candidates.into_iter().take(excess) {
            sessions.remove(&sid);
            evicted += 1;
            warn!(session_id = %sid, "Evicted session over capacity");
        }
        evicted
    }

    /// Run one mutating operation on `sid` under the lock.
    ///
    /// The record is created if needed, touched and the store pruned only
    /// when `op` succeeds; a record created for a failed call is removed.
    pub(crate) fn write_session<T>(
        &self,
        sid: &str,
        op: impl FnOnce(&mut SessionRecord, u64) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut sessions = self.lock()?;
        let (record, created) = self.ensure_record(&mut sessions, sid, now);
        match op(record, now) {
            Ok(value) => {
                record.updated_at = now;
                self.prune(&mut sessions, Some(sid));
                Ok(value)
            }
            Err(err) => {
                if created {
                    sessions.remove(sid);
                }
                debug!(session_id = %sid, error = %err, "Session operation rejected");
                Err(err)
            }
        }
    }

    /// Like `write_session`, but only on a live record: `None` when `sid`
    /// is unknown or expired, and nothing is created.
    pub(crate) fn write_existing<T>(
        &self,
        sid: &str,
        op: impl FnOnce(&mut SessionRecord, u64) -> Result<T>,
    ) -> Result<Option<T>> {
        let now = self.now_ms();
        let mut sessions = self.lock()?;
        let Some(record) = self.live_record(&mut sessions, sid, now) else {
            return Ok(None);
        };
        let value = op(record, now).inspect_err(|err| {
            debug!(session_id = %sid, error = %err, "Session operation rejected");
        })?;
        record.updated_at = now;
        self.prune(&mut sessions, Some(sid));
        Ok(Some(value))
    }

    /// Run a read-only projection on the live record for `sid`, if any.
    pub(crate) fn read_session<T>(&self, sid: &str, op: impl FnOnce(&SessionRecord) -> T) -> Option<T> {
        let now = self.now_ms();
        let mut sessions = self.lock_recovering();
        self.live_record(&mut sessions, sid, now).map(|record| op(record))
    }
}

/// 128 random bits, hex encoded
fn create_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests;
