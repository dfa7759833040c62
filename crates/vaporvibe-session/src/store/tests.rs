use super::*;
use crate::clock::ManualClock;
use crate::types::{AppendOptions, HistoryEntry, RestMutationRecord};

fn store(clock: &Arc<ManualClock>, ttl_ms: u64, capacity: usize) -> SessionStore {
    SessionStore::with_clock(
        SessionStoreConfig {
            ttl: Duration::from_millis(ttl_ms),
            capacity,
        },
        clock.clone(),
    )
}

#[test]
fn test_issues_id_without_cookie() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 1_000, 10);

    let identity = store.get_or_create_session_id(None).unwrap();
    assert!(identity.issued);
    assert_eq!(identity.session_id.len(), 32);
    assert!(identity
        .session_id
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    assert!(store.contains(&identity.session_id));

    let blank = store.get_or_create_session_id(Some("   ")).unwrap();
    assert!(blank.issued);
    assert_ne!(blank.session_id, identity.session_id);
}

#[test]
fn test_reuses_live_cookie() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 1_000, 10);
    let first = store.get_or_create_session_id(None).unwrap();

    clock.advance(500);
    let again = store
        .get_or_create_session_id(Some(&first.session_id))
        .unwrap();
    assert!(!again.issued);
    assert_eq!(again.session_id, first.session_id);
}

#[test]
fn test_unknown_cookie_gets_new_id() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 1_000, 10);
    let identity = store.get_or_create_session_id(Some("forged")).unwrap();
    assert!(identity.issued);
    assert_ne!(identity.session_id, "forged");
    assert!(!store.contains("forged"));
}

#[test]
fn test_touch_extends_lifetime() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 1_000, 10);
    let sid = store.get_or_create_session_id(None).unwrap().session_id;

    for _ in 0..5 {
        clock.advance(800);
        let identity = store.get_or_create_session_id(Some(&sid)).unwrap();
        assert!(!identity.issued);
    }
}

#[test]
fn test_expiry_boundary_is_exclusive() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 1_000, 10);
    store
        .append_history_entry("s", HistoryEntry::html("s", "<p></p>"), AppendOptions::default())
        .unwrap();

    clock.advance(1_000);
    assert!(store.contains("s"));
    clock.advance(1);
    assert!(!store.contains("s"));
    assert!(store.get_history("s", None).is_empty());
}

#[test]
fn test_reads_do_not_create_records() {
    let store = SessionStore::default();
    assert_eq!(store.get_prev_html("nobody", None), "");
    assert!(store.get_history("nobody", None).is_empty());
    assert!(!store.is_fork_active("nobody"));
    assert!(store.is_empty());
}

#[test]
fn test_failed_write_leaves_no_record() {
    let store = SessionStore::default();
    let err = store.start_fork("ghost", None, "a", "b").unwrap_err();
    assert_eq!(err.code(), "no_fork_origin");
    assert!(!store.contains("ghost"));
    assert!(store.is_empty());
}

#[test]
fn test_capacity_evicts_least_recent() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 60_000, 2);
    for sid in ["s1", "s2", "s3"] {
        clock.advance(10);
        store
            .append_mutation_record(sid, RestMutationRecord::new("POST", "/x"), None)
            .unwrap();
    }
    assert_eq!(store.len(), 2);
    assert!(!store.contains("s1"));
    assert!(store.contains("s2"));
    assert!(store.contains("s3"));
}

#[test]
fn test_touch_protects_from_eviction() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 60_000, 2);
    let a = store.get_or_create_session_id(None).unwrap().session_id;
    clock.advance(10);
    let b = store.get_or_create_session_id(None).unwrap().session_id;
    clock.advance(10);
    store.get_or_create_session_id(Some(&a)).unwrap();
    clock.advance(10);
    let c = store.get_or_create_session_id(None).unwrap().session_id;

    assert!(store.contains(&a));
    assert!(!store.contains(&b));
    assert!(store.contains(&c));
}

#[test]
fn test_capacity_clamped_to_one() {
    let store = SessionStore::new(SessionStoreConfig {
        ttl: DEFAULT_TTL,
        capacity: 0,
    });
    assert_eq!(store.capacity(), 1);
    let sid = store.get_or_create_session_id(None).unwrap().session_id;
    assert!(store.contains(&sid));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_unbounded_ttl() {
    let clock = Arc::new(ManualClock::new(0));
    let store = SessionStore::with_clock(
        SessionStoreConfig {
            ttl: Duration::MAX,
            capacity: 10,
        },
        clock.clone(),
    );
    assert_eq!(store.ttl_ms(), u64::MAX);
    let sid = store.get_or_create_session_id(None).unwrap().session_id;
    clock.set(u64::MAX);
    assert!(store.contains(&sid));
}

#[test]
fn test_cookie_max_age_matches_ttl() {
    let store = SessionStore::default();
    assert_eq!(store.cookie_max_age_secs(), 86_400);
}

#[test]
fn test_session_summaries_most_recent_first() {
    let clock = Arc::new(ManualClock::new(0));
    let store = store(&clock, 60_000, 10);
    store
        .append_history_entry("old", HistoryEntry::html("old", "<p></p>"), AppendOptions::default())
        .unwrap();
    clock.advance(5);
    store
        .append_history_entry("new", HistoryEntry::html("new", "<p></p>"), AppendOptions::default())
        .unwrap();
    store.start_fork("new", None, "a", "b").unwrap();

    let summaries = store.session_summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].session_id, "new");
    assert!(summaries[0].has_active_fork);
    assert_eq!(summaries[1].history_count, 1);
    assert!(!summaries[1].has_active_fork);
}
