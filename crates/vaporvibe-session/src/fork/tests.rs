use super::*;
use crate::types::{AppendOptions, FragmentCache, RestMutationRecord};

fn cache(keys: &[&str]) -> FragmentCache {
    keys.iter()
        .map(|k| ((*k).to_string(), "<div></div>".to_string()))
        .collect()
}

fn seeded(sid: &str) -> (SessionStore, String) {
    let store = SessionStore::default();
    let first = HistoryEntry::html(sid, "<p>one</p>");
    let origin_id = first.id.clone();
    store
        .append_history_entry(sid, first, AppendOptions::default())
        .unwrap();
    store
        .append_history_entry(sid, HistoryEntry::html(sid, "<p>two</p>"), AppendOptions::default())
        .unwrap();
    (store, origin_id)
}

#[test]
fn test_start_fork_at_latest_html_entry() {
    let (store, _) = seeded("s");
    let handle = store.start_fork("s", None, "dark", "light").unwrap();
    assert!(store.is_fork_active("s"));
    assert_ne!(handle.branch_id_a, handle.branch_id_b);

    let summary = store.get_active_fork_summary("s").unwrap();
    assert_eq!(summary.fork_id, handle.fork_id);
    assert_eq!(summary.origin_entry_id, store.get_history("s", None)[1].id);
    assert_eq!(summary.branches[0].label, BranchLabel::A);
    assert_eq!(summary.branches[0].instructions, "dark");
    assert_eq!(summary.branches[1].instructions, "light");
    assert_eq!(store.get_prev_html("s", Some(&handle.branch_id_b)), "<p>two</p>");
}

#[test]
fn test_start_fork_at_named_entry() {
    let (store, origin_id) = seeded("s");
    let handle = store.start_fork("s", Some(&origin_id), "a", "b").unwrap();
    assert_eq!(
        store.get_prev_html("s", Some(&handle.branch_id_a)),
        "<p>one</p>"
    );

    let (store, _) = seeded("t");
    let summary_origin = {
        store.start_fork("t", Some("missing"), "a", "b").unwrap();
        store.get_active_fork_summary("t").unwrap().origin_entry_id
    };
    assert_eq!(summary_origin, store.get_history("t", None)[1].id);
}

#[test]
fn test_second_fork_rejected() {
    let (store, _) = seeded("s");
    let handle = store.start_fork("s", None, "a", "b").unwrap();
    let err = store.start_fork("s", None, "c", "d").unwrap_err();
    assert_eq!(err.code(), "fork_already_active");
    assert_eq!(store.get_active_fork_summary("s").unwrap().fork_id, handle.fork_id);
}

#[test]
fn test_branches_inherit_cache_counters() {
    let store = SessionStore::default();
    let origin = HistoryEntry::html("s", "<p></p>")
        .with_component_cache(cache(&["sl-gen-3", "sl-gen-1"]))
        .with_style_cache(cache(&["sl-style-5"]));
    store
        .append_history_entry("s", origin, AppendOptions::default())
        .unwrap();

    let mut record = SessionRecord::new(0);
    record.history = store.get_history("s", None);
    let handle = record.start_fork(None, "a", "b", 0).unwrap();
    for id in [&handle.branch_id_a, &handle.branch_id_b] {
        let branch = record.branch(id).unwrap();
        assert_eq!(branch.next_component_id, 4);
        assert_eq!(branch.next_style_id, 6);
        assert!(branch.component_cache.contains_key("sl-gen-3"));
    }
}

#[test]
fn test_branch_caches_are_independent() {
    let mut record = SessionRecord::new(0);
    record.history.push(
        HistoryEntry::html("s", "<p></p>").with_component_cache(cache(&["sl-gen-1"])),
    );
    let handle = record.start_fork(None, "a", "b", 0).unwrap();
    record
        .append_branch(
            &handle.branch_id_a,
            HistoryEntry::html("s", "<p>A</p>").with_component_cache(cache(&["sl-gen-9"])),
            AppendOptions::default(),
        )
        .unwrap();

    assert_eq!(record.branch(&handle.branch_id_a).unwrap().next_component_id, 10);
    let b = record.branch(&handle.branch_id_b).unwrap();
    assert_eq!(b.next_component_id, 2);
    assert!(!b.component_cache.contains_key("sl-gen-9"));
    assert!(record.history[0]
        .component_cache
        .as_ref()
        .is_some_and(|c| !c.contains_key("sl-gen-9")));
}

#[test]
fn test_resolve_merges_chosen_branch() {
    let (store, origin_id) = seeded("s");
    let handle = store.start_fork("s", Some(&origin_id), "a", "b").unwrap();
    store
        .append_to_branch_history(
            "s",
            &handle.branch_id_b,
            HistoryEntry::html("s", "<p>B1</p>"),
            AppendOptions::default(),
        )
        .unwrap();
    store
        .append_to_branch_history(
            "s",
            &handle.branch_id_a,
            HistoryEntry::html("s", "<p>A1</p>"),
            AppendOptions::default(),
        )
        .unwrap();

    let outcome = store
        .resolve_fork("s", &handle.fork_id, &handle.branch_id_b)
        .unwrap();
    assert_eq!(outcome.merged_entries, 1);
    assert_eq!(outcome.discarded_entries, 1);
    assert_eq!(outcome.chosen_branch_id.as_deref(), Some(handle.branch_id_b.as_str()));

    let history = store.get_history("s", None);
    // truncated back to the origin ("one"), so "two" is gone
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, origin_id);
    let info = history[1].fork_info.as_ref().unwrap();
    assert_eq!(info.status, ForkEntryStatus::Chosen);
    assert_eq!(info.label, BranchLabel::B);
    assert_eq!(info.fork_id, handle.fork_id);
    assert_eq!(store.get_prev_html("s", None), "<p>B1</p>");
    assert!(!store.is_fork_active("s"));
}

#[test]
fn test_resolve_rejects_mismatch_without_mutation() {
    let (store, _) = seeded("s");
    let handle = store.start_fork("s", None, "a", "b").unwrap();

    let err = store
        .resolve_fork("s", "other-fork", &handle.branch_id_a)
        .unwrap_err();
    assert_eq!(err.code(), "fork_mismatch");
    assert!(store.is_fork_active("s"));

    let err = store
        .resolve_fork("s", &handle.fork_id, "not-a-branch")
        .unwrap_err();
    assert_eq!(err.code(), "unknown_branch");
    assert!(store.is_fork_active("s"));
    assert_eq!(store.get_history("s", None).len(), 2);
    assert_eq!(store.get_active_fork_summary("s").unwrap().branches.len(), 2);
}

#[test]
fn test_resolve_without_fork() {
    let (store, _) = seeded("s");
    let err = store.resolve_fork("s", "f", "b").unwrap_err();
    assert_eq!(err.code(), "no_active_fork");
}

#[test]
fn test_resolve_appends_branch_audit_trail() {
    let (store, _) = seeded("s");
    for i in 0..20 {
        store
            .append_mutation_record("s", RestMutationRecord::new("POST", format!("/base/{}", i)), None)
            .unwrap();
    }
    let handle = store.start_fork("s", None, "a", "b").unwrap();
    for i in 0..10 {
        store
            .append_mutation_record(
                "s",
                RestMutationRecord::new("POST", format!("/a/{}", i)),
                Some(&handle.branch_id_a),
            )
            .unwrap();
    }
    store
        .append_mutation_record(
            "s",
            RestMutationRecord::new("POST", "/b/0"),
            Some(&handle.branch_id_b),
        )
        .unwrap();

    store
        .resolve_fork("s", &handle.fork_id, &handle.branch_id_a)
        .unwrap();
    let rest = store.get_rest_state("s", None, None).unwrap();
    assert_eq!(rest.mutations.len(), 25);
    assert_eq!(rest.mutations[0].path, "/base/5");
    assert_eq!(rest.mutations[24].path, "/a/9");
    assert!(rest.mutations.iter().all(|m| !m.path.starts_with("/b/")));
}

#[test]
fn test_discard_leaves_base_untouched() {
    let (store, _) = seeded("s");
    let before = store.get_history("s", None);
    let handle = store.start_fork("s", None, "a", "b").unwrap();
    store
        .append_to_branch_history(
            "s",
            &handle.branch_id_a,
            HistoryEntry::html("s", "<p>A1</p>"),
            AppendOptions::default(),
        )
        .unwrap();

    let outcome = store.discard_fork("s", Some(&handle.fork_id)).unwrap().unwrap();
    assert_eq!(outcome.discarded_entries, 1);
    assert!(outcome.chosen_branch_id.is_none());
    assert_eq!(store.get_history("s", None), before);
    assert_eq!(store.get_prev_html("s", None), "<p>two</p>");
    assert!(!store.is_fork_active("s"));
}

#[test]
fn test_discard_without_fork_is_noop() {
    let (store, _) = seeded("s");
    assert!(store.discard_fork("s", None).unwrap().is_none());
    assert!(store.discard_fork("s", Some("anything")).unwrap().is_none());
    assert!(store.discard_fork("nobody", None).unwrap().is_none());
    assert!(!store.contains("nobody"));
}

#[test]
fn test_discard_with_wrong_id_fails() {
    let (store, _) = seeded("s");
    store.start_fork("s", None, "a", "b").unwrap();
    let err = store.discard_fork("s", Some("wrong")).unwrap_err();
    assert_eq!(err.code(), "fork_mismatch");
    assert!(store.is_fork_active("s"));
}

#[test]
fn test_record_level_discard_tags_entries() {
    let mut record = SessionRecord::new(0);
    record.history.push(HistoryEntry::html("s", "<p></p>"));
    let handle = record.start_fork(None, "a", "b", 0).unwrap();
    record
        .append_branch(&handle.branch_id_a, HistoryEntry::html("s", "<p>A</p>"), AppendOptions::default())
        .unwrap();

    let mut fork = record.active_fork.clone().unwrap();
    let tagged = fork
        .branches
        .get_mut(&handle.branch_id_a)
        .unwrap()
        .tag_all(&handle.fork_id, ForkEntryStatus::Discarded);
    assert_eq!(tagged, 1);
    let entry = &fork.branches[&handle.branch_id_a].history[0];
    assert_eq!(entry.fork_info.as_ref().unwrap().status, ForkEntryStatus::Discarded);

    assert!(record.discard_fork(None).unwrap().is_some());
    assert!(record.active_fork.is_none());
}

#[test]
fn test_fork_summaries_across_sessions() {
    let store = SessionStore::default();
    assert!(!store.has_any_active_fork());
    for sid in ["b", "a"] {
        store
            .append_history_entry(sid, HistoryEntry::html(sid, "<p></p>"), AppendOptions::default())
            .unwrap();
        store.start_fork(sid, None, "x", "y").unwrap();
    }
    assert!(store.has_any_active_fork());

    let summaries = store.get_active_fork_summaries();
    assert_eq!(summaries.len(), 2);
    // same created_at on the system clock is possible; ties go by session id
    assert!(summaries[0].created_at <= summaries[1].created_at);

    store.discard_fork("a", None).unwrap();
    store.discard_fork("b", None).unwrap();
    assert!(!store.has_any_active_fork());
    assert!(store.get_active_fork_summaries().is_empty());
}
