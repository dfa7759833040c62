//! Store snapshot file
//!
//! Loaded once at startup and written once on graceful shutdown. Writes go
//! to a sibling temp file first and are renamed into place.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vaporvibe_session::{ImportReport, SessionStore, StoreSnapshot};

/// Read and version-check a snapshot file
pub fn read_snapshot(path: &Path) -> Result<StoreSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    StoreSnapshot::from_json(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

/// Import `path` into `store` when it exists. A missing file is not an error.
pub fn restore(store: &SessionStore, path: &Path) -> Result<Option<ImportReport>> {
    if !path.exists() {
        info!(path = %path.display(), "No session snapshot to restore");
        return Ok(None);
    }
    let snapshot = read_snapshot(path)?;
    let report = store
        .import_snapshot(snapshot)
        .context("Failed to import session snapshot")?;
    Ok(Some(report))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the store to `path`, replacing it atomically
pub fn persist(store: &SessionStore, path: &Path) -> Result<usize> {
    let snapshot = store.export_snapshot();
    let count = snapshot.sessions.len();
    let json = serde_json::to_vec_pretty(&snapshot).context("Failed to serialize snapshot")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create snapshot directory")?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, json).context("Failed to write snapshot")?;
    if let Err(e) = fs::rename(&tmp, path) {
        warn!(error = %e, "Snapshot rename failed, removing temp file");
        let _ = fs::remove_file(&tmp);
        return Err(e).context("Failed to move snapshot into place");
    }

    info!(path = %path.display(), sessions = count, "Persisted session snapshot");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaporvibe_session::{AppendOptions, HistoryEntry};

    #[test]
    fn test_persist_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        let store = SessionStore::default();
        store
            .append_history_entry("s1", HistoryEntry::html("s1", "<p>kept</p>"), AppendOptions::default())
            .unwrap();
        assert_eq!(persist(&store, &path).unwrap(), 1);
        assert!(!temp_path(&path).exists());

        let restored = SessionStore::default();
        let report = restore(&restored, &path).unwrap().unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(restored.get_prev_html("s1", None), "<p>kept</p>");
    }

    #[test]
    fn test_restore_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::default();
        assert!(restore(&store, &dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(restore(&SessionStore::default(), &path).is_err());
    }
}
