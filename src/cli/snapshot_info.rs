//! `vaporvibe snapshot-info`

use anyhow::Result;
use std::path::PathBuf;
use vaporvibe_session::StoreSnapshot;

use crate::server::{load_config, persistence};

fn describe(snapshot: &StoreSnapshot) -> String {
    format!(
        "version:      {}\nexported at:  {}\nsessions:     {}\nentries:      {}\nactive forks: {}",
        snapshot.version,
        snapshot.exported_at.to_rfc3339(),
        snapshot.sessions.len(),
        snapshot.entry_count(),
        snapshot.active_fork_count(),
    )
}

/// Print a summary of the snapshot at `path`, or at the configured path
pub fn run(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => load_config()?.snapshot.path,
    };
    let snapshot = persistence::read_snapshot(&path)?;
    println!("{}", path.display());
    println!("{}", describe(&snapshot));
    Ok(())
}
