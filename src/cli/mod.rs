//! CLI module for Vaporvibe
//!
//! - `serve`: Start the server (default)
//! - `snapshot-info`: Summarize a persisted session snapshot

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod snapshot_info;

/// Vaporvibe session server CLI
#[derive(Parser, Debug)]
#[command(name = "vaporvibe")]
#[command(about = "Session and fork state server for generated apps")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Print session, entry and fork counts of a snapshot file
    SnapshotInfo {
        /// Snapshot path; defaults to the configured one
        path: Option<PathBuf>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::SnapshotInfo { path }) => snapshot_info::run(path),
        Some(Commands::Serve) | None => crate::server::run().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::parse_from(["vaporvibe"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_snapshot_info_path() {
        let cli = Cli::parse_from(["vaporvibe", "snapshot-info", "/tmp/snap.json"]);
        match cli.command {
            Some(Commands::SnapshotInfo { path }) => {
                assert_eq!(path, Some(PathBuf::from("/tmp/snap.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
