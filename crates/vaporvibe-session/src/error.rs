//! Error types for vaporvibe-session
//!
//! Every failure here is an invariant violation raised before any state is
//! touched; callers surface them at the HTTP boundary and never retry.

use thiserror::Error;

/// Session store error type
#[derive(Debug, Error)]
pub enum Error {
    /// A base-timeline write was attempted while a fork is open
    #[error("fork {fork_id} is active; route writes through a branch")]
    ForkActive {
        /// The currently active fork
        fork_id: String,
    },

    /// A fork was started while another one is still open
    #[error("fork {fork_id} is already active for this session")]
    ForkAlreadyActive {
        /// The currently active fork
        fork_id: String,
    },

    /// No html entry exists to fork from
    #[error("no html history entry available to fork from")]
    NoForkOrigin,

    /// Resolve was requested but the session has no open fork
    #[error("no active fork for this session")]
    NoActiveFork,

    /// The supplied fork id does not match the open fork
    #[error("fork {requested} does not match active fork {active}")]
    ForkMismatch {
        /// Fork id supplied by the caller
        requested: String,
        /// Fork id currently active
        active: String,
    },

    /// Branch id not present in the active fork
    #[error("unknown branch: {branch_id}")]
    UnknownBranch {
        /// Branch id supplied by the caller
        branch_id: String,
    },

    /// History or store snapshot could not be understood
    #[error("unsupported snapshot: {0}")]
    UnsupportedSnapshot(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (lock poisoning)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unknown-branch error
    #[must_use]
    pub fn unknown_branch(branch_id: impl Into<String>) -> Self {
        Self::UnknownBranch {
            branch_id: branch_id.into(),
        }
    }

    /// Create an unsupported-snapshot error
    #[must_use]
    pub fn unsupported_snapshot(msg: impl Into<String>) -> Self {
        Self::UnsupportedSnapshot(msg.into())
    }

    /// Whether the caller, not the store, is at fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// Get error code for API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ForkActive { .. } => "fork_active",
            Self::ForkAlreadyActive { .. } => "fork_already_active",
            Self::NoForkOrigin => "no_fork_origin",
            Self::NoActiveFork => "no_active_fork",
            Self::ForkMismatch { .. } => "fork_mismatch",
            Self::UnknownBranch { .. } => "unknown_branch",
            Self::UnsupportedSnapshot(_) => "unsupported_snapshot",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for session store operations
pub type Result<T> = std::result::Result<T, Error>;
