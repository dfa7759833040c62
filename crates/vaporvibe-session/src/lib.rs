//! Vaporvibe Session - Session & Fork Store
//!
//! In-memory state behind a vaporvibe server:
//! - Store: TTL- and capacity-bounded session records behind one lock
//! - Ledger: base history, canvas tracking and branch timelines
//! - Fork: the A/B fork state machine (start, resolve, discard)
//! - Audit: capped REST mutation/query trails
//! - Snapshot: whole-store persistence and flat history import/export
//! - Document / Markdown: the `history.json` export and its Markdown rendering
//! - Prompt: history selection for the next generation
//!
//! ## Usage
//!
//! ```ignore
//! use vaporvibe_session::{AppendOptions, HistoryEntry, SessionStore, SessionStoreConfig};
//!
//! let store = SessionStore::new(SessionStoreConfig::default());
//! let identity = store.get_or_create_session_id(None)?;
//! let sid = identity.session_id;
//!
//! store.append_history_entry(&sid, HistoryEntry::html(&sid, "<main/>"), AppendOptions::default())?;
//! let fork = store.start_fork(&sid, None, "dark mode", "light mode")?;
//! store.append_to_branch_history(&sid, &fork.branch_id_a, HistoryEntry::html(&sid, "<main class=dark/>"), AppendOptions::default())?;
//! store.resolve_fork(&sid, &fork.fork_id, &fork.branch_id_a)?;
//! ```

#![forbid(unsafe_code)]

pub mod audit;
pub mod cache_ids;
pub mod clock;
pub mod codec;
pub mod document;
pub mod error;
pub mod fork;
pub mod images;
pub mod ledger;
pub mod markdown;
pub mod prompt;
pub mod snapshot;
pub mod store;
pub mod types;

pub use audit::{RestHistoryInput, RestRecord, REST_RECORD_LIMIT};
pub use cache_ids::{next_id_after, COMPONENT_ID_PREFIX, STYLE_ID_PREFIX};
pub use clock::{Clock, ManualClock, SystemClock};
pub use document::{
    mask_sensitive, HistorySnapshot, ImageGenerationSummary, LlmSummary, RuntimeSummary,
    HISTORY_SNAPSHOT_VERSION,
};
pub use error::{Error, Result};
pub use fork::{BranchSummary, ForkHandle, ForkOutcome, ForkSummary};
pub use markdown::render_prompt_markdown;
pub use prompt::{estimate_entry_size, select_history_for_prompt, HistorySelection, PromptContext};
pub use snapshot::{ImportReport, StoreSnapshot, STORE_SNAPSHOT_VERSION};
pub use store::{
    SessionIdentity, SessionStore, SessionStoreConfig, SessionSummary, DEFAULT_CAPACITY,
    DEFAULT_TTL,
};
pub use types::{
    AppendOptions, BranchLabel, BranchState, BriefAttachment, EntryKind, ForkEntryStatus,
    ForkInfo, ForkState, ForkStatus, FragmentCache, GeneratedImage, HistoryEntry, HistoryRequest,
    HistoryResponse, JsonMap, LlmInfo, LlmUsage, ReasoningTrace, RestCallType,
    RestHistoryMetadata, RestMutationRecord, RestQueryRecord, RestRequestInfo, RestState,
    SessionRecord,
};
