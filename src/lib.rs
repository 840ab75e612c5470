//! Driftnet - per-mailbox full-text search for mail stores
//!
//! This library keeps one inverted index per mailbox consistent with a
//! mutable, externally-owned message store, and answers search queries against
//! one or more mailboxes with per-mailbox result partitioning. The host store
//! and the inverted-index engine are external collaborators; this crate owns
//! the reconciliation, incremental-build, and query-aggregation logic between
//! them.

pub mod backend;
pub mod config;
pub mod error;
pub mod index;
pub mod mailstore;
pub mod query;
pub mod rescan;
pub mod types;
pub mod uidset;
pub mod update;

pub use backend::{FtsBackend, INDEX_NAME};
pub use config::Settings;
pub use error::{Error, Result};
pub use index::{compile_query, CompiledQuery, MailIndex, UidIter};
pub use mailstore::{MailStore, Mailbox};
pub use types::*;
pub use uidset::UidSet;
pub use update::UpdateContext;
