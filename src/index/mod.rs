//! Per-mailbox index resources
//!
//! One inverted index lives on disk per mailbox. This module wraps the engine
//! behind the handful of operations the rest of the subsystem needs: lazy
//! open/create, a cheap existence check, ascending UID iteration, incremental
//! document build, expunge, optimize, and whole-index destruction. Query
//! compilation is schema-global, so one compiled query can be run against any
//! number of mailbox indexes.

mod compile;
mod engine;

pub use compile::{compile_query, CompiledQuery};
pub use engine::{delete_index, MailIndex, UidIter};
