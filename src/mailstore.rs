//! Mailbox store collaborator traits
//!
//! The message store itself is owned by the host; this subsystem only needs a
//! narrow view of it: a forced full synchronization, a full scan of live UIDs,
//! the mailbox identity, and the directory under which its index may live.
//! Implementations belong to the host server; tests use in-memory fakes.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::uidset::UidSet;

/// One mailbox in the host store
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Mailbox name, used for binding identity and logging
    fn name(&self) -> &str;

    /// Directory the mailbox's index data lives under
    fn index_dir(&self) -> &Path;

    /// Force a full synchronization read of the mailbox.
    ///
    /// Reconciliation treats a failure here as a fatal precondition and aborts.
    async fn sync_full(&self) -> Result<()>;

    /// Enumerate every live message UID in the mailbox (full scan, no filter)
    async fn live_uids(&self) -> Result<UidSet>;
}

/// The host store's mailbox namespace
#[async_trait]
pub trait MailStore: Send + Sync {
    /// List every mailbox in the namespace, for batch rescan/optimize passes
    async fn list_mailboxes(&self) -> Result<Vec<Arc<dyn Mailbox>>>;
}
