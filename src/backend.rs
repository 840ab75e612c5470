//! Caller-facing search backend
//!
//! `FtsBackend` owns the subsystem settings, the mailbox namespace handle, and
//! the binding to the mailbox currently being worked on. The binding holds at
//! most one lazily opened index; rebinding to a different mailbox closes the
//! previous one first. All mutation goes through `&mut self`, so operations on
//! one backend never overlap.

use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::index::{self, CompiledQuery, MailIndex, UidIter};
use crate::mailstore::{MailStore, Mailbox};
use crate::query;
use crate::rescan;
use crate::types::{LookupFlags, LookupResults, SearchQuery, Uid, UidLookup};
use crate::uidset::UidSet;
use crate::update::UpdateContext;

/// Name of the index directory under a mailbox's index dir
pub const INDEX_NAME: &str = "driftnet-index";

/// The mailbox the backend is currently bound to
struct Binding {
    mailbox: String,
    path: PathBuf,
    index: Option<MailIndex>,
}

/// Per-namespace search backend
pub struct FtsBackend {
    settings: Settings,
    store: Arc<dyn MailStore>,
    binding: Option<Binding>,
}

enum BoxAction {
    Optimize,
    Rescan,
}

impl FtsBackend {
    /// Initialize the subsystem. Invalid settings are fatal here and nowhere
    /// else.
    pub fn new(settings: Settings, store: Arc<dyn MailStore>) -> Result<Self> {
        settings.validate()?;
        debug!("initialized");
        Ok(Self {
            settings,
            store,
            binding: None,
        })
    }

    /// Deinitialize, closing the current mailbox binding
    pub fn close(&mut self) -> Result<()> {
        self.close_box()?;
        debug!("deinitialized");
        Ok(())
    }

    /// Force-close the current mailbox binding
    pub fn refresh(&mut self) -> Result<()> {
        self.close_box()
    }

    /// Bind to `mailbox`. Binding to the already-bound mailbox is a no-op;
    /// anything else closes the previous binding first.
    pub fn set_mailbox(&mut self, mailbox: &dyn Mailbox) -> Result<()> {
        if self
            .binding
            .as_ref()
            .map_or(false, |b| b.mailbox == mailbox.name())
        {
            return Ok(());
        }
        self.close_box()?;
        self.binding = Some(Binding {
            mailbox: mailbox.name().to_string(),
            path: mailbox.index_dir().join(INDEX_NAME),
            index: None,
        });
        Ok(())
    }

    /// The last (highest) indexed UID for `mailbox`, 0 when nothing is indexed
    pub fn last_uid(&mut self, mailbox: &dyn Mailbox) -> Result<Uid> {
        self.set_mailbox(mailbox)?;
        let uid = match self.index(false)? {
            Some(index) => index.last_uid()?,
            None => 0,
        };
        debug!("last uid mailbox={} uid={}", self.mailbox_name(), uid);
        Ok(uid)
    }

    /// Tri-state existence check for `uid` against the bound mailbox's index
    pub fn uid_lookup(&mut self, uid: Uid) -> Result<UidLookup> {
        match self.index(false)? {
            None => Ok(UidLookup::NoIndex),
            Some(index) => {
                if index.contains(uid)? {
                    Ok(UidLookup::Present)
                } else {
                    Ok(UidLookup::Absent)
                }
            }
        }
    }

    /// Open an update session against this backend
    pub fn begin_update(&mut self) -> UpdateContext<'_> {
        UpdateContext::new(self)
    }

    /// Reconcile one mailbox's index with its live message set.
    ///
    /// Returns whether a usable index exists afterwards; callers skip the
    /// optimize pass when it does not.
    pub async fn rescan_box(&mut self, mailbox: &dyn Mailbox) -> Result<bool> {
        rescan::rescan_mailbox(self, mailbox).await
    }

    /// Reconcile every mailbox in the namespace
    pub async fn rescan(&mut self) -> Result<()> {
        self.for_each_mailbox(BoxAction::Rescan).await
    }

    /// Run a merge pass over every mailbox in the namespace
    pub async fn optimize(&mut self) -> Result<()> {
        self.for_each_mailbox(BoxAction::Optimize).await
    }

    /// Search one mailbox. Defined as a multi-mailbox lookup over a
    /// one-element list, so the two entry points cannot diverge.
    pub fn lookup(
        &mut self,
        mailbox: &Arc<dyn Mailbox>,
        args: &SearchQuery,
        flags: LookupFlags,
    ) -> Result<UidSet> {
        query::lookup(self, mailbox, args, flags)
    }

    /// Search several mailboxes with one compiled query, partitioning matches
    /// per mailbox
    pub fn lookup_multi(
        &mut self,
        boxes: &[Arc<dyn Mailbox>],
        args: &SearchQuery,
        flags: LookupFlags,
    ) -> Result<LookupResults> {
        query::lookup_multi(self, boxes, args, flags)
    }

    async fn for_each_mailbox(&mut self, action: BoxAction) -> Result<()> {
        let boxes = self.store.list_mailboxes().await?;
        for mailbox in boxes {
            self.box_action(mailbox.as_ref(), &action).await?;
        }
        Ok(())
    }

    async fn box_action(&mut self, mailbox: &dyn Mailbox, action: &BoxAction) -> Result<()> {
        self.set_mailbox(mailbox)?;
        let mut optimize = true;
        if matches!(action, BoxAction::Rescan) {
            optimize = rescan::rescan_mailbox(self, mailbox).await?;
        }
        if optimize {
            debug!("optimizing mailbox={}", mailbox.name());
            self.optimize_box()?;
        }
        Ok(())
    }

    /// Merge the bound mailbox's index segments; nothing to do without an index
    pub fn optimize_box(&mut self) -> Result<()> {
        if let Some(index) = self.index(false)? {
            index.optimize()?;
        }
        Ok(())
    }

    /// Remove `uid` from the bound mailbox's index
    pub(crate) fn expunge_uid(&mut self, uid: Uid) -> Result<()> {
        debug!("expunge mailbox={} uid={}", self.mailbox_name(), uid);
        if let Some(index) = self.index(false)? {
            index.expunge(uid)?;
        }
        Ok(())
    }

    /// Destroy the bound mailbox's entire index. Returns false if none existed.
    pub(crate) fn delete_index_for_box(&mut self) -> Result<bool> {
        let binding = self
            .binding
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no mailbox bound".to_string()))?;
        // Drop the open handle (and its writer lock) before removing the
        // directory out from under it.
        binding.index = None;
        index::delete_index(&binding.path)
    }

    pub(crate) fn index_header(
        &mut self,
        uid: Uid,
        name: Option<&str>,
        data: &[u8],
    ) -> Result<()> {
        match self.index(true)? {
            Some(index) => index.index_header(uid, name, data),
            None => Err(Error::Index("failed to open index for writing".to_string())),
        }
    }

    pub(crate) fn index_body(&mut self, uid: Uid, data: &[u8]) -> Result<()> {
        match self.index(true)? {
            Some(index) => index.index_body(uid, data),
            None => Err(Error::Index("failed to open index for writing".to_string())),
        }
    }

    /// Iterate the bound mailbox's indexed UIDs; `None` when no index exists
    pub(crate) fn indexed_uids(&mut self) -> Result<Option<UidIter>> {
        match self.index(false)? {
            None => Ok(None),
            Some(index) => index.uids(None).map(Some),
        }
    }

    /// Iterate the bound mailbox's UIDs matching `query`; `None` when no index
    /// exists
    pub(crate) fn query_uids(&mut self, query: &CompiledQuery) -> Result<Option<UidIter>> {
        match self.index(false)? {
            None => Ok(None),
            Some(index) => index.uids(Some(query)).map(Some),
        }
    }

    /// Commit the bound index if one is open
    pub(crate) fn commit_current(&mut self) -> Result<()> {
        if let Some(index) = self.open_index_mut() {
            index.commit()?;
        }
        Ok(())
    }

    /// Discard uncommitted writes on the bound index if one is open
    pub(crate) fn rollback_current(&mut self) -> Result<()> {
        if let Some(index) = self.open_index_mut() {
            index.rollback()?;
        }
        Ok(())
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn mailbox_name(&self) -> &str {
        self.binding
            .as_ref()
            .map_or("<none>", |b| b.mailbox.as_str())
    }

    /// The bound mailbox's index, opened lazily. `Ok(None)` means no index
    /// exists yet and `create` was false.
    fn index(&mut self, create: bool) -> Result<Option<&mut MailIndex>> {
        let binding = self
            .binding
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no mailbox bound".to_string()))?;
        if binding.index.is_none() {
            binding.index =
                MailIndex::open(&binding.path, create, self.settings.writer_heap_bytes)?;
        }
        Ok(binding.index.as_mut())
    }

    fn close_box(&mut self) -> Result<()> {
        if let Some(mut binding) = self.binding.take() {
            if let Some(mut index) = binding.index.take() {
                index.commit()?;
            }
        }
        Ok(())
    }

    fn open_index_mut(&mut self) -> Option<&mut MailIndex> {
        self.binding.as_mut().and_then(|b| b.index.as_mut())
    }
}
