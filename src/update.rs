//! Incremental build pipeline
//!
//! An `UpdateContext` is one indexing transaction: the host streams a
//! message's fragments (header fields, body parts) through it, and the context
//! routes each fragment to the right indexing operation for the UID currently
//! being built. Failure is sticky: once any fragment write fails, every later
//! operation in the session short-circuits without touching the index, and the
//! session reports failure at teardown.

use log::debug;

use crate::backend::FtsBackend;
use crate::error::{Error, Result};
use crate::mailstore::Mailbox;
use crate::types::{BuildKey, Uid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentKind {
    Header,
    MimeHeader,
    BodyPart,
}

/// One indexing transaction against a backend
pub struct UpdateContext<'a> {
    backend: &'a mut FtsBackend,
    uid: Uid,
    kind: Option<FragmentKind>,
    header_name: Option<String>,
    failed: bool,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(backend: &'a mut FtsBackend) -> Self {
        Self {
            backend,
            uid: 0,
            kind: None,
            header_name: None,
            failed: false,
        }
    }

    /// Rebind the session to another mailbox mid-transaction
    pub fn set_mailbox(&mut self, mailbox: &dyn Mailbox) -> Result<()> {
        self.backend.set_mailbox(mailbox)
    }

    /// Start a new fragment. Switching UID or field kind implicitly ends the
    /// previous fragment; a new UID starts a new document context.
    pub fn set_build_key(&mut self, key: BuildKey) -> Result<()> {
        if self.failed {
            return Err(Error::SessionFailed);
        }
        if key.uid() != self.uid {
            debug!(
                "indexing mailbox={} uid={}",
                self.backend.mailbox_name(),
                key.uid()
            );
        }
        match key {
            BuildKey::Header { uid, name } => {
                self.begin(uid, FragmentKind::Header);
                // Headers outside the indexed set keep no name; their
                // fragments are dropped, which is not an error.
                if self.backend.settings().want_indexed(&name) {
                    self.header_name = Some(name);
                }
            }
            BuildKey::MimeHeader { uid } => self.begin(uid, FragmentKind::MimeHeader),
            BuildKey::BodyPart { uid } => self.begin(uid, FragmentKind::BodyPart),
            BuildKey::BodyPartBinary { .. } => {
                unreachable!("binary body parts are filtered before the build pipeline")
            }
        }
        Ok(())
    }

    /// End the current fragment, releasing any owned header name. The UID is
    /// untouched; the session is ready for the next key.
    pub fn unset_build_key(&mut self) {
        self.header_name = None;
    }

    /// Feed fragment data for the current build key.
    ///
    /// Calling this before any key has been set is a contract violation.
    pub fn build_more(&mut self, data: &[u8]) -> Result<()> {
        assert!(self.uid != 0, "build_more called before set_build_key");
        if self.failed {
            return Err(Error::SessionFailed);
        }
        let result = match self.kind {
            Some(FragmentKind::Header) => match &self.header_name {
                Some(name) => self.backend.index_header(self.uid, Some(name), data),
                // Header not in the indexed set: drop the fragment silently.
                None => Ok(()),
            },
            Some(FragmentKind::MimeHeader) => self.backend.index_header(self.uid, None, data),
            Some(FragmentKind::BodyPart) => self.backend.index_body(self.uid, data),
            None => unreachable!("build key kind missing with a non-zero uid"),
        };
        if let Err(err) = result {
            self.failed = true;
            return Err(err);
        }
        Ok(())
    }

    /// Remove `uid` from the bound mailbox's index
    pub fn expunge(&mut self, uid: Uid) -> Result<()> {
        self.backend.expunge_uid(uid)
    }

    /// Tear the session down.
    ///
    /// A clean session commits everything it wrote; a failed session is
    /// discarded wholesale (uncommitted writes rolled back) and reports
    /// failure, leaving any retry decision to the caller.
    pub fn close(self) -> Result<()> {
        let UpdateContext {
            backend, failed, ..
        } = self;
        if failed {
            backend.rollback_current()?;
            return Err(Error::SessionFailed);
        }
        backend.commit_current()
    }

    fn begin(&mut self, uid: Uid, kind: FragmentKind) {
        self.uid = uid;
        self.kind = Some(kind);
        self.header_name = None;
    }
}
