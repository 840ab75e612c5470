//! Index reconciliation
//!
//! Detects divergence between a mailbox's live message set and its index, and
//! repairs it. Missing live UIDs cannot be backfilled without replaying full
//! message content, so any gap forces destruction of the whole index and a
//! rebuild on the next indexing pass. Stale UIDs (expunged from the mailbox
//! behind the index's back) are directly actionable and removed one by one.

use log::debug;

use crate::backend::FtsBackend;
use crate::error::Result;
use crate::mailstore::Mailbox;
use crate::types::UidLookup;
use crate::uidset::UidSet;

/// Reconcile one mailbox's index against its live message set.
///
/// Returns whether a usable index exists after the pass: false when the index
/// was destroyed or never existed, true otherwise. Callers use this to decide
/// whether an optimize pass is worthwhile.
pub async fn rescan_mailbox(backend: &mut FtsBackend, mailbox: &dyn Mailbox) -> Result<bool> {
    // Fatal precondition: without a full sync the live scan below could be
    // reconciling against a stale view.
    mailbox.sync_full().await?;

    debug!("rescanning mailbox={}", mailbox.name());

    backend.set_mailbox(mailbox)?;

    let live = mailbox.live_uids().await?;
    let mut seen = UidSet::new();
    let mut missing = UidSet::new();
    let mut index_exists = true;

    for uid in live.iter() {
        seen.insert(uid);
        match backend.uid_lookup(uid)? {
            UidLookup::NoIndex => {
                // No index at all; no sense in continuing the scan.
                index_exists = false;
                break;
            }
            UidLookup::Absent => {
                debug!("rescan: missing mailbox={} uid={}", mailbox.name(), uid);
                missing.insert(uid);
            }
            UidLookup::Present => {}
        }
    }

    if !missing.is_empty() {
        // There is no way to tell the indexer to backfill exactly these UIDs
        // without re-deriving their content. Delete the index and let the
        // next indexing pass rebuild it from scratch.
        backend.delete_index_for_box()?;
        debug!(
            "rescan: missing indexed messages, deleting index mailbox={}",
            mailbox.name()
        );
        return Ok(false);
    }

    if !index_exists {
        return Ok(false);
    }

    // Check for expunged messages the index was never told about.
    let indexed = match backend.indexed_uids()? {
        Some(iter) => iter,
        None => return Ok(false),
    };
    let mut no_stale = true;
    for uid in indexed {
        if !seen.contains(uid) {
            debug!(
                "rescan: removing expunged message mailbox={} uid={}",
                mailbox.name(),
                uid
            );
            backend.expunge_uid(uid)?;
            no_stale = false;
        }
    }
    if no_stale {
        debug!("rescan: no expunged messages mailbox={}", mailbox.name());
    }

    Ok(true)
}
