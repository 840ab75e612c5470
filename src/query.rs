//! Query execution and multi-mailbox result aggregation
//!
//! A query is compiled once and run against each target mailbox in turn,
//! binding the backend to that mailbox and appending a per-mailbox result
//! record. Compilation failure aborts before any mailbox is touched; an
//! execution failure aborts the remaining mailboxes in the batch.

use std::sync::Arc;

use log::debug;

use crate::backend::FtsBackend;
use crate::error::Result;
use crate::index::{compile_query, CompiledQuery};
use crate::mailstore::Mailbox;
use crate::types::{LookupFlags, LookupResults, MailboxMatches, SearchQuery};
use crate::uidset::UidSet;

/// Search several mailboxes with one compiled query.
///
/// Results arrive in the same order as `boxes`, one record per mailbox. The
/// first mailbox that fails aborts the batch.
pub fn lookup_multi(
    backend: &mut FtsBackend,
    boxes: &[Arc<dyn Mailbox>],
    args: &SearchQuery,
    flags: LookupFlags,
) -> Result<LookupResults> {
    let compiled = compile_query(args, flags)?;

    let mut results = LookupResults {
        boxes: Vec::with_capacity(boxes.len()),
    };
    for mailbox in boxes {
        let matches = run_query(backend, mailbox.as_ref(), &compiled)?;
        results.boxes.push(matches);
    }
    Ok(results)
}

/// Search one mailbox.
///
/// Strictly a multi-mailbox lookup over a one-element list with the single
/// record's match set moved out, so the two entry points cannot diverge.
pub fn lookup(
    backend: &mut FtsBackend,
    mailbox: &Arc<dyn Mailbox>,
    args: &SearchQuery,
    flags: LookupFlags,
) -> Result<UidSet> {
    let mut multi = lookup_multi(backend, std::slice::from_ref(mailbox), args, flags)?;
    Ok(multi
        .boxes
        .pop()
        .map(|r| r.definite_uids)
        .unwrap_or_default())
}

/// Run an already-compiled query against one mailbox, collecting the UIDs the
/// engine is certain match. A mailbox without an index yields an empty set.
fn run_query(
    backend: &mut FtsBackend,
    mailbox: &dyn Mailbox,
    query: &CompiledQuery,
) -> Result<MailboxMatches> {
    backend.set_mailbox(mailbox)?;
    let mut definite_uids = UidSet::new();
    if let Some(uids) = backend.query_uids(query)? {
        for uid in uids {
            definite_uids.insert(uid);
        }
    }
    debug!(
        "query mailbox={} matches={}",
        mailbox.name(),
        definite_uids.len()
    );
    Ok(MailboxMatches {
        mailbox: mailbox.name().to_string(),
        definite_uids,
    })
}
