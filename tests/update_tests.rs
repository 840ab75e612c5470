//! Incremental indexing tests: the update session state machine end to end

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use driftnet::{
    BuildKey, Error, FtsBackend, LookupFlags, MailStore, Mailbox, Result, SearchQuery, Settings,
    Uid, UidLookup, UidSet,
};

struct TestMailbox {
    name: String,
    index_dir: PathBuf,
}

#[async_trait]
impl Mailbox for TestMailbox {
    fn name(&self) -> &str {
        &self.name
    }

    fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    async fn sync_full(&self) -> Result<()> {
        Ok(())
    }

    async fn live_uids(&self) -> Result<UidSet> {
        Ok(UidSet::new())
    }
}

struct TestStore;

#[async_trait]
impl MailStore for TestStore {
    async fn list_mailboxes(&self) -> Result<Vec<Arc<dyn Mailbox>>> {
        Ok(Vec::new())
    }
}

fn test_mailbox(tmp: &TempDir, name: &str) -> Arc<dyn Mailbox> {
    Arc::new(TestMailbox {
        name: name.to_string(),
        index_dir: tmp.path().join(name),
    })
}

fn test_backend() -> FtsBackend {
    let _ = env_logger::builder().is_test(true).try_init();
    FtsBackend::new(Settings::default(), Arc::new(TestStore)).unwrap()
}

fn index_message(backend: &mut FtsBackend, mailbox: &Arc<dyn Mailbox>, uid: Uid, subject: &str, body: &str) {
    let mut session = backend.begin_update();
    session.set_mailbox(mailbox.as_ref()).unwrap();
    session
        .set_build_key(BuildKey::Header {
            uid,
            name: "Subject".to_string(),
        })
        .unwrap();
    session.build_more(subject.as_bytes()).unwrap();
    session.unset_build_key();
    session.set_build_key(BuildKey::BodyPart { uid }).unwrap();
    session.build_more(body.as_bytes()).unwrap();
    session.unset_build_key();
    session.close().unwrap();
}

#[test]
fn test_indexed_message_round_trip() {
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();

    index_message(&mut backend, &mailbox, 7, "quarterly numbers", "see attached");

    assert_eq!(backend.uid_lookup(7).unwrap(), UidLookup::Present);
    let matches = backend
        .lookup(
            &mailbox,
            &SearchQuery::Subject("quarterly".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(matches.contains(7));
}

#[test]
fn test_session_expunge() {
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();
    index_message(&mut backend, &mailbox, 7, "subject", "body");

    let mut session = backend.begin_update();
    session.set_mailbox(mailbox.as_ref()).unwrap();
    session.expunge(7).unwrap();
    session.close().unwrap();

    assert_eq!(backend.uid_lookup(7).unwrap(), UidLookup::Absent);
}

#[test]
fn test_chunked_header_fragments_kept_in_order() {
    // One header delivered in two chunks must index as the contiguous text
    // "Hello World", so the phrase survives the split.
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();

    let mut session = backend.begin_update();
    session.set_mailbox(mailbox.as_ref()).unwrap();
    session
        .set_build_key(BuildKey::Header {
            uid: 5,
            name: "Subject".to_string(),
        })
        .unwrap();
    session.build_more(b"Hello ").unwrap();
    session.build_more(b"World").unwrap();
    session.unset_build_key();
    session.close().unwrap();

    let phrase = backend
        .lookup(
            &mailbox,
            &SearchQuery::Subject("\"hello world\"".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(phrase.contains(5));
    let single = backend
        .lookup(
            &mailbox,
            &SearchQuery::Subject("world".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(single.contains(5));
}

#[test]
fn test_failure_is_sticky_until_close() {
    // index_dir is a regular file, so opening the index for writing fails.
    let tmp = TempDir::new().unwrap();
    let blocked = tmp.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let mailbox: Arc<dyn Mailbox> = Arc::new(TestMailbox {
        name: "blocked".to_string(),
        index_dir: blocked,
    });
    let mut backend = test_backend();

    let mut session = backend.begin_update();
    session.set_mailbox(mailbox.as_ref()).unwrap();
    session
        .set_build_key(BuildKey::BodyPart { uid: 1 })
        .unwrap();

    // First failure reports the underlying cause.
    let first = session.build_more(b"data").unwrap_err();
    assert!(!matches!(first, Error::SessionFailed));

    // Everything after it short-circuits.
    assert!(matches!(
        session.build_more(b"more").unwrap_err(),
        Error::SessionFailed
    ));
    assert!(matches!(
        session.set_build_key(BuildKey::BodyPart { uid: 2 }).unwrap_err(),
        Error::SessionFailed
    ));
    assert!(matches!(session.close().unwrap_err(), Error::SessionFailed));
}

#[test]
fn test_unindexed_header_is_dropped() {
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();

    let mut session = backend.begin_update();
    session.set_mailbox(mailbox.as_ref()).unwrap();
    session
        .set_build_key(BuildKey::Header {
            uid: 9,
            name: "X-Spam-Status".to_string(),
        })
        .unwrap();
    session.build_more(b"clamranch").unwrap();
    session.unset_build_key();
    // A MIME part header has no name filter and lands in the catch-all field.
    session.set_build_key(BuildKey::MimeHeader { uid: 9 }).unwrap();
    session.build_more(b"boundarytoken").unwrap();
    session.unset_build_key();
    session.close().unwrap();

    assert_eq!(backend.uid_lookup(9).unwrap(), UidLookup::Present);
    let dropped = backend
        .lookup(
            &mailbox,
            &SearchQuery::Text("clamranch".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(dropped.is_empty());
    let kept = backend
        .lookup(
            &mailbox,
            &SearchQuery::Text("boundarytoken".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(kept.contains(9));
}

#[test]
fn test_reindex_replaces_document() {
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();

    index_message(&mut backend, &mailbox, 3, "alpha", "first draft");
    index_message(&mut backend, &mailbox, 3, "beta", "second draft");

    let stale = backend
        .lookup(
            &mailbox,
            &SearchQuery::Subject("alpha".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(stale.is_empty());
    let fresh = backend
        .lookup(
            &mailbox,
            &SearchQuery::Subject("beta".to_string()),
            LookupFlags::default(),
        )
        .unwrap();
    assert!(fresh.contains(3));

    // Still exactly one document for the UID.
    let all = backend
        .lookup(&mailbox, &SearchQuery::All, LookupFlags::default())
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn test_several_uids_in_one_session() {
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();

    let mut session = backend.begin_update();
    session.set_mailbox(mailbox.as_ref()).unwrap();
    for uid in [1, 2] {
        session
            .set_build_key(BuildKey::Header {
                uid,
                name: "Subject".to_string(),
            })
            .unwrap();
        session
            .build_more(format!("message {}", uid).as_bytes())
            .unwrap();
        session.unset_build_key();
    }
    session.close().unwrap();

    assert_eq!(backend.uid_lookup(1).unwrap(), UidLookup::Present);
    assert_eq!(backend.uid_lookup(2).unwrap(), UidLookup::Present);
}

#[test]
fn test_last_uid_without_index_is_zero() {
    let tmp = TempDir::new().unwrap();
    let mailbox = test_mailbox(&tmp, "inbox");
    let mut backend = test_backend();

    assert_eq!(backend.last_uid(mailbox.as_ref()).unwrap(), 0);

    index_message(&mut backend, &mailbox, 4, "subject", "body");
    index_message(&mut backend, &mailbox, 9, "subject", "body");
    assert_eq!(backend.last_uid(mailbox.as_ref()).unwrap(), 9);
}
