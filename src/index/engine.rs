//! Tantivy-backed per-mailbox index resource

use std::collections::BTreeSet;
use std::path::Path;

use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, INDEXED, STORED, TEXT};
use tantivy::{Index as TantivyIndex, IndexReader, IndexWriter, TantivyDocument, Term};

use crate::error::Result;
use crate::index::CompiledQuery;
use crate::types::Uid;

/// Field handles for the per-mailbox schema.
///
/// Every index is created from this builder, in this order, so field handles
/// are interchangeable across mailboxes and compiled queries can be reused.
pub(crate) struct MailFields {
    pub(crate) schema: Schema,
    pub(crate) uid: Field,
    pub(crate) from: Field,
    pub(crate) to: Field,
    pub(crate) cc: Field,
    pub(crate) bcc: Field,
    pub(crate) subject: Field,
    /// Catch-all for MIME headers and headers without a dedicated field
    pub(crate) header: Field,
    pub(crate) body: Field,
}

impl MailFields {
    pub(crate) fn build() -> Self {
        let mut builder = Schema::builder();
        let uid = builder.add_u64_field("uid", INDEXED | STORED);
        let from = builder.add_text_field("from", TEXT);
        let to = builder.add_text_field("to", TEXT);
        let cc = builder.add_text_field("cc", TEXT);
        let bcc = builder.add_text_field("bcc", TEXT);
        let subject = builder.add_text_field("subject", TEXT);
        let header = builder.add_text_field("header", TEXT);
        let body = builder.add_text_field("body", TEXT);
        let schema = builder.build();
        Self {
            schema,
            uid,
            from,
            to,
            cc,
            bcc,
            subject,
            header,
            body,
        }
    }

    /// Field a named header indexes into
    pub(crate) fn header_field(&self, name: &str) -> Field {
        match name.to_ascii_lowercase().as_str() {
            "from" => self.from,
            "to" => self.to,
            "cc" => self.cc,
            "bcc" => self.bcc,
            "subject" => self.subject,
            _ => self.header,
        }
    }

    pub(crate) fn all_text_fields(&self) -> Vec<Field> {
        vec![
            self.from,
            self.to,
            self.cc,
            self.bcc,
            self.subject,
            self.header,
            self.body,
        ]
    }
}

/// Document being built incrementally for one UID.
///
/// Fragments accumulate here until the session moves to another UID or the
/// index is committed; consecutive fragments for the same field concatenate.
struct PendingDoc {
    uid: Uid,
    values: Vec<(Field, String)>,
}

/// Handle to one mailbox's on-disk index.
///
/// The writer is created lazily so read-only operations never take the engine's
/// write lock.
pub struct MailIndex {
    index: TantivyIndex,
    reader: IndexReader,
    writer: Option<IndexWriter>,
    pending: Option<PendingDoc>,
    fields: MailFields,
    writer_heap: usize,
}

impl MailIndex {
    /// Open the index at `path`, creating it when `create` is set.
    ///
    /// Returns `Ok(None)` when no index exists and `create` is false. Failure
    /// to open or create is reported to the caller, never swallowed.
    pub fn open(path: &Path, create: bool, writer_heap: usize) -> Result<Option<MailIndex>> {
        let fields = MailFields::build();
        let index = if path.join("meta.json").is_file() {
            TantivyIndex::open_in_dir(path)?
        } else if create {
            std::fs::create_dir_all(path)?;
            TantivyIndex::create_in_dir(path, fields.schema.clone())?
        } else {
            return Ok(None);
        };
        let reader = index.reader()?;
        Ok(Some(MailIndex {
            index,
            reader,
            writer: None,
            pending: None,
            fields,
            writer_heap,
        }))
    }

    /// The highest indexed UID, or 0 when the index is empty
    pub fn last_uid(&self) -> Result<Uid> {
        Ok(self.uids(None)?.last().unwrap_or(0))
    }

    /// Does the index hold a document for this UID?
    pub fn contains(&self, uid: Uid) -> Result<bool> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_u64(self.fields.uid, u64::from(uid)),
            IndexRecordOption::Basic,
        );
        let count = searcher.search(&query, &Count)?;
        Ok(count > 0)
    }

    /// Iterate the UIDs recorded in the index, ascending, optionally
    /// restricted to documents matching `query`.
    pub fn uids(&self, query: Option<&CompiledQuery>) -> Result<UidIter> {
        let searcher = self.reader.searcher();
        let addresses = match query {
            Some(compiled) => searcher.search(&*compiled.query, &DocSetCollector)?,
            None => searcher.search(&AllQuery, &DocSetCollector)?,
        };
        let mut uids = BTreeSet::new();
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(value) = doc.get_first(self.fields.uid) {
                if let Some(uid) = value.as_u64() {
                    uids.insert(uid as Uid);
                }
            }
        }
        Ok(UidIter {
            inner: uids.into_iter(),
        })
    }

    /// Append a header fragment to the UID's document; `name` is the header
    /// name for named headers, or `None` for untagged MIME headers.
    pub fn index_header(&mut self, uid: Uid, name: Option<&str>, data: &[u8]) -> Result<()> {
        let field = match name {
            Some(name) => self.fields.header_field(name),
            None => self.fields.header,
        };
        self.append(uid, field, data)
    }

    /// Append a body fragment to the UID's document
    pub fn index_body(&mut self, uid: Uid, data: &[u8]) -> Result<()> {
        let field = self.fields.body;
        self.append(uid, field, data)
    }

    /// Remove the UID's document from the index
    pub fn expunge(&mut self, uid: Uid) -> Result<()> {
        if self.pending.as_ref().map_or(false, |p| p.uid == uid) {
            self.pending = None;
        }
        self.ensure_writer()?;
        if let Some(writer) = self.writer.as_mut() {
            writer.delete_term(Term::from_field_u64(self.fields.uid, u64::from(uid)));
            writer.commit()?;
        }
        self.reader.reload()?;
        Ok(())
    }

    /// Stage the pending document and commit everything written so far
    pub fn commit(&mut self) -> Result<()> {
        self.stage_pending()?;
        if let Some(writer) = self.writer.as_mut() {
            writer.commit()?;
        }
        self.reader.reload()?;
        Ok(())
    }

    /// Discard the pending document and all uncommitted writes
    pub fn rollback(&mut self) -> Result<()> {
        self.pending = None;
        if let Some(writer) = self.writer.as_mut() {
            writer.rollback()?;
        }
        Ok(())
    }

    /// Force a merge pass over the index's segments
    pub fn optimize(&mut self) -> Result<()> {
        self.commit()?;
        let segments = self.index.searchable_segment_ids()?;
        if segments.len() > 1 {
            self.ensure_writer()?;
            if let Some(writer) = self.writer.as_mut() {
                writer.merge(&segments).wait()?;
            }
        }
        Ok(())
    }

    fn append(&mut self, uid: Uid, field: Field, data: &[u8]) -> Result<()> {
        if self.pending.as_ref().map_or(false, |p| p.uid != uid) {
            self.stage_pending()?;
        }
        let pending = self.pending.get_or_insert_with(|| PendingDoc {
            uid,
            values: Vec::new(),
        });
        let text = String::from_utf8_lossy(data);
        match pending.values.last_mut() {
            Some((last_field, buffer)) if *last_field == field => buffer.push_str(&text),
            _ => pending.values.push((field, text.into_owned())),
        }
        Ok(())
    }

    /// Turn the pending fragments into a document write. Replaces any previous
    /// document for the same UID, so reindexing never duplicates.
    fn stage_pending(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        self.ensure_writer()?;
        let mut doc = TantivyDocument::default();
        doc.add_u64(self.fields.uid, u64::from(pending.uid));
        for (field, text) in &pending.values {
            doc.add_text(*field, text);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.delete_term(Term::from_field_u64(self.fields.uid, u64::from(pending.uid)));
            writer.add_document(doc)?;
        }
        Ok(())
    }

    fn ensure_writer(&mut self) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(self.index.writer(self.writer_heap)?);
        }
        Ok(())
    }
}

/// Destroy the whole index at `path`. Returns false if nothing existed.
pub fn delete_index(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path)?;
    Ok(true)
}

/// Finite, non-restartable ascending iteration over indexed UIDs.
///
/// Stopping early is legal; dropping the iterator releases it.
pub struct UidIter {
    inner: std::collections::btree_set::IntoIter<Uid>,
}

impl Iterator for UidIter {
    type Item = Uid;

    fn next(&mut self) -> Option<Uid> {
        self.inner.next()
    }
}
