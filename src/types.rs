//! Core types used throughout the search subsystem

use crate::uidset::UidSet;

/// Message UID (unique within a mailbox, monotonically assigned by the store,
/// never reused; 0 is reserved as the "no value" sentinel)
pub type Uid = u32;

/// Mailbox name
pub type MailboxName = String;

/// Outcome of asking the index whether it contains a UID.
///
/// Modeled as an explicit three-variant enum so that "the index does not exist
/// at all" can never be mistaken for "the message is not indexed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UidLookup {
    /// No index exists for the bound mailbox
    NoIndex,
    /// The index exists but holds no document for this UID
    Absent,
    /// The index holds a document for this UID
    Present,
}

/// Key identifying which fragment of a message an update session is building.
///
/// One key is active at a time; setting a new key implicitly ends the previous
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildKey {
    /// A named message header
    Header { uid: Uid, name: String },
    /// A MIME part header, indexed without a header name
    MimeHeader { uid: Uid },
    /// A decoded body part
    BodyPart { uid: Uid },
    /// A binary body part. Upstream filtering guarantees these never reach the
    /// build pipeline; receiving one is a programming-contract violation.
    BodyPartBinary { uid: Uid },
}

impl BuildKey {
    pub fn uid(&self) -> Uid {
        match self {
            BuildKey::Header { uid, .. }
            | BuildKey::MimeHeader { uid }
            | BuildKey::BodyPart { uid }
            | BuildKey::BodyPartBinary { uid } => *uid,
        }
    }
}

/// Search-argument tree, opaque to the reconciliation core and forwarded to the
/// query compiler.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    All,
    /// Match against every indexed field
    Text(String),
    From(String),
    To(String),
    Cc(String),
    Bcc(String),
    Subject(String),
    /// Match against an arbitrary header by name
    Header(String, String),
    Body(String),
    Uid(Vec<Uid>),
    And(Box<SearchQuery>, Box<SearchQuery>),
    Or(Box<SearchQuery>, Box<SearchQuery>),
    Not(Box<SearchQuery>),
}

/// Boolean modifiers applied when compiling a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFlags {
    /// Allow fuzzy matching of single-term text queries
    pub fuzzy: bool,
}

/// Per-mailbox result of a lookup: the UIDs the engine is certain match
#[derive(Debug, Clone)]
pub struct MailboxMatches {
    pub mailbox: MailboxName,
    pub definite_uids: UidSet,
}

/// Ordered, length-carrying sequence of per-mailbox results
#[derive(Debug, Clone, Default)]
pub struct LookupResults {
    pub boxes: Vec<MailboxMatches>,
}
