//! Ordered set of message UIDs
//!
//! Used for the mailbox's live UID snapshot and for the "seen" and "missing"
//! bookkeeping during reconciliation.

use std::collections::BTreeSet;

use crate::types::Uid;

/// An ordered set of unique message UIDs.
///
/// Insertion order is irrelevant; iteration is always ascending numeric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidSet {
    uids: BTreeSet<Uid>,
}

impl UidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a UID to the set. Returns false if it was already present.
    pub fn insert(&mut self, uid: Uid) -> bool {
        debug_assert!(uid != 0, "0 is not a valid UID");
        self.uids.insert(uid)
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.uids.contains(&uid)
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    /// Ascending iteration over the UIDs in the set
    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.uids.iter().copied()
    }

    /// The highest UID in the set, if any
    pub fn last(&self) -> Option<Uid> {
        self.uids.iter().next_back().copied()
    }
}

impl FromIterator<Uid> for UidSet {
    fn from_iter<I: IntoIterator<Item = Uid>>(iter: I) -> Self {
        Self {
            uids: iter.into_iter().collect(),
        }
    }
}
