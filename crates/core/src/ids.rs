use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of an item within a receipt. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

/// Identity of a participant within a session. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant#{}", self.0)
    }
}

/// Monotonic id source owned by whoever creates items and participants
/// (a session, or a single canonicalization call).
///
/// Ids start at 1. The counter is atomic so a generator can be shared by
/// reference across threads without handing out duplicates.
#[derive(Debug)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { last: AtomicU64::new(0) }
    }

    /// Continue numbering after `last` (e.g. when resuming a saved session).
    pub fn starting_after(last: u64) -> Self {
        Self { last: AtomicU64::new(last) }
    }

    fn next_raw(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_item(&self) -> ItemId {
        ItemId(self.next_raw())
    }

    pub fn next_participant(&self) -> ParticipantId {
        ParticipantId(self.next_raw())
    }

    /// Last id handed out, 0 if none.
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
