use std::fmt;

use splitbill_core::{ItemId, ParticipantId};

/// Rejected ledger mutation. The ledger is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Claim would push the item's assigned units past its count.
    OverAssignment {
        item: ItemId,
        requested: u32,
        already_assigned: u32,
        available: u32,
    },
    /// Item id not on the current receipt.
    UnknownItem(ItemId),
    /// Participant id not in the session.
    UnknownParticipant(ParticipantId),
    /// Claims must cover at least one unit.
    ZeroCount,
    /// Session has no receipt to assign against.
    NoReceipt,
}

impl LedgerError {
    /// True for the not-found family (unknown item or participant).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownItem(_) | Self::UnknownParticipant(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverAssignment { item, requested, already_assigned, available } => write!(
                f,
                "{item}: cannot assign {requested} more, {already_assigned} of {available} already assigned"
            ),
            Self::UnknownItem(item) => write!(f, "unknown {item}"),
            Self::UnknownParticipant(p) => write!(f, "unknown {p}"),
            Self::ZeroCount => write!(f, "assigned count must be at least 1"),
            Self::NoReceipt => write!(f, "no receipt submitted"),
        }
    }
}

impl std::error::Error for LedgerError {}
