//! `splitbill-core`: canonical receipt types shared by every other crate.
//!
//! No parsing, no IO. The types do not validate themselves: receipts built
//! by the canonicalizer in `splitbill-io` have `count >= 1` and a
//! non-negative `total_price` on every item.

pub mod ids;
pub mod model;

pub use ids::{IdGenerator, ItemId, ParticipantId};
pub use model::{Item, Participant, ParticipantRoster, Receipt};
