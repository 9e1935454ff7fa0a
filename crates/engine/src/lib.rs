//! `splitbill-engine`: who claimed what, and what everyone owes.
//!
//! Pure engine crate: receives a canonical receipt and a roster, returns a
//! report. No parsing, no IO.

pub mod error;
pub mod ledger;
pub mod session;
pub mod split;

pub use error::LedgerError;
pub use ledger::{Assignment, AssignmentLedger};
pub use session::{BillSession, SessionId, SessionRegistry};
pub use split::{compute_report, ParticipantReport, Report, ReportLine};
