// Receipt I/O: amount parsing, canonicalization, tabular + JSON exchange

pub mod amount;
pub mod canonical;
pub mod csv;
pub mod error;
pub mod json;

pub use amount::{format_amount, parse_amount, try_parse_amount};
pub use canonical::{canonicalize, canonicalize_with_total, RawRow};
pub use error::IoError;
pub use json::{receipt_from_json, receipt_to_json, report_to_json};

/// Report JSON schema version.
/// Increment when the document shape changes in a way old readers can't handle.
pub const REPORT_FORMAT_VERSION: u32 = 1;
