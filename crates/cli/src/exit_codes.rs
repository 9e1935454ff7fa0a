//! CLI Exit Code Registry
//!
//! Single source of truth for the exit codes of `splitbill`. Scripts rely on
//! them, so codes are never reused for a different meaning.
//!
//! | Range | Domain     | Description                                |
//! |-------|------------|--------------------------------------------|
//! | 0     | Universal  | Success                                    |
//! | 1     | Universal  | General error (unspecified)                |
//! | 2     | Universal  | Usage error (bad args, malformed input)    |
//! | 3     | Universal  | File could not be read or written          |
//! | 10-19 | extract    | Backend configuration and extraction       |
//! | 20-29 | split      | Assignment ledger rejections               |

use splitbill_engine::LedgerError;
use splitbill_extract::ExtractError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Unspecified failure. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments or malformed input files.
pub const EXIT_USAGE: u8 = 2;

/// Input could not be read or output could not be written.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Extract (10-19)
// =============================================================================

/// Backend unknown, missing its API key, or missing its program.
pub const EXIT_CONFIGURATION: u8 = 10;

/// Backend failed or no decoder could read its output.
pub const EXIT_EXTRACTION: u8 = 11;

// =============================================================================
// Split (20-29)
// =============================================================================

/// Claims exceed an item's count.
pub const EXIT_OVER_ASSIGNMENT: u8 = 20;

/// Assignment names an item or participant that does not exist.
pub const EXIT_NOT_FOUND: u8 = 21;

pub fn extract_exit_code(err: &ExtractError) -> u8 {
    match err {
        ExtractError::Configuration(_) => EXIT_CONFIGURATION,
        ExtractError::Io(_) => EXIT_IO,
        ExtractError::Backend(_) | ExtractError::Undecodable { .. } => EXIT_EXTRACTION,
    }
}

pub fn ledger_exit_code(err: &LedgerError) -> u8 {
    match err {
        LedgerError::OverAssignment { .. } => EXIT_OVER_ASSIGNMENT,
        LedgerError::UnknownItem(_) | LedgerError::UnknownParticipant(_) => EXIT_NOT_FOUND,
        LedgerError::ZeroCount => EXIT_USAGE,
        LedgerError::NoReceipt => EXIT_ERROR,
    }
}
