//! CLI Exit Code Registry
//!
//! Single source of truth for the exit codes of `shipledger`. Scripts that
//! schedule reconciliation runs branch on these, so they are part of the shell
//! contract.
//!
//! | Code | Meaning                                                     |
//! |------|-------------------------------------------------------------|
//! | 0    | Success                                                     |
//! | 1    | General error (unspecified)                                 |
//! | 2    | Usage error (bad args, no config found)                     |
//! | 3    | Discrepancies found (only with `--fail-on-discrepancy`)     |
//! | 4    | Invalid config                                              |
//! | 5    | Runtime error (unreadable input, store IO, upstream source) |
//! | 6    | Consistency violation (reimbursement collision)             |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure. Prefer a specific code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing config file.
pub const EXIT_USAGE: u8 = 2;

/// The run finished but at least one cluster is short.
pub const EXIT_DISCREPANCIES: u8 = 3;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Input files, the cluster store or an upstream source failed.
pub const EXIT_RUNTIME: u8 = 5;

/// Non-portal reimbursements overlap portal data. Nothing was persisted.
pub const EXIT_CONSISTENCY: u8 = 6;
