//! Unified error handling for the valix crates.

use thiserror::Error;

/// Unified error type for all valix operations.
///
/// Ordinary validation traffic never errors: deleting an unknown pair or
/// querying an absent key is answered with zero deltas or an empty option.
/// `Error` surfaces only at construction boundaries (bad segment sets,
/// unsupported Arrow types) and for violated internal invariants.
#[derive(Error, Debug)]
pub enum Error {
    /// Arrow library error during columnar data access.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Invalid user input or API parameter.
    ///
    /// The message string says what was invalid and why. These errors are
    /// recoverable; fix the input and retry.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// A requested key or entity does not exist.
    #[error("Key not found")]
    NotFound,

    /// Internal error indicating a bug or unexpected state.
    ///
    /// This should never occur during normal operation; it means a
    /// structural invariant was violated.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
