//! Error types for curve parameters and report output.

use thiserror::Error;

/// Errors raised while configuring or writing a collision curve
#[derive(Error, Debug)]
pub enum BirthdayError
{
    /// Hash width outside 1..=64 bits
    #[error("Invalid hash width: {0} bits (expected 1..=64)")]
    InvalidBits(u32),

    /// Trial bound of zero
    #[error("Invalid trial bound: must be at least 1")]
    InvalidMaxTrials,

    /// Tolerance that is negative, not finite, or not below 1
    #[error("Invalid tolerance: {0} (expected 0 <= tolerance < 1)")]
    InvalidTolerance(f64),

    /// Unknown report format name
    #[error("Invalid output format: {0} (expected plain or csv)")]
    InvalidFormat(String),

    /// Failure writing the report
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, BirthdayError>`
pub type Result<T> = std::result::Result<T, BirthdayError>;
