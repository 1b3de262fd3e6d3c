//! # Error Types
//!
//! Structural errors raised while decoding wire documents.

use thiserror::Error;

/// Errors raised when a compact record or document field cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Record does not have the expected number of colon-separated fields.
    #[error("Malformed {kind} record: expected {expected} fields, got {actual} in '{raw}'")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
        raw: String,
    },

    /// A numeric field could not be parsed.
    #[error("Invalid number in {kind} record: '{value}'")]
    InvalidNumber { kind: &'static str, value: String },

    /// A blockstamp is not of the form `number-HASH`.
    #[error("Invalid blockstamp: '{0}'")]
    InvalidBlockstamp(String),

    /// Unknown input source type (only `D` and `T` exist).
    #[error("Invalid source type '{0}', expected D or T")]
    InvalidSourceType(String),

    /// An unlock parameter is malformed, such as `SIG(x)` with a non-numeric index.
    #[error("Invalid unlock parameter: '{0}'")]
    InvalidUnlock(String),

    /// A field that must be non-empty is empty.
    #[error("Empty {0} field")]
    EmptyField(&'static str),
}

/// Result alias for wire decoding.
pub type ParseResult<T> = Result<T, ParseError>;
