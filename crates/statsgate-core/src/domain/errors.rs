//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! address extraction and line lexing.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Source address has no `host:port` separator
    #[error("Cannot parse source address: {0}")]
    InvalidSourceAddress(String),
}

/// Errors produced while lexing a single protocol line
///
/// These are always recoverable: the receiver counts them as bad lines
/// and moves on to the next line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    /// Line is not valid UTF-8
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    /// Metric name is empty
    #[error("empty metric name")]
    EmptyName,

    /// No `:` between name and value
    #[error("missing value separator")]
    MissingValue,

    /// No `|<type>` section
    #[error("missing metric type")]
    MissingType,

    /// Unknown metric type token
    #[error("unknown metric type: {0}")]
    UnknownType(String),

    /// Value could not be parsed as a number
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Sample rate could not be parsed or is outside (0, 1]
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(String),

    /// Event header (`_e{title,text}:`) is malformed
    #[error("invalid event header: {0}")]
    InvalidEventHeader(String),

    /// Event title/text lengths do not match the payload
    #[error("event length mismatch: expected {expected} bytes, found {found}")]
    EventLengthMismatch {
        /// Bytes announced by the header
        expected: usize,
        /// Bytes available in the line
        found: usize,
    },

    /// A `|x:` field the lexer does not understand
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A field with an invalid value (priority, alert type, timestamp)
    #[error("invalid field {field}: {value}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Offending raw value
        value: String,
    },
}
