//! Line lexer port
//!
//! A lexer turns one protocol line into either a metric or an event.
//! It is a pure function of its inputs: it never sees the packet, the
//! source address or the receiver's extra tags.

use crate::domain::{Event, LexError, Metric};

/// Successful result of lexing one line
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Metric(Metric),
    Event(Event),
}

/// Port trait for the per-line lexer
///
/// ## Contract
///
/// - `Ok(Some(_))`: the line is a metric or an event.
/// - `Err(_)`: the line is malformed; the caller counts it and moves on.
/// - `Ok(None)`: never produced by a correct lexer. Callers treat it as an
///   internal invariant violation.
///
/// A non-empty `namespace` is applied by the lexer as a `namespace.`
/// prefix on metric names.
pub trait ILineLexer: Send + Sync {
    /// Lexes a single line (without its trailing `\n`)
    fn lex(&self, line: &[u8], namespace: &str) -> Result<Option<Parsed>, LexError>;
}
