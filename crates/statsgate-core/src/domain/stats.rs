//! Receiver statistics snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time copy of a receiver's health counters
///
/// All counters are monotonically non-decreasing over the life of the
/// receiver that produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverStats {
    /// When the last datagram was read, `None` before the first one
    pub last_packet: Option<DateTime<Utc>>,
    /// Lines the lexer rejected
    pub bad_lines: u64,
    /// Successful socket reads
    pub packets_received: u64,
    /// Metrics handed to the dispatch gateway
    pub metrics_received: u64,
    /// Events handed to the dispatch gateway
    pub events_received: u64,
}
