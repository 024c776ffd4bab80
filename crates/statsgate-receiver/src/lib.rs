//! statsgate Receiver - UDP line-protocol ingestion
//!
//! Provides:
//! - The receive loop reading datagrams from a connectionless socket
//! - Packet splitting, enrichment and ordered dispatch
//! - Lock-free receiver statistics
//! - A DogStatsD line lexer
//!
//! ## Modules
//!
//! - [`receiver`] - [`MetricReceiver`], the per-socket receive loop
//! - [`packet`] - [`PacketParser`], one datagram to many dispatched units
//! - [`stats`] - [`StatsCounters`], shared atomic counters
//! - [`lexer`] - [`StatsdLexer`], the default [`ILineLexer`](statsgate_core::ports::ILineLexer)
//! - [`socket`] - [`PacketSocket`] seam and UDP socket construction

pub mod lexer;
pub mod packet;
pub mod receiver;
pub mod socket;
pub mod stats;

#[cfg(test)]
mod test_support;

use statsgate_core::ports::DispatchError;
use thiserror::Error;

pub use lexer::StatsdLexer;
pub use packet::PacketParser;
pub use receiver::{MetricReceiver, MAX_DATAGRAM_SIZE};
pub use socket::{bind_udp, ClosableUdpSocket, PacketSocket};
pub use stats::StatsCounters;

/// Errors that can escape packet handling or the receive loop
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The socket failed with a non-transient error
    #[error("non-temporary error reading from socket: {0}")]
    Socket(#[source] std::io::Error),

    /// The dispatch gateway failed; remaining lines of the packet were dropped
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The lexer broke its contract; the packet was abandoned
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReceiveError {
    /// Returns true when the error carries a cancellation or deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ReceiveError::Dispatch(e) if e.is_cancellation())
    }
}
