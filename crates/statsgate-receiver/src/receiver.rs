//! Per-socket receive loop
//!
//! [`MetricReceiver::receive`] reads datagrams one at a time and hands each
//! to its [`PacketParser`]. Packets from one socket are processed strictly
//! in order; run one loop per socket for parallelism, sharing a single
//! [`StatsCounters`].

use std::io;
use std::sync::Arc;

use chrono::Utc;
use statsgate_core::domain::{ReceiverStats, Tags};
use statsgate_core::ports::{IDispatchGateway, ILineLexer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::packet::PacketParser;
use crate::socket::PacketSocket;
use crate::stats::StatsCounters;
use crate::ReceiveError;

/// Largest datagram the loop reads in one call (theoretical UDP maximum)
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Reads datagrams from a socket and feeds them to a [`PacketParser`]
pub struct MetricReceiver {
    parser: PacketParser,
    stats: Arc<StatsCounters>,
}

impl MetricReceiver {
    /// Creates a new `MetricReceiver`
    ///
    /// `stats` may be shared with other receivers bound to other sockets.
    pub fn new(
        namespace: impl Into<String>,
        tags: impl Into<Tags>,
        lexer: Arc<dyn ILineLexer>,
        handler: Arc<dyn IDispatchGateway>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        let parser = PacketParser::new(namespace, tags, lexer, handler, Arc::clone(&stats));
        Self { parser, stats }
    }

    /// Point-in-time copy of the receiver counters
    pub fn stats(&self) -> ReceiverStats {
        self.stats.snapshot()
    }

    /// The packet parser driven by this receiver
    pub fn parser(&self) -> &PacketParser {
        &self.parser
    }

    /// Runs the receive loop until the socket fails or a cancellation
    /// escapes packet handling
    ///
    /// The cancellation token is consulted only after a non-transient read
    /// error: if it has fired the error is the expected result of shutdown
    /// and `Ok(())` is returned. Stopping a loop therefore means cancelling
    /// the token and then closing the socket.
    ///
    /// # Errors
    ///
    /// - [`ReceiveError::Socket`] when a read fails permanently before
    ///   cancellation
    /// - [`ReceiveError::Dispatch`] when dispatch reported cancellation or a
    ///   deadline
    pub async fn receive<S>(&self, cancel: &CancellationToken, socket: &S) -> Result<(), ReceiveError>
    where
        S: PacketSocket + ?Sized,
    {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(read) => read,
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, "Temporary error reading from socket");
                    continue;
                }
                Err(e) => {
                    if cancel.is_cancelled() {
                        info!("Receive loop stopped");
                        return Ok(());
                    }
                    return Err(ReceiveError::Socket(e));
                }
            };

            self.stats.packet_received(Utc::now());

            let peer = peer.to_string();
            if let Err(e) = self.parser.handle_packet(cancel, &peer, &buf[..len]).await {
                if e.is_cancellation() {
                    return Err(e);
                }
                match e {
                    ReceiveError::Internal(_) => {
                        error!(peer = %peer, error = %e, "Packet abandoned");
                    }
                    _ => {
                        warn!(peer = %peer, error = %e, "Error handling packet");
                    }
                }
            } else {
                debug!(peer = %peer, bytes = len, "Packet handled");
            }
        }
    }
}

/// Read errors the socket layer is expected to recover from on its own
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
    )
}
