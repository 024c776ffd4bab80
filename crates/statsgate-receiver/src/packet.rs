//! Datagram to dispatch: split, lex, enrich, dispatch
//!
//! A [`PacketParser`] turns one datagram into a sequence of dispatched
//! metrics and events.
//!
//! ## Per-packet rules
//!
//! - Lines are separated by `\n`. The last line needs no terminator.
//! - Lines of one byte or less are skipped without being lexed or counted.
//! - Lex errors are counted as bad lines and never stop the packet.
//! - Lines are dispatched one at a time, in textual order. The first
//!   dispatch error stops the packet; earlier lines stay dispatched.
//! - Metric/event counts are flushed to [`StatsCounters`] once per packet,
//!   whether the packet completed or not.

use std::sync::Arc;

use chrono::Utc;
use statsgate_core::domain::{SourceIp, Tags};
use statsgate_core::ports::{IDispatchGateway, ILineLexer, Parsed};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::stats::StatsCounters;
use crate::ReceiveError;

/// Splits datagrams into lines and drives the lexer and dispatch gateway
pub struct PacketParser {
    /// Prefix handed to the lexer for metric names
    namespace: String,
    /// Tags appended to every dispatched unit
    tags: Tags,
    lexer: Arc<dyn ILineLexer>,
    handler: Arc<dyn IDispatchGateway>,
    stats: Arc<StatsCounters>,
}

impl PacketParser {
    /// Creates a new `PacketParser`
    ///
    /// `namespace` and `tags` are fixed for the parser's lifetime.
    pub fn new(
        namespace: impl Into<String>,
        tags: impl Into<Tags>,
        lexer: Arc<dyn ILineLexer>,
        handler: Arc<dyn IDispatchGateway>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            tags: tags.into(),
            lexer,
            handler,
            stats,
        }
    }

    /// Returns the configured namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the configured receiver tags
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Handles the contents of one datagram received from `peer`
    ///
    /// `peer` is the textual transport address (`host:port`). When no host
    /// can be extracted from it the packet is still processed, without a
    /// source IP.
    ///
    /// # Errors
    ///
    /// - [`ReceiveError::Dispatch`] with the first error the gateway returned
    /// - [`ReceiveError::Internal`] when the lexer returned neither a value
    ///   nor an error
    pub async fn handle_packet(
        &self,
        cancel: &CancellationToken,
        peer: &str,
        msg: &[u8],
    ) -> Result<(), ReceiveError> {
        let source_ip = match SourceIp::from_peer_addr(peer) {
            Ok(ip) => Some(ip),
            Err(e) => {
                error!(peer = %peer, error = %e, "Cannot parse source address");
                None
            }
        };

        let mut counts = PacketCounts::default();
        let result = self
            .dispatch_lines(cancel, peer, source_ip.as_ref(), msg, &mut counts)
            .await;

        self.stats.add_metrics(counts.metrics);
        self.stats.add_events(counts.events);

        result
    }

    async fn dispatch_lines(
        &self,
        cancel: &CancellationToken,
        peer: &str,
        source_ip: Option<&SourceIp>,
        msg: &[u8],
        counts: &mut PacketCounts,
    ) -> Result<(), ReceiveError> {
        for line in msg.split(|b| *b == b'\n') {
            if line.len() <= 1 {
                continue;
            }

            let parsed = match self.lexer.lex(line, &self.namespace) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => {
                    return Err(ReceiveError::Internal(format!(
                        "lexer returned neither metric nor event for line {:?}",
                        String::from_utf8_lossy(line)
                    )));
                }
                Err(e) => {
                    // debug level: malformed input must not flood the logs
                    debug!(
                        line = %String::from_utf8_lossy(line),
                        peer = %peer,
                        error = %e,
                        "Error parsing line"
                    );
                    self.stats.bad_line();
                    continue;
                }
            };

            match parsed {
                Parsed::Metric(mut metric) => {
                    metric.tags.extend_from(&self.tags);
                    metric.source_ip = source_ip.cloned();
                    counts.metrics += 1;
                    self.handler.dispatch_metric(cancel, metric).await?;
                }
                Parsed::Event(mut event) => {
                    event.tags.extend_from(&self.tags);
                    event.source_ip = source_ip.cloned();
                    if event.date_happened == 0 {
                        event.date_happened = Utc::now().timestamp();
                    }
                    counts.events += 1;
                    self.handler.dispatch_event(cancel, event).await?;
                }
            }
        }

        Ok(())
    }
}

/// Units handed to the gateway while processing one packet
#[derive(Debug, Default)]
struct PacketCounts {
    metrics: u64,
    events: u64,
}
