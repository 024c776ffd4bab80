//! Prometheus metrics registry for statsgate
//!
//! Mirrors the receiver's [`ReceiverStats`] snapshot as gauges, plus a
//! counter of receive loop exits by outcome.

use prometheus::{Encoder, Gauge, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use statsgate_core::domain::ReceiverStats;

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Gauge: datagrams read by all receive loops
    pub packets_received: IntGauge,
    /// Gauge: metrics handed to the dispatch gateway
    pub metrics_received: IntGauge,
    /// Gauge: events handed to the dispatch gateway
    pub events_received: IntGauge,
    /// Gauge: lines the lexer rejected
    pub bad_lines: IntGauge,
    /// Gauge: unix time of the most recent datagram, 0 before the first one
    pub last_packet_timestamp_seconds: Gauge,
    /// Counter: receive loops that stopped, by result (ok, socket, dispatch, ...)
    pub receive_loop_exits_total: IntCounterVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("statsgate".to_string()), None)?;

        let packets_received = IntGauge::new(
            "receiver_packets_received",
            "Datagrams read from the listening sockets",
        )?;
        registry.register(Box::new(packets_received.clone()))?;

        let metrics_received = IntGauge::new(
            "receiver_metrics_received",
            "Metrics dispatched downstream",
        )?;
        registry.register(Box::new(metrics_received.clone()))?;

        let events_received =
            IntGauge::new("receiver_events_received", "Events dispatched downstream")?;
        registry.register(Box::new(events_received.clone()))?;

        let bad_lines = IntGauge::new("receiver_bad_lines", "Lines that failed to parse")?;
        registry.register(Box::new(bad_lines.clone()))?;

        let last_packet_timestamp_seconds = Gauge::new(
            "receiver_last_packet_timestamp_seconds",
            "Unix time of the most recently received datagram",
        )?;
        registry.register(Box::new(last_packet_timestamp_seconds.clone()))?;

        let receive_loop_exits_total = IntCounterVec::new(
            Opts::new("receive_loop_exits_total", "Receive loops that stopped"),
            &["result"],
        )?;
        registry.register(Box::new(receive_loop_exits_total.clone()))?;

        Ok(Self {
            registry,
            packets_received,
            metrics_received,
            events_received,
            bad_lines,
            last_packet_timestamp_seconds,
            receive_loop_exits_total,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Copy a receiver stats snapshot into the gauges.
    pub fn record_receiver_stats(&self, stats: &ReceiverStats) {
        self.packets_received.set(saturating_i64(stats.packets_received));
        self.metrics_received.set(saturating_i64(stats.metrics_received));
        self.events_received.set(saturating_i64(stats.events_received));
        self.bad_lines.set(saturating_i64(stats.bad_lines));

        let last_packet = stats
            .last_packet
            .map(|t| t.timestamp_millis() as f64 / 1000.0)
            .unwrap_or(0.0);
        self.last_packet_timestamp_seconds.set(last_packet);
    }

    /// Record that a receive loop stopped with the given result label.
    pub fn record_loop_exit(&self, result: &str) {
        self.receive_loop_exits_total
            .with_label_values(&[result])
            .inc();
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
