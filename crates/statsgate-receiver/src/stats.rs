//! Lock-free receiver health counters
//!
//! [`StatsCounters`] is created once per receiver and shared by `Arc`
//! between every receive loop feeding that receiver. Writers only use
//! atomic add/store, readers only atomic loads, so a snapshot can be
//! taken at any time without blocking the hot path.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use statsgate_core::domain::ReceiverStats;

/// Shared, atomically updated receiver statistics
#[derive(Debug, Default)]
pub struct StatsCounters {
    /// Unix timestamp of the last packet in nanoseconds, 0 when none
    last_packet_nanos: AtomicI64,
    bad_lines: AtomicU64,
    packets_received: AtomicU64,
    metrics_received: AtomicU64,
    events_received: AtomicU64,
}

impl StatsCounters {
    /// Create a zeroed counter set
    pub const fn new() -> Self {
        Self {
            last_packet_nanos: AtomicI64::new(0),
            bad_lines: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            metrics_received: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
        }
    }

    /// Record one successful socket read at `at`
    #[inline]
    pub fn packet_received(&self, at: DateTime<Utc>) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        let nanos = at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.last_packet_nanos.store(nanos, Ordering::Relaxed);
    }

    /// Record one line the lexer rejected
    #[inline]
    pub fn bad_line(&self) {
        self.bad_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a packet's worth of dispatched metrics
    #[inline]
    pub fn add_metrics(&self, n: u64) {
        self.metrics_received.fetch_add(n, Ordering::Relaxed);
    }

    /// Add a packet's worth of dispatched events
    #[inline]
    pub fn add_events(&self, n: u64) {
        self.events_received.fetch_add(n, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot
    ///
    /// Fields are loaded independently; under concurrent writes the
    /// snapshot is not a single consistent cut, but every field is a value
    /// the counter actually held.
    pub fn snapshot(&self) -> ReceiverStats {
        let nanos = self.last_packet_nanos.load(Ordering::Relaxed);
        ReceiverStats {
            last_packet: (nanos != 0).then(|| DateTime::from_timestamp_nanos(nanos)),
            bad_lines: self.bad_lines.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            metrics_received: self.metrics_received.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
        }
    }
}
