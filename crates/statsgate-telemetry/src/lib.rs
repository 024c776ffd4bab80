//! statsgate Telemetry - Prometheus exposition of receiver health
//!
//! Provides:
//! - `MetricsRegistry`: gauges mirroring the receiver statistics snapshot
//! - `MetricsServer`: HTTP server for Prometheus scraping

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::MetricsServer;
