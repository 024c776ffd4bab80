//! Domain entities
//!
//! This module contains the core domain types for statsgate:
//! - Newtypes for tags and source addresses
//! - Metric and event entities produced from protocol lines
//! - Receiver statistics snapshot
//! - Domain-specific error types

pub mod errors;
pub mod event;
pub mod metric;
pub mod newtypes;
pub mod stats;

// Re-export commonly used types
pub use errors::{DomainError, LexError};
pub use event::{AlertType, Event, EventPriority};
pub use metric::{Metric, MetricKind};
pub use newtypes::*;
pub use stats::ReceiverStats;
