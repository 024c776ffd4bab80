//! Dispatch gateway port (driven/secondary port)
//!
//! This module defines the interface the receiver hands decoded metrics
//! and events to. Implementations (aggregators, forwarders, fan-out
//! multiplexers) live outside the receiver.
//!
//! ## Design Notes
//!
//! - Both operations take the receive cycle's [`CancellationToken`] so a
//!   handler can abort cooperatively when the receiver shuts down.
//! - Values are passed by value: once dispatched, the receiver keeps no
//!   reference to them.
//! - [`DispatchError`] separates cancellation/deadline from other
//!   failures; the receive loop stops on the former and only logs the
//!   latter.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{Event, Metric};

// ============================================================================
// DispatchError
// ============================================================================

/// Errors a dispatch handler can return
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The cancellation token fired while dispatching
    #[error("dispatch cancelled")]
    Cancelled,

    /// The handler ran out of time
    #[error("dispatch deadline exceeded")]
    DeadlineExceeded,

    /// Any other handler failure
    #[error("dispatch failed: {0}")]
    Failed(#[from] anyhow::Error),
}

impl DispatchError {
    /// Returns true for cancellation or deadline errors
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DispatchError::Cancelled | DispatchError::DeadlineExceeded)
    }
}

// ============================================================================
// IDispatchGateway trait
// ============================================================================

/// Port trait accepting classified metrics and events
///
/// ## Implementation Notes
///
/// - Must tolerate concurrent calls: several receive loops (one per
///   socket) share a single gateway.
/// - Should return promptly with [`DispatchError::Cancelled`] once
///   `cancel` has fired.
#[async_trait::async_trait]
pub trait IDispatchGateway: Send + Sync {
    /// Accepts one metric
    async fn dispatch_metric(
        &self,
        cancel: &CancellationToken,
        metric: Metric,
    ) -> Result<(), DispatchError>;

    /// Accepts one event
    async fn dispatch_event(
        &self,
        cancel: &CancellationToken,
        event: Event,
    ) -> Result<(), DispatchError>;
}
