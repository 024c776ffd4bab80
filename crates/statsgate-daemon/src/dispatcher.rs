//! Dispatch gateway that writes every unit to the log
//!
//! Stands in for a downstream aggregator. Each call honours the caller's
//! cancellation token and an optional per-call deadline.

use std::future::Future;
use std::time::Duration;

use anyhow::bail;
use statsgate_core::config::DispatchConfig;
use statsgate_core::domain::{Event, Metric, SourceIp};
use statsgate_core::ports::{DispatchError, IDispatchGateway};
use tokio_util::sync::CancellationToken;

/// Severity used for dispatched units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchLevel {
    Trace,
    Debug,
    Info,
}

impl std::str::FromStr for DispatchLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(DispatchLevel::Trace),
            "debug" => Ok(DispatchLevel::Debug),
            "info" => Ok(DispatchLevel::Info),
            other => bail!("unsupported dispatch log level '{other}'"),
        }
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            DispatchLevel::Trace => tracing::trace!($($arg)+),
            DispatchLevel::Debug => tracing::debug!($($arg)+),
            DispatchLevel::Info => tracing::info!($($arg)+),
        }
    };
}

/// [`IDispatchGateway`] that logs metrics and events
#[derive(Debug, Clone)]
pub struct LoggingDispatcher {
    level: DispatchLevel,
    timeout: Option<Duration>,
}

impl LoggingDispatcher {
    pub fn new(level: DispatchLevel, timeout: Option<Duration>) -> Self {
        Self { level, timeout }
    }

    /// Builds a dispatcher from the `dispatch` config section
    ///
    /// A `timeout_ms` of 0 disables the per-call deadline.
    pub fn from_config(config: &DispatchConfig) -> anyhow::Result<Self> {
        let level = config.log_level.parse()?;
        let timeout = (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms));
        Ok(Self::new(level, timeout))
    }

    pub fn level(&self) -> DispatchLevel {
        self.level
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait::async_trait]
impl IDispatchGateway for LoggingDispatcher {
    async fn dispatch_metric(
        &self,
        cancel: &CancellationToken,
        metric: Metric,
    ) -> Result<(), DispatchError> {
        guarded(cancel, self.timeout, async {
            log_at!(
                self.level,
                name = %metric.name,
                kind = %metric.kind,
                value = metric.value,
                string_value = %metric.string_value,
                sample_rate = metric.sample_rate,
                tags = %metric.tags,
                source_ip = source_ip(&metric.source_ip),
                "Metric"
            );
            Ok(())
        })
        .await
    }

    async fn dispatch_event(
        &self,
        cancel: &CancellationToken,
        event: Event,
    ) -> Result<(), DispatchError> {
        guarded(cancel, self.timeout, async {
            log_at!(
                self.level,
                title = %event.title,
                text = %event.text,
                date_happened = event.date_happened,
                hostname = %event.hostname,
                priority = %event.priority,
                alert_type = %event.alert_type,
                tags = %event.tags,
                source_ip = source_ip(&event.source_ip),
                "Event"
            );
            Ok(())
        })
        .await
    }
}

fn source_ip(ip: &Option<SourceIp>) -> &str {
    ip.as_ref().map(SourceIp::as_str).unwrap_or("")
}

/// Runs `fut` unless `cancel` fires first or `timeout` elapses
async fn guarded<F>(
    cancel: &CancellationToken,
    timeout: Option<Duration>,
    fut: F,
) -> Result<(), DispatchError>
where
    F: Future<Output = Result<(), DispatchError>>,
{
    if cancel.is_cancelled() {
        return Err(DispatchError::Cancelled);
    }

    let work = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DispatchError::DeadlineExceeded)?,
            None => fut.await,
        }
    };

    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(DispatchError::Cancelled),
        result = work => result,
    }
}
