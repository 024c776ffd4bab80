//! statsgate Daemon - DogStatsD UDP receiver service
//!
//! This binary runs as a long-lived service and handles:
//! - Binding the configured UDP listen addresses
//! - One receive loop per socket, all sharing one set of counters
//! - Periodic statistics reporting (log and Prometheus)
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Every receive loop, the stats reporter and the metrics server observe a
//! single `CancellationToken` that is triggered on receipt of SIGTERM or
//! SIGINT, or when a receive loop fails. After cancellation the sockets are
//! closed, which makes their pending reads fail and the loops return.

mod dispatcher;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use statsgate_core::config::{Config, LoggingConfig};
use statsgate_core::ports::{IDispatchGateway, ILineLexer};
use statsgate_receiver::{
    bind_udp, ClosableUdpSocket, MetricReceiver, ReceiveError, StatsCounters, StatsdLexer,
};
use statsgate_telemetry::{MetricsRegistry, MetricsServer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::dispatcher::LoggingDispatcher;

// ============================================================================
// CLI
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "statsgated", version, about = "DogStatsD UDP metrics receiver")]
struct Cli {
    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================================
// DaemonService
// ============================================================================

/// A bound socket and the receive loop reading from it
struct Listener {
    addr: SocketAddr,
    socket: Arc<ClosableUdpSocket>,
    receiver: Arc<MetricReceiver>,
}

/// Main daemon service that owns the sockets and background tasks
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Counters shared by every receive loop
    stats: Arc<StatsCounters>,
    /// Prometheus registry, present when telemetry is enabled
    metrics: Option<Arc<MetricsRegistry>>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
    /// Closes every listening socket once shutdown has been signalled
    close_sockets: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let metrics = if config.telemetry.enabled {
            Some(Arc::new(
                MetricsRegistry::new().context("Failed to create metrics registry")?,
            ))
        } else {
            None
        };

        Ok(Self {
            config,
            stats: Arc::new(StatsCounters::new()),
            metrics,
            shutdown,
            close_sockets: CancellationToken::new(),
        })
    }

    /// Binds `sockets_per_address` sockets on every listen address
    fn bind_listeners(&self) -> Result<Vec<Listener>> {
        let receiver_config = &self.config.receiver;
        let lexer: Arc<dyn ILineLexer> = Arc::new(StatsdLexer);
        let dispatcher: Arc<dyn IDispatchGateway> = Arc::new(
            LoggingDispatcher::from_config(&self.config.dispatch)
                .context("Invalid dispatch configuration")?,
        );
        let reuse_port = receiver_config.sockets_per_address > 1;

        let mut listeners = Vec::new();
        for address in &receiver_config.listen_addresses {
            let addr: SocketAddr = address
                .parse()
                .with_context(|| format!("Invalid listen address '{address}'"))?;

            for _ in 0..receiver_config.sockets_per_address {
                let udp = bind_udp(addr, reuse_port, receiver_config.recv_buffer_size)
                    .with_context(|| format!("Failed to bind UDP socket on {addr}"))?;
                let socket = Arc::new(ClosableUdpSocket::new(udp, self.close_sockets.clone()));
                let local = socket.local_addr().unwrap_or(addr);

                let receiver = Arc::new(MetricReceiver::new(
                    receiver_config.namespace.clone(),
                    receiver_config.tags.clone(),
                    Arc::clone(&lexer),
                    Arc::clone(&dispatcher),
                    Arc::clone(&self.stats),
                ));

                info!(addr = %local, "Listening for metrics");
                listeners.push(Listener {
                    addr: local,
                    socket,
                    receiver,
                });
            }
        }

        Ok(listeners)
    }

    /// Runs the daemon until shutdown, returning the first fatal loop error
    async fn run(&self) -> Result<()> {
        let listeners = self.bind_listeners()?;

        let loops: Vec<(SocketAddr, JoinHandle<Result<(), ReceiveError>>)> = listeners
            .iter()
            .map(|listener| (listener.addr, self.spawn_receive_loop(listener)))
            .collect();

        let reporter = self.spawn_stats_reporter();
        let server = self.spawn_metrics_server()?;

        self.shutdown.cancelled().await;
        info!("Shutting down receive loops");
        self.close_sockets.cancel();

        let mut first_error = None;
        for (addr, handle) in loops {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(addr = %addr, error = %e, "Receive loop panicked");
                    first_error.get_or_insert_with(|| anyhow!("receive loop on {addr} panicked"));
                    continue;
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_loop_exit(exit_label(&result));
            }
            match result {
                Ok(()) => {}
                Err(e) if e.is_cancellation() => {}
                Err(e) => {
                    first_error.get_or_insert_with(|| {
                        anyhow::Error::new(e).context(format!("receive loop on {addr} failed"))
                    });
                }
            }
        }

        if let Err(e) = reporter.await {
            warn!(error = %e, "Stats reporter task failed");
        }
        if let Some(server) = server {
            match server.await {
                Ok(Err(e)) => warn!(error = %e, "Metrics server failed"),
                Err(e) => warn!(error = %e, "Metrics server task failed"),
                Ok(Ok(())) => {}
            }
        }

        self.report_stats();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn spawn_receive_loop(&self, listener: &Listener) -> JoinHandle<Result<(), ReceiveError>> {
        let receiver = Arc::clone(&listener.receiver);
        let socket = Arc::clone(&listener.socket);
        let shutdown = self.shutdown.clone();
        let addr = listener.addr;

        tokio::spawn(async move {
            let result = receiver.receive(&shutdown, socket.as_ref()).await;
            log_loop_exit(addr, &result);
            if result.is_err() {
                // a stopped loop takes the whole daemon down
                shutdown.cancel();
            }
            result
        })
    }

    // ========================================================================
    // Periodic statistics reporting
    // ========================================================================

    /// Logs the counters and refreshes the Prometheus gauges on every tick
    fn spawn_stats_reporter(&self) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);
        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();
        let period = Duration::from_secs(self.config.telemetry.report_interval_secs);

        info!(report_interval_secs = period.as_secs(), "Starting stats reporter");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        report(&stats, metrics.as_deref());
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    fn report_stats(&self) {
        report(&self.stats, self.metrics.as_deref());
    }

    fn spawn_metrics_server(&self) -> Result<Option<JoinHandle<Result<()>>>> {
        let Some(metrics) = &self.metrics else {
            info!("Telemetry disabled, metrics server not started");
            return Ok(None);
        };

        let server = MetricsServer::new(Arc::clone(metrics), &self.config.telemetry.endpoint)
            .context("Invalid telemetry endpoint")?;
        let shutdown = self.shutdown.clone();

        Ok(Some(tokio::spawn(async move { server.run(shutdown).await })))
    }
}

fn report(stats: &StatsCounters, metrics: Option<&MetricsRegistry>) {
    let snapshot = stats.snapshot();
    info!(
        packets_received = snapshot.packets_received,
        metrics_received = snapshot.metrics_received,
        events_received = snapshot.events_received,
        bad_lines = snapshot.bad_lines,
        last_packet = ?snapshot.last_packet,
        "Receiver stats"
    );
    if let Some(metrics) = metrics {
        metrics.record_receiver_stats(&snapshot);
    }
}

/// Logs how a receive loop ended; cancellation is part of a normal shutdown
fn log_loop_exit(addr: SocketAddr, result: &Result<(), ReceiveError>) {
    match result {
        Ok(()) => info!(addr = %addr, "Receive loop stopped"),
        Err(e) if e.is_cancellation() => {
            info!(addr = %addr, error = %e, "Receive loop cancelled");
        }
        Err(e) => error!(addr = %addr, error = %e, "Receive loop terminated"),
    }
}

/// Label for the loop exit counter
fn exit_label(result: &Result<(), ReceiveError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(e) if e.is_cancellation() => "cancelled",
        Err(ReceiveError::Socket(_)) => "socket",
        Err(ReceiveError::Dispatch(_)) => "dispatch",
        Err(ReceiveError::Internal(_)) => "internal",
    }
}

// ============================================================================
// Configuration and tracing
// ============================================================================

/// Loads and validates the configuration
///
/// An explicit `--config` file must exist; the default path falls back to
/// built-in defaults when absent.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", details.join("\n  "));
    }

    Ok(config)
}

/// Maps `-v` occurrences onto the configured level
fn filter_directive(logging: &LoggingConfig, verbose: u8) -> &str {
    match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let filter = filter_directive(logging, verbose);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    let result = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
        _ = token.cancelled() => return,
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging, cli.verbose)?;

    info!("statsgate daemon starting (statsgated)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone())?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("statsgate daemon shut down gracefully"),
        Err(e) => error!(error = %e, "statsgate daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
