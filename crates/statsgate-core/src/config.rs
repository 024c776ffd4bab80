//! Configuration module for statsgate.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for statsgate.
///
/// Every section is optional in the YAML file; missing sections take
/// their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub receiver: ReceiverConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub dispatch: DispatchConfig,
}

/// UDP receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Addresses to bind, e.g. `"0.0.0.0:8125"`.
    pub listen_addresses: Vec<String>,
    /// Sockets bound per address. Values above 1 use SO_REUSEPORT.
    pub sockets_per_address: usize,
    /// Requested kernel receive buffer (SO_RCVBUF) in bytes.
    pub recv_buffer_size: usize,
    /// Prefix applied to every metric name.
    pub namespace: String,
    /// Tags appended to every metric and event.
    pub tags: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Self-monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether to serve Prometheus metrics.
    pub enabled: bool,
    /// Address of the `/metrics` endpoint.
    pub endpoint: String,
    /// Seconds between receiver stats reports.
    pub report_interval_secs: u64,
}

/// Settings for the built-in logging dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Level dispatched units are logged at: `trace`, `debug`, or `info`.
    pub log_level: String,
    /// Per-call deadline in milliseconds. 0 disables it.
    pub timeout_ms: u64,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/statsgate/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("statsgate")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default statsd port.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8125";

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addresses: vec![DEFAULT_LISTEN_ADDRESS.to_string()],
            sockets_per_address: 1,
            recv_buffer_size: 4 * 1024 * 1024,
            namespace: String::new(),
            tags: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "127.0.0.1:9102".to_string(),
            report_interval_secs: 60,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            timeout_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"receiver.namespace"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Valid values for `dispatch.log_level`.
const VALID_DISPATCH_LOG_LEVELS: &[&str] = &["trace", "debug", "info"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- receiver ---
        if self.receiver.listen_addresses.is_empty() {
            errors.push(ValidationError {
                field: "receiver.listen_addresses".into(),
                message: "at least one address is required".into(),
            });
        }
        for addr in &self.receiver.listen_addresses {
            if addr.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError {
                    field: "receiver.listen_addresses".into(),
                    message: format!("invalid socket address '{addr}'"),
                });
            }
        }
        if self.receiver.sockets_per_address == 0 || self.receiver.sockets_per_address > 64 {
            errors.push(ValidationError {
                field: "receiver.sockets_per_address".into(),
                message: "must be in range 1..=64".into(),
            });
        }
        if self.receiver.recv_buffer_size == 0 {
            errors.push(ValidationError {
                field: "receiver.recv_buffer_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.receiver.namespace.ends_with('.') {
            errors.push(ValidationError {
                field: "receiver.namespace".into(),
                message: "must not end with '.'; the separator is added automatically".into(),
            });
        }
        if let Some(tag) = self.receiver.tags.iter().find(|t| t.trim().is_empty()) {
            errors.push(ValidationError {
                field: "receiver.tags".into(),
                message: format!("empty tag '{tag}'"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- telemetry ---
        if self.telemetry.enabled && self.telemetry.endpoint.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "telemetry.endpoint".into(),
                message: format!("invalid socket address '{}'", self.telemetry.endpoint),
            });
        }
        if self.telemetry.report_interval_secs == 0 {
            errors.push(ValidationError {
                field: "telemetry.report_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- dispatch ---
        if !VALID_DISPATCH_LOG_LEVELS.contains(&self.dispatch.log_level.as_str()) {
            errors.push(ValidationError {
                field: "dispatch.log_level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.dispatch.log_level,
                    VALID_DISPATCH_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use statsgate_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .listen_address("127.0.0.1:8125")
///     .namespace("app")
///     .tag("env:prod")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
    addresses_overridden: bool,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with defaults.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            addresses_overridden: false,
        }
    }

    // -- receiver --

    /// Add a listen address. The first call replaces the default address.
    pub fn listen_address(mut self, addr: impl Into<String>) -> Self {
        if !self.addresses_overridden {
            self.config.receiver.listen_addresses.clear();
            self.addresses_overridden = true;
        }
        self.config.receiver.listen_addresses.push(addr.into());
        self
    }

    pub fn sockets_per_address(mut self, n: usize) -> Self {
        self.config.receiver.sockets_per_address = n;
        self
    }

    pub fn recv_buffer_size(mut self, bytes: usize) -> Self {
        self.config.receiver.recv_buffer_size = bytes;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.receiver.namespace = namespace.into();
        self
    }

    /// Append one receiver tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.config.receiver.tags.push(tag.into());
        self
    }

    // -- logging --

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // -- telemetry --

    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.config.telemetry.enabled = enabled;
        self
    }

    pub fn telemetry_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.telemetry.endpoint = endpoint.into();
        self
    }

    pub fn telemetry_report_interval_secs(mut self, secs: u64) -> Self {
        self.config.telemetry.report_interval_secs = secs;
        self
    }

    // -- dispatch --

    pub fn dispatch_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.dispatch.log_level = level.into();
        self
    }

    pub fn dispatch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.dispatch.timeout_ms = ms;
        self
    }

    // -- build --

    /// Consume the builder and return the configuration (unvalidated).
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
