//! Metric entity
//!
//! A [`Metric`] is one measurement decoded from a single protocol line.
//! It is created by the line lexer, enriched by the packet parser (extra
//! tags, source IP) and then moved into the dispatch gateway.

use serde::{Deserialize, Serialize};

use super::newtypes::{SourceIp, Tags};

/// Kind of a metric, as announced by the line's type token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// `c` - delta counter
    Counter,
    /// `g` - gauge
    Gauge,
    /// `ms` / `h` - timer or histogram sample
    Timer,
    /// `s` - set of unique string values
    Set,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Timer => "timer",
            MetricKind::Set => "set",
        };
        write!(f, "{}", s)
    }
}

/// A single metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name, already prefixed with the configured namespace
    pub name: String,
    /// Numeric value (zero for sets)
    pub value: f64,
    /// Raw member value for sets, empty otherwise
    pub string_value: String,
    /// Metric kind
    pub kind: MetricKind,
    /// Client-side sample rate in (0, 1]
    pub sample_rate: f64,
    /// Line tags followed by receiver tags
    pub tags: Tags,
    /// Host that sent the packet, when it could be determined
    pub source_ip: Option<SourceIp>,
}

impl Metric {
    /// Creates a metric with sample rate 1.0, no tags and no source
    pub fn new(name: impl Into<String>, value: f64, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            value,
            string_value: String::new(),
            kind,
            sample_rate: 1.0,
            tags: Tags::new(),
            source_ip: None,
        }
    }

    /// Creates a set metric carrying a string member
    pub fn set(name: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            string_value: member.into(),
            ..Self::new(name, 0.0, MetricKind::Set)
        }
    }

    /// Sets the sample rate
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Sets the tags
    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into();
        self
    }
}
