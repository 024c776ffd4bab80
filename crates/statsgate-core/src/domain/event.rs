//! Event entity
//!
//! An [`Event`] is a titled, free-text occurrence (deploy finished,
//! service restarted) decoded from a single `_e{..}` protocol line.

use serde::{Deserialize, Serialize};

use super::newtypes::{SourceIp, Tags};

/// Event priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    #[default]
    Normal,
    Low,
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventPriority::Normal => "normal",
            EventPriority::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// Event alert type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertType::Info => "info",
            AlertType::Warning => "warning",
            AlertType::Error => "error",
            AlertType::Success => "success",
        };
        write!(f, "{}", s)
    }
}

/// A single event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Short title
    pub title: String,
    /// Body text
    pub text: String,
    /// When the event happened, in epoch seconds. Zero means "not given".
    pub date_happened: i64,
    /// Host the event is about, if given on the line
    pub hostname: String,
    /// Key used downstream to group related events
    pub aggregation_key: String,
    /// Name of the system that produced the event
    pub source_type_name: String,
    pub priority: EventPriority,
    pub alert_type: AlertType,
    /// Line tags followed by receiver tags
    pub tags: Tags,
    /// Host that sent the packet, when it could be determined
    pub source_ip: Option<SourceIp>,
}

impl Event {
    /// Creates an event with the given title and text and default fields
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            date_happened: 0,
            hostname: String::new(),
            aggregation_key: String::new(),
            source_type_name: String::new(),
            priority: EventPriority::Normal,
            alert_type: AlertType::Info,
            tags: Tags::new(),
            source_ip: None,
        }
    }

    /// Sets the tags
    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Sets the date happened (epoch seconds)
    pub fn with_date_happened(mut self, epoch_secs: i64) -> Self {
        self.date_happened = epoch_secs;
        self
    }
}
