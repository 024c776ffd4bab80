//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for values that travel
//! with every metric and event: the tag collection and the source IP.

use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Tags
// ============================================================================

/// Ordered collection of free-form tags
///
/// Order is preserved exactly as tags were added. Duplicates are kept; the
/// collection is "set-like" only in the sense that downstream consumers
/// treat it as a label set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Create an empty tag collection
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a single tag
    pub fn push(&mut self, tag: impl Into<String>) {
        self.0.push(tag.into());
    }

    /// Append every tag of `other` after the existing ones, keeping order
    pub fn extend_from(&mut self, other: &Tags) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Get the tags as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Deref for Tags {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Self(tags)
    }
}

impl<'a> From<Vec<&'a str>> for Tags {
    fn from(tags: Vec<&'a str>) -> Self {
        Self(tags.into_iter().map(String::from).collect())
    }
}

impl FromIterator<String> for Tags {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for Tags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

// ============================================================================
// SourceIp
// ============================================================================

/// Host portion of a packet's transport source address (no port)
///
/// Derived only from the socket peer address, never from line content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceIp(String);

impl SourceIp {
    /// Extract the host from a textual `host:port` address
    ///
    /// Splits on the last `:` so IPv6 peers (`[::1]:8125`) keep their
    /// bracketed host. A separator at index 0 or no separator at all is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidSourceAddress`] when no host can be
    /// extracted.
    pub fn from_peer_addr(addr: &str) -> Result<Self, DomainError> {
        match addr.rfind(':') {
            Some(n) if n > 0 => Ok(Self(addr[..n].to_string())),
            _ => Err(DomainError::InvalidSourceAddress(addr.to_string())),
        }
    }

    /// Get the host as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SourceIp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
