//! DogStatsD line lexer
//!
//! Default [`ILineLexer`] implementation for the DogStatsD text protocol.
//!
//! ```text
//! <name>:<value>|<type>[|@<sample_rate>][|#<tag>,<tag>]
//! _e{<title_len>,<text_len>}:<title>|<text>[|d:<ts>][|h:<host>][|k:<key>][|p:<prio>][|s:<src>][|t:<alert>][|#<tags>]
//! ```
//!
//! Title and text lengths in the event header are byte lengths. A literal
//! `\n` sequence inside event text is decoded to a newline.

use statsgate_core::domain::{AlertType, Event, EventPriority, LexError, Metric, MetricKind, Tags};
use statsgate_core::ports::{ILineLexer, Parsed};

const EVENT_PREFIX: &str = "_e{";

/// Stateless DogStatsD lexer
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsdLexer;

impl ILineLexer for StatsdLexer {
    fn lex(&self, line: &[u8], namespace: &str) -> Result<Option<Parsed>, LexError> {
        let line = std::str::from_utf8(line).map_err(|_| LexError::InvalidUtf8)?;

        if line.starts_with(EVENT_PREFIX) {
            lex_event(line).map(|e| Some(Parsed::Event(e)))
        } else {
            lex_metric(line, namespace).map(|m| Some(Parsed::Metric(m)))
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

fn lex_metric(line: &str, namespace: &str) -> Result<Metric, LexError> {
    let colon = line.find(':').ok_or(LexError::MissingValue)?;
    // A ':' after the first '|' belongs to a tag, not to the name/value split.
    if line.find('|').is_some_and(|pipe| pipe < colon) {
        return Err(LexError::MissingValue);
    }

    let name = &line[..colon];
    if name.is_empty() {
        return Err(LexError::EmptyName);
    }

    let mut fields = line[colon + 1..].split('|');
    let raw_value = fields.next().unwrap_or_default();
    if raw_value.is_empty() {
        return Err(LexError::MissingValue);
    }

    let kind = match fields.next() {
        None | Some("") => return Err(LexError::MissingType),
        Some("c") => MetricKind::Counter,
        Some("g") => MetricKind::Gauge,
        Some("ms") | Some("h") => MetricKind::Timer,
        Some("s") => MetricKind::Set,
        Some(other) => return Err(LexError::UnknownType(other.to_string())),
    };

    let name = if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    };

    let mut metric = match kind {
        MetricKind::Set => Metric::set(name, raw_value),
        _ => Metric::new(name, parse_value(raw_value)?, kind),
    };

    for field in fields {
        if let Some(rate) = field.strip_prefix('@') {
            metric = metric.with_sample_rate(parse_sample_rate(rate)?);
        } else if let Some(tags) = field.strip_prefix('#') {
            metric = metric.with_tags(parse_tags(tags));
        } else {
            return Err(LexError::UnknownField(field.to_string()));
        }
    }

    Ok(metric)
}

fn parse_value(raw: &str) -> Result<f64, LexError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LexError::InvalidValue(raw.to_string())),
    }
}

fn parse_sample_rate(raw: &str) -> Result<f64, LexError> {
    match raw.parse::<f64>() {
        Ok(r) if r > 0.0 && r <= 1.0 => Ok(r),
        _ => Err(LexError::InvalidSampleRate(raw.to_string())),
    }
}

fn parse_tags(raw: &str) -> Tags {
    raw.split(',')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Events
// ============================================================================

fn lex_event(line: &str) -> Result<Event, LexError> {
    let header_end = line
        .find("}:")
        .ok_or_else(|| LexError::InvalidEventHeader(line.to_string()))?;
    let lengths = &line[EVENT_PREFIX.len()..header_end];

    let (title_len, text_len) = lengths
        .split_once(',')
        .and_then(|(t, x)| Some((t.parse::<usize>().ok()?, x.parse::<usize>().ok()?)))
        .ok_or_else(|| LexError::InvalidEventHeader(lengths.to_string()))?;
    if title_len == 0 {
        return Err(LexError::InvalidEventHeader(lengths.to_string()));
    }

    let body = &line[header_end + 2..];
    let expected = title_len
        .checked_add(1)
        .and_then(|n| n.checked_add(text_len))
        .ok_or_else(|| LexError::InvalidEventHeader(lengths.to_string()))?;
    let mismatch = || LexError::EventLengthMismatch {
        expected,
        found: body.len(),
    };

    let title = body.get(..title_len).ok_or_else(mismatch)?;
    if body.as_bytes().get(title_len) != Some(&b'|') {
        return Err(mismatch());
    }
    let text = body.get(title_len + 1..expected).ok_or_else(mismatch)?;
    let rest = &body[expected..];

    let mut event = Event::new(title, text.replace("\\n", "\n"));

    if rest.is_empty() {
        return Ok(event);
    }
    let rest = rest.strip_prefix('|').ok_or_else(mismatch)?;

    for field in rest.split('|') {
        if let Some(ts) = field.strip_prefix("d:") {
            let date = ts.parse().map_err(|_| LexError::InvalidField {
                field: "date_happened",
                value: ts.to_string(),
            })?;
            event = event.with_date_happened(date);
        } else if let Some(host) = field.strip_prefix("h:") {
            event.hostname = host.to_string();
        } else if let Some(key) = field.strip_prefix("k:") {
            event.aggregation_key = key.to_string();
        } else if let Some(prio) = field.strip_prefix("p:") {
            event.priority = match prio {
                "normal" => EventPriority::Normal,
                "low" => EventPriority::Low,
                _ => {
                    return Err(LexError::InvalidField {
                        field: "priority",
                        value: prio.to_string(),
                    })
                }
            };
        } else if let Some(source) = field.strip_prefix("s:") {
            event.source_type_name = source.to_string();
        } else if let Some(alert) = field.strip_prefix("t:") {
            event.alert_type = match alert {
                "info" => AlertType::Info,
                "warning" => AlertType::Warning,
                "error" => AlertType::Error,
                "success" => AlertType::Success,
                _ => {
                    return Err(LexError::InvalidField {
                        field: "alert_type",
                        value: alert.to_string(),
                    })
                }
            };
        } else if let Some(tags) = field.strip_prefix('#') {
            event = event.with_tags(parse_tags(tags));
        } else {
            return Err(LexError::UnknownField(field.to_string()));
        }
    }

    Ok(event)
}
