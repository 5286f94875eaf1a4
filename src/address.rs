//! Topic addresses and the selector grammar that produces them.
//!
//! A binding is configured with two strings:
//! - a selector `PREFIX[:TYPE]` where `PREFIX` is `FLAT` or `JSON`
//! - an argument string `topic [field]`
//!
//! `FLAT` binds the whole payload of `topic` to one variable. `JSON` names a
//! field inside a structured payload; such addresses parse and compare but
//! the dispatcher refuses to decode or encode them.

use std::fmt;
use thiserror::Error;

/// Selector prefix for flat, topic-only bindings.
pub const FLAT_PREFIX: &str = "FLAT";
/// Selector prefix for structured, topic + field bindings.
pub const JSON_PREFIX: &str = "JSON";

/// Write mask meaning "every bit", i.e. a plain overwrite.
pub const FULL_MASK: u32 = 0xFFFF_FFFF;

/// Errors raised while turning configuration strings into an address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown selector prefix '{0}' (expected FLAT or JSON)")]
    UnknownPrefix(String),

    #[error("missing topic name")]
    MissingTopic,

    #[error("missing field name for structured topic '{0}'")]
    MissingField(String),

    #[error("unknown value type '{0}'")]
    UnknownType(String),

    #[error("selector '{0}' has no value type")]
    MissingType(String),
}

/// How the payload of a topic is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicFormat {
    /// The payload is the value itself
    Flat,
    /// The payload is a composite message, the address names one field
    Structured,
}

impl fmt::Display for TopicFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicFormat::Flat => write!(f, "{}", FLAT_PREFIX),
            TopicFormat::Structured => write!(f, "{}", JSON_PREFIX),
        }
    }
}

/// Identifies the binding target of one variable.
///
/// Equality follows the format: flat addresses compare topics, structured
/// addresses compare topic and field. The write mask never takes part.
#[derive(Debug, Clone)]
pub struct TopicAddress {
    format: TopicFormat,
    topic: String,
    field: Option<String>,
    write_mask: u32,
}

impl TopicAddress {
    pub fn flat(topic: impl Into<String>) -> Self {
        Self {
            format: TopicFormat::Flat,
            topic: topic.into(),
            field: None,
            write_mask: FULL_MASK,
        }
    }

    pub fn structured(topic: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            format: TopicFormat::Structured,
            topic: topic.into(),
            field: Some(field.into()),
            write_mask: FULL_MASK,
        }
    }

    /// Replaces the write mask; only bit-field variables look at it.
    pub fn with_write_mask(mut self, mask: u32) -> Self {
        self.write_mask = mask;
        self
    }

    pub fn format(&self) -> TopicFormat {
        self.format
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The field name, `Some` only for structured addresses.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn write_mask(&self) -> u32 {
        self.write_mask
    }
}

impl PartialEq for TopicAddress {
    fn eq(&self, other: &Self) -> bool {
        addresses_equal(self, other)
    }
}

impl Eq for TopicAddress {}

impl fmt::Display for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} {} {}", self.format, self.topic, field),
            None => write!(f, "{} {}", self.format, self.topic),
        }
    }
}

/// Equality rule used for duplicate detection.
pub fn addresses_equal(a: &TopicAddress, b: &TopicAddress) -> bool {
    if a.format != b.format {
        return false;
    }
    match a.format {
        TopicFormat::Flat => a.topic == b.topic,
        TopicFormat::Structured => a.topic == b.topic && a.field == b.field,
    }
}

/// Splits `PREFIX[:TYPE]` at the first colon.
pub fn split_selector(selector: &str) -> (&str, Option<&str>) {
    match selector.split_once(':') {
        Some((prefix, kind)) => (prefix, Some(kind)),
        None => (selector, None),
    }
}

/// Builds an address from a selector and its whitespace-separated arguments.
///
/// The `:TYPE` part of the selector is ignored here, the variable kind is
/// decided by the caller.
pub fn parse_address(selector: &str, arguments: &str) -> Result<TopicAddress, ParseError> {
    let (prefix, _) = split_selector(selector);
    let format = match prefix {
        FLAT_PREFIX => TopicFormat::Flat,
        JSON_PREFIX => TopicFormat::Structured,
        other => return Err(ParseError::UnknownPrefix(other.to_string())),
    };

    let mut tokens = arguments.split_whitespace();
    let topic = tokens.next().ok_or(ParseError::MissingTopic)?;

    match format {
        TopicFormat::Flat => Ok(TopicAddress::flat(topic)),
        TopicFormat::Structured => {
            let field = tokens
                .next()
                .ok_or_else(|| ParseError::MissingField(topic.to_string()))?;
            Ok(TopicAddress::structured(topic, field))
        }
    }
}
