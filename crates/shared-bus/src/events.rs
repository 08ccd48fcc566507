//! # Events and Topic Patterns
//!
//! Events are identified by a dot-separated namespace and optionally carry
//! structured data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An event flowing through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dot-separated topic, e.g. `transport.messageReceived`.
    pub namespace: String,
    /// Structured payload, absent for signal-only events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Event {
    /// An event without data.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            data: None,
        }
    }

    /// An event carrying structured data.
    pub fn with_data(namespace: impl Into<String>, data: Value) -> Self {
        Self {
            namespace: namespace.into(),
            data: Some(data),
        }
    }

    /// Whether this event carries structured data.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// Subscription pattern over event namespaces.
///
/// Segments are separated by `.`. A `*` segment matches exactly one
/// namespace segment, a `**` segment matches zero or more.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<String>,
}

impl TopicPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = raw.split('.').map(str::to_owned).collect();
        Self { raw, segments }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `namespace` is matched by this pattern.
    pub fn matches(&self, namespace: &str) -> bool {
        let topic: Vec<&str> = namespace.split('.').collect();
        let pattern: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        match_segments(&pattern, &topic)
    }
}

fn match_segments(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.split_first(), topic.split_first()) {
        (None, None) => true,
        (Some((&"**", rest)), _) => {
            // Either `**` stops here, or it swallows one more topic segment.
            match_segments(rest, topic)
                || (!topic.is_empty() && match_segments(pattern, &topic[1..]))
        }
        (Some((&"*", rest)), Some((_, topic_rest))) => match_segments(rest, topic_rest),
        (Some((segment, rest)), Some((head, topic_rest))) if segment == head => {
            match_segments(rest, topic_rest)
        }
        _ => false,
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for TopicPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for TopicPattern {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}
