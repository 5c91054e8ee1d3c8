use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored endpoint. Identity is the url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,

    /// Substrings that must all appear in the response body
    #[serde(rename = "req", default)]
    pub required: Vec<String>,
}

impl Target {
    pub fn new(url: impl Into<String>, required: Vec<String>) -> Self {
        Self { url: url.into(), required }
    }
}

/// Whether the HTTP transaction completed and returned a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[serde(rename = "CONN_OK")]
    Ok,
    #[serde(rename = "CONN_NOK")]
    Nok,
}

/// Whether all required substrings were found in the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentStatus {
    #[serde(rename = "CONTENT_OK")]
    Ok,
    #[serde(rename = "CONTENT_NOK")]
    Nok,
    #[serde(rename = "NOT_APPLICABLE")]
    NotApplicable,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Ok => write!(f, "CONN_OK"),
            ConnectionStatus::Nok => write!(f, "CONN_NOK"),
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentStatus::Ok => write!(f, "CONTENT_OK"),
            ContentStatus::Nok => write!(f, "CONTENT_NOK"),
            ContentStatus::NotApplicable => write!(f, "NOT_APPLICABLE"),
        }
    }
}

/// Kind column of a stored event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Connection,
    Content,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connection => "connection",
            EventKind::Content => "content",
        }
    }
}

/// Classified outcome carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EventStatus {
    Connection(ConnectionStatus),
    Content(ContentStatus),
}

impl EventStatus {
    pub fn kind(&self) -> EventKind {
        match self {
            EventStatus::Connection(_) => EventKind::Connection,
            EventStatus::Content(_) => EventKind::Content,
        }
    }

    /// Rebuild a status from its stored `(kind, value)` columns
    pub fn from_parts(kind: &str, value: &str) -> Result<Self, UnknownStatus> {
        let unknown = || UnknownStatus(format!("{kind}/{value}"));
        match kind {
            "connection" => match value {
                "CONN_OK" => Ok(EventStatus::Connection(ConnectionStatus::Ok)),
                "CONN_NOK" => Ok(EventStatus::Connection(ConnectionStatus::Nok)),
                _ => Err(unknown()),
            },
            "content" => match value {
                "CONTENT_OK" => Ok(EventStatus::Content(ContentStatus::Ok)),
                "CONTENT_NOK" => Ok(EventStatus::Content(ContentStatus::Nok)),
                "NOT_APPLICABLE" => Ok(EventStatus::Content(ContentStatus::NotApplicable)),
                _ => Err(unknown()),
            },
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Connection(status) => status.fmt(f),
            EventStatus::Content(status) => status.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event status: {0}")]
pub struct UnknownStatus(pub String);

/// One immutable, timestamped, classified outcome of a single check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Captured once at check start, microsecond resolution
    pub timestamp: DateTime<Utc>,

    /// Url of the target that was checked
    pub url: String,

    /// Scheduler round that produced this event
    pub round: u64,

    pub status: EventStatus,

    /// Request duration, set on connection events only
    pub latency_ms: Option<u64>,

    /// Empty on success, human-readable reason on failure
    pub detail: String,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, url: impl Into<String>, round: u64, status: EventStatus) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(6),
            url: url.into(),
            round,
            status,
            latency_ms: None,
            detail: String::new(),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn kind(&self) -> EventKind {
        self.status.kind()
    }
}

/// Current wall-clock time truncated to the resolution events are stored at
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip_through_parts() {
        let all = [
            EventStatus::Connection(ConnectionStatus::Ok),
            EventStatus::Connection(ConnectionStatus::Nok),
            EventStatus::Content(ContentStatus::Ok),
            EventStatus::Content(ContentStatus::Nok),
            EventStatus::Content(ContentStatus::NotApplicable),
        ];

        for status in all {
            let parsed = EventStatus::from_parts(status.kind().as_str(), &status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_mismatched_kind_is_rejected() {
        assert!(EventStatus::from_parts("connection", "CONTENT_OK").is_err());
        assert!(EventStatus::from_parts("content", "CONN_OK").is_err());
        assert!(EventStatus::from_parts("latency", "CONN_OK").is_err());
    }

    #[test]
    fn test_event_timestamp_is_truncated_to_micros() {
        let raw = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let event = Event::new(raw, "http://x", 1, EventStatus::Connection(ConnectionStatus::Ok));
        assert_eq!(event.timestamp.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_target_deserializes_missing_req_as_empty() {
        let target: Target = serde_json::from_str(r#"{"url": "http://x"}"#).unwrap();
        assert!(target.required.is_empty());
    }
}
