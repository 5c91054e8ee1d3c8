//! Status query service.
//!
//! Derives the "current status of every target" view from the event log on
//! demand. Nothing here is cached, so the log stays the single source of
//! truth and a snapshot is never more stale than the last committed event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::database::{EventStore, LatestPair, StoreError};
use crate::monitoring::types::{ConnectionStatus, ContentStatus, EventStatus, Target};

/// Latest known status of one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub url: String,

    /// `None` until the target has been checked once
    #[serde(serialize_with = "unknown_if_none")]
    pub connection: Option<ConnectionStatus>,

    #[serde(serialize_with = "unknown_if_none")]
    pub content: Option<ContentStatus>,

    /// Start of the most recent check
    pub last_checked: Option<DateTime<Utc>>,

    /// Start of the check that produced `content`. Trails `last_checked` while
    /// a round's content event is still being written.
    pub content_checked: Option<DateTime<Utc>>,

    /// Reason attached to the current failure, empty when healthy
    pub detail: String,
}

impl TargetStatus {
    fn unknown(url: &str) -> Self {
        Self {
            url: url.to_string(),
            connection: None,
            content: None,
            last_checked: None,
            content_checked: None,
            detail: String::new(),
        }
    }

    fn from_pair(url: &str, pair: LatestPair) -> Self {
        let Some(connection) = pair.connection else {
            // Content is only ever written after a connection event
            return Self::unknown(url);
        };

        let EventStatus::Connection(connection_status) = connection.status else {
            return Self::unknown(url);
        };

        let (content, content_checked, detail) = match (connection_status, pair.content) {
            (ConnectionStatus::Nok, _) => (Some(ContentStatus::NotApplicable), None, connection.detail.clone()),
            // Possibly from an earlier round, until this round's verdict lands
            (ConnectionStatus::Ok, Some(event)) => match event.status {
                EventStatus::Content(status) => (Some(status), Some(event.timestamp), event.detail),
                EventStatus::Connection(_) => (None, None, String::new()),
            },
            (ConnectionStatus::Ok, None) => (None, None, String::new()),
        };

        Self {
            url: url.to_string(),
            connection: Some(connection_status),
            content,
            last_checked: Some(connection.timestamp),
            content_checked,
            detail,
        }
    }
}

/// Status of every configured target, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<TargetStatus>,
}

impl Snapshot {
    pub fn get(&self, url: &str) -> Option<&TargetStatus> {
        self.entries.iter().find(|entry| entry.url == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetStatus> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only facade over the event log for the status interface
#[derive(Clone)]
pub struct StatusService {
    store: Arc<dyn EventStore>,
}

impl StatusService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self, targets: &[Target]) -> Result<Snapshot, StoreError> {
        let mut entries = Vec::with_capacity(targets.len());
        for target in targets {
            let pair = self.store.latest_pair(&target.url).await?;
            entries.push(TargetStatus::from_pair(&target.url, pair));
        }
        Ok(Snapshot { entries })
    }
}

fn unknown_if_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_str("unknown"),
    }
}
