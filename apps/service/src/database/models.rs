use chrono::{DateTime, Utc};
use libsql::Row;
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::monitoring::types::{Event, EventStatus};

/// Column list shared by every event query, in `event_from_row` order
pub(crate) const EVENT_COLUMNS: &str = "id, timestamp_us, url, round, kind, status, latency_ms, detail";

/// Most recent event of each kind for one url
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPair {
    pub connection: Option<Event>,
    pub content: Option<Event>,
}

/// Event as read back from the log, with its append position
#[derive(Debug, Clone)]
pub(crate) struct StoredEvent {
    pub id: i64,
    pub event: Event,
}

pub(crate) fn timestamp_to_micros(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

pub(crate) fn micros_to_timestamp(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {micros}")))
}

pub(crate) fn event_from_row(row: &Row) -> Result<StoredEvent, StoreError> {
    let kind: String = row.get(4)?;
    let status: String = row.get(5)?;
    let status = EventStatus::from_parts(&kind, &status).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let event = Event {
        timestamp: micros_to_timestamp(row.get(1)?)?,
        url: row.get(2)?,
        round: row.get::<i64>(3)? as u64,
        status,
        latency_ms: row.get::<Option<i64>>(6)?.map(|v| v as u64),
        detail: row.get(7)?,
    };

    Ok(StoredEvent { id: row.get(0)?, event })
}
