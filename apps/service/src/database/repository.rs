use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use libsql::params;
use tokio::sync::Mutex;

use super::StoreError;
use super::models::{EVENT_COLUMNS, LatestPair, StoredEvent, event_from_row, timestamp_to_micros};
use crate::monitoring::types::{Event, EventKind, Target};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Rows fetched per round trip when streaming a url's history
const DEFAULT_PAGE_SIZE: usize = 256;

/// Append-only log of classified check events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one event, returning its append position
    async fn append(&self, event: &Event) -> Result<i64, StoreError>;

    /// Most recent event for `url` across both kinds
    async fn latest(&self, url: &str) -> Result<Option<Event>, StoreError>;

    /// Most recent connection and content events for `url`, independently
    async fn latest_pair(&self, url: &str) -> Result<LatestPair, StoreError>;

    /// Every event for `url`, oldest first. Each call starts from the beginning.
    fn all<'a>(&'a self, url: &str) -> BoxStream<'a, Result<Event, StoreError>>;
}

#[derive(Debug, Clone, Copy)]
struct PageCursor {
    after: (i64, i64),
    exhausted: bool,
}

/// LibSQL-backed event log
pub struct EventLog {
    pool: LibsqlPool,
    write_lock: Mutex<()>,
    page_size: usize,
}

impl EventLog {
    /// Open the log at `path`, creating the file and schema if absent
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let pool = crate::pool::open_local(path).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying pending migrations
    pub async fn from_pool(pool: LibsqlPool) -> Result<Self, StoreError> {
        {
            let conn = pool.get().await?;
            super::initialize_database(&conn).await?;
        }

        Ok(Self { pool, write_lock: Mutex::new(()), page_size: DEFAULT_PAGE_SIZE })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Distinct urls that have at least one event
    pub async fn monitored_urls(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT DISTINCT url FROM monitoring_events ORDER BY url", ()).await?;

        let mut urls = Vec::new();
        while let Some(row) = rows.next().await? {
            urls.push(row.get(0)?);
        }
        Ok(urls)
    }

    /// Urls with recorded history that are not in `targets`, such as targets
    /// removed from the configuration since the log was written
    pub async fn retired_urls(&self, targets: &[Target]) -> Result<Vec<String>, StoreError> {
        let mut urls = self.monitored_urls().await?;
        urls.retain(|url| !targets.iter().any(|target| &target.url == url));
        Ok(urls)
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        Ok(self.pool.get().await?)
    }

    async fn fetch_page(&self, url: &str, after: (i64, i64)) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM monitoring_events
                     WHERE url = ?1 AND (timestamp_us > ?2 OR (timestamp_us = ?2 AND id > ?3))
                     ORDER BY timestamp_us ASC, id ASC LIMIT ?4"
                ),
                params![url, after.0, after.1, self.page_size as i64],
            )
            .await?;

        let mut page = Vec::with_capacity(self.page_size);
        while let Some(row) = rows.next().await? {
            page.push(event_from_row(&row)?);
        }
        Ok(page)
    }

    async fn next_page(&self, url: &str, cursor: PageCursor) -> Result<Option<(Vec<Event>, PageCursor)>, StoreError> {
        if cursor.exhausted {
            return Ok(None);
        }

        let page = self.fetch_page(url, cursor.after).await?;
        let Some(last) = page.last() else {
            return Ok(None);
        };

        let next = PageCursor {
            after: (timestamp_to_micros(last.event.timestamp), last.id),
            exhausted: page.len() < self.page_size,
        };
        Ok(Some((page.into_iter().map(|stored| stored.event).collect(), next)))
    }
}

#[async_trait]
impl EventStore for EventLog {
    async fn append(&self, event: &Event) -> Result<i64, StoreError> {
        let conn = self.get_conn().await?;
        let _guard = self.write_lock.lock().await;

        conn.execute(
            "INSERT INTO monitoring_events (timestamp_us, url, round, kind, status, latency_ms, detail) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                timestamp_to_micros(event.timestamp),
                event.url.clone(),
                event.round as i64,
                event.kind().as_str(),
                event.status.to_string(),
                event.latency_ms.map(|v| v as i64),
                event.detail.clone()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn latest(&self, url: &str) -> Result<Option<Event>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM monitoring_events
                     WHERE url = ?
                     ORDER BY timestamp_us DESC, id DESC LIMIT 1"
                ),
                params![url],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(event_from_row(&row)?.event)),
            None => Ok(None),
        }
    }

    async fn latest_pair(&self, url: &str) -> Result<LatestPair, StoreError> {
        let conn = self.get_conn().await?;
        // One statement reads one snapshot, so both rows come from the same committed state
        let mut rows = conn
            .query(
                &format!(
                    "SELECT * FROM (
                         SELECT {EVENT_COLUMNS} FROM monitoring_events
                         WHERE url = ?1 AND kind = ?2
                         ORDER BY timestamp_us DESC, id DESC LIMIT 1)
                     UNION ALL
                     SELECT * FROM (
                         SELECT {EVENT_COLUMNS} FROM monitoring_events
                         WHERE url = ?1 AND kind = ?3
                         ORDER BY timestamp_us DESC, id DESC LIMIT 1)"
                ),
                params![url, EventKind::Connection.as_str(), EventKind::Content.as_str()],
            )
            .await?;

        let mut pair = LatestPair::default();
        while let Some(row) = rows.next().await? {
            let event = event_from_row(&row)?.event;
            match event.kind() {
                EventKind::Connection => pair.connection = Some(event),
                EventKind::Content => pair.content = Some(event),
            }
        }
        Ok(pair)
    }

    fn all<'a>(&'a self, url: &str) -> BoxStream<'a, Result<Event, StoreError>> {
        let url = url.to_string();
        let start = PageCursor { after: (i64::MIN, i64::MIN), exhausted: false };

        stream::try_unfold(start, move |cursor| {
            let url = url.clone();
            async move { self.next_page(&url, cursor).await }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Event, StoreError>)))
        .try_flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{ConnectionStatus, ContentStatus, EventStatus};
    use chrono::{DateTime, Duration, Utc};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 250_000).unwrap()
    }

    fn connection(url: &str, seconds: i64, status: ConnectionStatus) -> Event {
        Event::new(at(seconds), url, seconds as u64, EventStatus::Connection(status)).with_latency(12)
    }

    fn content(url: &str, seconds: i64, status: ContentStatus, detail: &str) -> Event {
        Event::new(at(seconds), url, seconds as u64, EventStatus::Content(status)).with_detail(detail)
    }

    #[tokio::test]
    async fn test_append_then_all_round_trips() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = EventLog::open(&dir.path().join("events.db").to_string_lossy()).await?;

        let first = connection("http://x", 0, ConnectionStatus::Ok);
        let second = content("http://x", 0, ContentStatus::Nok, "CODE QUALITY not found in response content");
        log.append(&first).await?;
        log.append(&second).await?;
        log.append(&connection("http://other", 0, ConnectionStatus::Nok)).await?;

        let events: Vec<Event> = log.all("http://x").try_collect().await?;
        assert_eq!(events, vec![first, second]);
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_picks_max_timestamp() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = EventLog::open(&dir.path().join("events.db").to_string_lossy()).await?;

        for round in 0..5 {
            log.append(&connection("http://x", round * 5, ConnectionStatus::Ok)).await?;
            log.append(&content("http://x", round * 5, ContentStatus::Ok, "")).await?;
        }
        // Appended late but older
        log.append(&connection("http://x", 1, ConnectionStatus::Nok)).await?;

        let latest = log.latest("http://x").await?.unwrap();
        assert_eq!(latest.timestamp, at(20));
        assert_eq!(latest.status, EventStatus::Content(ContentStatus::Ok));

        // No side effects
        assert_eq!(log.latest("http://x").await?, Some(latest));
        assert_eq!(log.latest("http://never").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_pair_tracks_kinds_independently() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = EventLog::open(&dir.path().join("events.db").to_string_lossy()).await?;

        log.append(&connection("http://x", 0, ConnectionStatus::Ok)).await?;
        log.append(&content("http://x", 0, ContentStatus::Ok, "")).await?;
        log.append(&connection("http://x", 5, ConnectionStatus::Nok).with_detail("refused")).await?;

        let pair = log.latest_pair("http://x").await?;
        assert_eq!(pair.connection.unwrap().status, EventStatus::Connection(ConnectionStatus::Nok));
        assert_eq!(pair.content.unwrap().timestamp, at(0));

        assert_eq!(log.latest_pair("http://never").await?, LatestPair::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_keeps_events() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("events.db").to_string_lossy().to_string();

        {
            let log = EventLog::open(&path).await?;
            log.append(&connection("http://x", 0, ConnectionStatus::Ok)).await?;
        }

        let log = EventLog::open(&path).await?;
        log.append(&connection("http://x", 5, ConnectionStatus::Ok)).await?;

        let events: Vec<Event> = log.all("http://x").try_collect().await?;
        assert_eq!(events.len(), 2);
        assert_eq!(log.monitored_urls().await?, vec!["http://x".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_retired_urls_are_those_no_longer_targeted() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = EventLog::open(&dir.path().join("events.db").to_string_lossy()).await?;
        for url in ["http://b", "http://a", "http://c"] {
            log.append(&connection(url, 0, ConnectionStatus::Ok)).await?;
        }

        let targets = [Target::new("http://b", vec![]), Target::new("http://new", vec![])];
        assert_eq!(log.retired_urls(&targets).await?, vec!["http://a".to_string(), "http://c".to_string()]);
        assert_eq!(log.retired_urls(&[]).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_all_is_paged_and_restartable() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = EventLog::open(&dir.path().join("events.db").to_string_lossy())
            .await?
            .with_page_size(3);

        // Several events share a timestamp so the id tie-break crosses page boundaries
        let mut expected = Vec::new();
        for i in 0..10 {
            let event = connection("http://x", i / 2, ConnectionStatus::Ok).with_detail(format!("#{i}"));
            log.append(&event).await?;
            expected.push(event);
        }

        let first: Vec<Event> = log.all("http://x").try_collect().await?;
        let second: Vec<Event> = log.all("http://x").try_collect().await?;
        assert_eq!(first, expected);
        assert_eq!(second, expected);

        let empty: Vec<Event> = log.all("http://never").try_collect().await?;
        assert!(empty.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = Arc::new(EventLog::open(&dir.path().join("events.db").to_string_lossy()).await?);
        let timestamp = Utc::now() - Duration::seconds(1);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..50 {
            let log = Arc::clone(&log);
            tasks.spawn(async move {
                let url = format!("http://target-{i}");
                let conn = Event::new(timestamp, &url, 1, EventStatus::Connection(ConnectionStatus::Ok));
                log.append(&conn).await?;
                if i % 2 == 0 {
                    let body = Event::new(timestamp, &url, 1, EventStatus::Content(ContentStatus::Ok));
                    log.append(&body).await?;
                }
                Ok::<_, StoreError>(())
            });
        }
        while let Some(result) = tasks.join_next().await {
            result??;
        }

        for i in 0..50 {
            let events: Vec<Event> = log.all(&format!("http://target-{i}")).try_collect().await?;
            let connections = events.iter().filter(|e| e.kind() == EventKind::Connection).count();
            let contents = events.iter().filter(|e| e.kind() == EventKind::Content).count();
            assert_eq!(connections, 1);
            assert_eq!(contents, usize::from(i % 2 == 0));
        }
        Ok(())
    }
}
