use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::checker::{CheckError, Checker, HttpChecker};
use super::types::{ConnectionStatus, ContentStatus, Event, EventStatus, Target, now_micros};

/// Events produced by one check of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub connection: Event,
    pub content: Option<Event>,
}

impl CheckOutcome {
    /// Events in the order they must be appended
    pub fn into_events(self) -> impl Iterator<Item = Event> {
        std::iter::once(self.connection).chain(self.content)
    }
}

/// Check executor - performs one GET per target and classifies the outcome
pub struct CheckExecutor {
    checker: Arc<dyn Checker>,
}

impl CheckExecutor {
    /// Create an executor backed by a real HTTP client
    pub fn new(timeout: Duration) -> Result<Self, CheckError> {
        Ok(Self::with_checker(Arc::new(HttpChecker::new(timeout)?)))
    }

    pub fn with_checker(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Check a target once. Never fails: transport errors become `CONN_NOK`.
    pub async fn execute(&self, target: &Target, round: u64) -> CheckOutcome {
        let timestamp = now_micros();

        match self.checker.fetch(&target.url).await {
            Ok(page) => {
                debug!(url = %target.url, status_code = page.status_code, "Received response");

                let connection =
                    Event::new(timestamp, &target.url, round, EventStatus::Connection(ConnectionStatus::Ok))
                        .with_latency(page.latency_ms);

                let content = match first_missing(&page.body, &target.required) {
                    None => Event::new(timestamp, &target.url, round, EventStatus::Content(ContentStatus::Ok)),
                    Some(missing) => {
                        Event::new(timestamp, &target.url, round, EventStatus::Content(ContentStatus::Nok))
                            .with_detail(format!("{missing} not found in response content"))
                    }
                };

                CheckOutcome { connection, content: Some(content) }
            }
            Err(e) => {
                let connection =
                    Event::new(timestamp, &target.url, round, EventStatus::Connection(ConnectionStatus::Nok))
                        .with_detail(e.to_string());

                CheckOutcome { connection, content: None }
            }
        }
    }
}

/// First required string absent from `body`, compared literally and case-sensitively
pub fn first_missing<'a>(body: &str, required: &'a [String]) -> Option<&'a str> {
    required.iter().map(String::as_str).find(|needle| !body.contains(needle))
}
