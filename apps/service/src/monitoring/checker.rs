use std::error::Error as StdError;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Failure to obtain any HTTP response from a target
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),

    #[error("could not build HTTP client: {0}")]
    Client(String),
}

/// A response that was received, whatever its status code
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status_code: u16,
    pub body: String,
    pub latency_ms: u64,
}

/// Transport used by the executor to fetch a target
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Issue one GET. Any received response is `Ok`, only transport failures are errors.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CheckError>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckError::Client(error_chain(&e)))?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, error: reqwest::Error) -> CheckError {
        if error.is_timeout() {
            CheckError::Timeout(self.timeout)
        } else {
            CheckError::Transport(error_chain(&error))
        }
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CheckError> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

        let status_code = response.status().as_u16();
        // The transaction is only complete once the whole body arrived; `text` decodes lossily
        let body = response.text().await.map_err(|e| {
            debug!(url, status_code, "Response body did not arrive: {}", error_chain(&e));
            self.classify(e)
        })?;
        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(FetchedPage { status_code, body, latency_ms })
    }
}

/// Render an error with all of its sources, `outer: inner: root`
pub fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
