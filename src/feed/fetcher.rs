use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use super::document::{decode_feed, RssFeed};

/// Upper bound on one fetch, connection through last body byte
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 5;

/// Identifies the aggregator to feed hosts.
pub const USER_AGENT: &str = concat!("gator/", env!("CARGO_PKG_VERSION"));

const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5";

/// Errors that can occur while retrieving a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connection, TLS or redirect failure
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Fetch did not complete within the timeout
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// Response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body exceeded the 10MB limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Body is not a decodable RSS document
    #[error("could not decode feed: {0}")]
    Decode(String),
}

/// Create a redirect policy with loop detection and a hop limit.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// HTTP client for feed documents.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(create_redirect_policy())
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Wrap a preconfigured client. `timeout` still bounds each whole fetch.
    pub fn from_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// GET `url` and decode the body as RSS.
    ///
    /// # Errors
    ///
    /// - `FetchError::Timeout` if the whole exchange exceeds the timeout
    /// - `FetchError::HttpStatus` for any non-2xx response
    /// - `FetchError::ResponseTooLarge` for bodies over 10MB
    /// - `FetchError::Decode` if the body is not RSS
    pub async fn fetch(&self, url: &str) -> Result<RssFeed, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch_bytes(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let feed = decode_feed(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            items = feed.channel.items.len(),
            "Fetched feed"
        );
        Ok(feed)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_FEEDS)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE)
            .await
            .map_err(|e| match e {
                FetchError::Network(inner) => self.classify(inner),
                other => other,
            })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

/// Read a response body, failing as soon as it exceeds `limit` bytes.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: trust an oversized Content-Length
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
