pub mod http_fetcher;
#[cfg(test)]
pub(crate) mod stub;

use async_trait::async_trait;
use thiserror::Error;

use crate::parser::FeedDocument;

pub use http_fetcher::HttpFetcher;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    /// Response with a non-2xx status code
    #[error("HTTP error: status {0}")]
    Status(u16),

    /// Body could not be parsed as a feed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}

/// Retrieves a feed URL and parses it into a [`FeedDocument`].
///
/// Implementations perform no retries; the ingestion pipeline decides what
/// a failure means for the feed.
#[async_trait]
pub trait FeedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<FeedDocument, FetchError>;
}
