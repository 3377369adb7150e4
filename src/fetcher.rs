use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::parser::{unwrap_relay_envelope, RelayError};
use crate::registry::FeedSource;

/// Ways a single feed fetch can fail. Every variant is recovered by the
/// aggregator; none of them reach API callers.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Relay answered with a non-2xx status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Fetch exceeded the configured per-feed bound
    #[error("Request timed out")]
    Timeout,
    /// Relay answered but did not carry the feed document
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
    /// Relay or feed URL could not be combined into a request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Retrieves raw feed documents, optionally through a CORS relay.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    relay_url: Option<String>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(relay_url: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("NipponNews/1.0 (RSS Aggregator)")
            .build()?;

        Ok(Self {
            client,
            relay_url,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(config.relay_url.clone(), config.fetch_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `<relay>?url=<encoded feed url>`, or the feed URL itself without a relay.
    pub fn request_url(&self, feed_url: &str) -> Result<Url, FetchError> {
        match &self.relay_url {
            Some(relay) => Ok(Url::parse_with_params(relay, &[("url", feed_url)])?),
            None => Ok(Url::parse(feed_url)?),
        }
    }

    /// Fetches the feed document for `source`. Does not retry.
    ///
    /// Relay envelopes are unwrapped here, so the returned text is the XML
    /// document itself.
    pub async fn fetch(&self, source: &FeedSource) -> Result<String, FetchError> {
        let request_url = self.request_url(&source.url)?;
        info!("Fetching feed: {} ({})", source.id, source.url);

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(classify)?;
        debug!(feed = %source.id, bytes = body.len(), "Received feed body");

        let document = unwrap_relay_envelope(&body)?.into_owned();
        Ok(document)
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}
