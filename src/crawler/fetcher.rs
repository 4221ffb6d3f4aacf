//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made during a run, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests returning the body text
//! - Classifying failures into timeouts, connection errors and HTTP statuses
//! - A fixed number of retries for transient failures

use crate::config::{ScraperConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Typed failure of a single fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("{url} returned HTTP {code}")]
    HttpStatus { url: String, code: u16 },

    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Returns true if another attempt could succeed
    ///
    /// Timeouts, connection failures, HTTP 429 and 5xx are transient; other
    /// statuses (404 for a removed listing, 403, ...) are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } => true,
            Self::HttpStatus { code, .. } => *code == 429 || (500..600).contains(code),
            Self::Body { .. } => false,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Extra request headers
    pub headers: Vec<(String, String)>,

    /// Overrides the client-wide timeout for this request
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    /// Adds a request header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code (always 2xx)
    pub status: u16,

    /// Response body
    pub body: String,
}

/// Source of page bodies
///
/// The production implementation is [`HttpFetcher`]; tests plug in
/// instrumented fetchers through this seam.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`; any non-2xx status is returned as `FetchError::HttpStatus`
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// The user agent has the form `CrawlerName/Version (+ContactURL; ContactEmail)`.
///
/// # Example
///
/// ```no_run
/// use car_harvest::config::{ScraperConfig, UserAgentConfig};
/// use car_harvest::crawler::build_http_client;
///
/// let scraper = ScraperConfig::with_base_url("https://auto.example.com/search/");
/// let user_agent = UserAgentConfig {
///     crawler_name: "CarHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&scraper, &user_agent).unwrap();
/// ```
pub fn build_http_client(
    scraper: &ScraperConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_millis(scraper.request_timeout_ms))
        .connect_timeout(Duration::from_millis(scraper.connect_timeout_ms))
        .pool_max_idle_per_host(scraper.max_concurrent_requests as usize)
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageFetcher` over reqwest with fixed-count retries
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the scraper and user-agent configuration
    pub fn new(scraper: &ScraperConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(scraper, user_agent)?,
            max_retries: scraper.max_retries,
            retry_delay: Duration::from_millis(scraper.retry_delay_ms),
        })
    }

    async fn fetch_once(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| classify_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url, options).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} ({}/{}) after: {}",
                        url,
                        attempt,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Maps a reqwest send error onto the fetch taxonomy
fn classify_error(url: &Url, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
