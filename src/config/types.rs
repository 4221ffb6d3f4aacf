use serde::Deserialize;

/// Main configuration structure for Car-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub database: DatabaseConfig,
}

/// Catalog and request behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Search URL of the catalog; `page` and `size` are appended per index page
    pub base_url: String,

    /// Maximum number of fetches in flight across the whole run
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Total per-request timeout (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connection establishment timeout (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Listings requested per index page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on the number of index pages crawled
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Extra attempts for transient failures (timeouts, 429, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Whether to query the seller phone endpoint for every listing
    #[serde(default = "default_resolve_phone_numbers")]
    pub resolve_phone_numbers: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Listing store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,

    /// Maximum number of open connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_max_concurrent_requests() -> u32 {
    30
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    60_000
}

fn default_page_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_resolve_phone_numbers() -> bool {
    true
}

fn default_pool_size() -> u32 {
    5
}

impl ScraperConfig {
    /// Builds a scraper section for `base_url` with every other key at its default
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            page_size: default_page_size(),
            max_pages: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            resolve_phone_numbers: default_resolve_phone_numbers(),
        }
    }
}
