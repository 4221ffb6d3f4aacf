use async_trait::async_trait;
use car_harvest::config::{ScraperConfig, UserAgentConfig};
use car_harvest::crawler::{
    Coordinator, FetchError, FetchOptions, FetchedPage, HttpFetcher, PageFetcher,
};
use car_harvest::storage::SqliteListingStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestHarvester".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Scraper settings pointed at the mock catalog, without retries
pub fn settings(server: &MockServer, max_concurrent_requests: u32) -> ScraperConfig {
    let mut settings = ScraperConfig::with_base_url(format!("{}/search/?indexName=auto", server.uri()));
    settings.max_concurrent_requests = max_concurrent_requests;
    settings.request_timeout_ms = 5_000;
    settings.max_retries = 0;
    settings.retry_delay_ms = 10;
    settings
}

/// One fetch as seen by [`RecordingFetcher`]
#[derive(Debug, Clone)]
pub struct FetchSpan {
    pub path: String,
    pub started: usize,
    pub finished: usize,
}

/// HTTP fetcher that records ordering and concurrency of every request
pub struct RecordingFetcher {
    inner: HttpFetcher,
    clock: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    spans: Mutex<Vec<FetchSpan>>,
}

impl RecordingFetcher {
    pub fn new(settings: &ScraperConfig) -> Self {
        Self {
            inner: HttpFetcher::new(settings, &user_agent()).unwrap(),
            clock: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            spans: Mutex::new(Vec::new()),
        }
    }

    /// Highest number of requests observed in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn spans(&self) -> Vec<FetchSpan> {
        self.spans.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let started = self.clock.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        let result = self.inner.fetch(url, options).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let finished = self.clock.fetch_add(1, Ordering::SeqCst);
        self.spans.lock().unwrap().push(FetchSpan {
            path: url.path().to_string(),
            started,
            finished,
        });

        result
    }
}

/// A coordinator wired to the mock server and a fresh database
pub struct Harness {
    pub coordinator: Coordinator,
    pub fetcher: Arc<RecordingFetcher>,
    pub store: Arc<SqliteListingStore>,
    _dir: TempDir,
}

impl Harness {
    pub fn new(settings: ScraperConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteListingStore::open(&dir.path().join("cars.db"), 4).unwrap());
        let fetcher = Arc::new(RecordingFetcher::new(&settings));
        let coordinator = Coordinator::new(settings, fetcher.clone(), store.clone()).unwrap();

        Self {
            coordinator,
            fetcher,
            store,
            _dir: dir,
        }
    }
}

/// Catalog index page with a pagination bar reporting `total_pages`
pub fn index_page(total_pages: u32, hrefs: &[String]) -> String {
    let tickets: String = hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<section class="ticket-item">
                    <div class="content-bar"><a class="address" href="{}">car</a></div>
                </section>"#,
                href
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <div id="searchResults">{}</div>
        <nav id="searchPagination">
            <span class="page-item mhide"><a class="page-link" data-page="1">1</a></span>
            <span class="page-item mhide"><a class="page-link" data-page="{}">{}</a></span>
        </nav>
        </body></html>"#,
        tickets, total_pages, total_pages
    )
}

/// Listing detail page; `price` of `None` leaves out the price value
pub fn listing_page(title: &str, price: Option<&str>) -> String {
    let price = price
        .map(|p| format!(r#"<div class="price_value"><strong>{}</strong></div>"#, p))
        .unwrap_or_default();
    format!(
        r#"<html><body>
        <h1 class="head">{}</h1>
        {}
        <div class="base-information"><span>120</span> тис. км</div>
        <span class="label-vin">VIN{}</span>
        </body></html>"#,
        title,
        price,
        title.to_uppercase()
    )
}

pub async fn mount_index(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_listing(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}
