//! Scrape coordinator - main pipeline orchestration
//!
//! A run goes through three phases that never overlap:
//! - resolving the page count from page 1 of the catalog
//! - fetching every index page concurrently and collecting listing URLs
//! - fetching, parsing and persisting every unique listing concurrently
//!
//! All fetches of a run share one [`Throttle`], so the number of requests in
//! flight never exceeds `max-concurrent-requests`.

use crate::config::{Config, ScraperConfig};
use crate::crawler::detail_parser::parse_listing;
use crate::crawler::fetcher::{FetchOptions, HttpFetcher, PageFetcher};
use crate::crawler::index_parser::parse_listing_urls;
use crate::crawler::pagination::resolve_page_count;
use crate::crawler::phone::parse_phone_response;
use crate::crawler::throttle::Throttle;
use crate::state::{ListingOutcome, PipelineState, Summary};
use crate::storage::{open_store, ListingRecord, ListingStore, PersistOutcome};
use crate::url::index_page_url;
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

/// Index pages between two progress lines
const INDEX_PROGRESS_EVERY: u32 = 10;

/// Listings between two progress lines
const DETAIL_PROGRESS_EVERY: u64 = 50;

/// Runs the scrape pipeline against one catalog
pub struct Coordinator {
    base_url: Url,
    settings: ScraperConfig,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ListingStore>,
    throttle: Throttle,
    state: Mutex<PipelineState>,
}

impl Coordinator {
    /// Creates a coordinator from its parts
    ///
    /// # Arguments
    ///
    /// * `settings` - The scraper section of the configuration
    /// * `fetcher` - Transport used for every request of the run
    /// * `store` - Destination of the extracted records
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run, in the `Idle` state
    /// * `Err(HarvestError)` - The base URL could not be parsed
    pub fn new(
        settings: ScraperConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn ListingStore>,
    ) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        let throttle = Throttle::new(settings.max_concurrent_requests as usize);

        Ok(Self {
            base_url,
            settings,
            fetcher,
            store,
            throttle,
            state: Mutex::new(PipelineState::Idle),
        })
    }

    /// Builds the HTTP fetcher and opens the SQLite store described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.scraper, &config.user_agent)?;
        let store = open_store(&config.database)?;
        tracing::info!(
            "Using database {} (pool size {})",
            config.database.path,
            config.database.pool_size
        );

        Self::new(config.scraper.clone(), Arc::new(fetcher), Arc::new(store))
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        self.lock_state().clone()
    }

    /// The throttle shared by every fetch of this coordinator
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, next: PipelineState) -> Result<()> {
        let mut state = self.lock_state();
        if !state.can_transition_to(&next) {
            return Err(HarvestError::InvalidTransition {
                from: state.name().to_string(),
                to: next.name().to_string(),
            });
        }

        tracing::info!("Pipeline: {} -> {}", state.name(), next.name());
        *state = next;
        Ok(())
    }

    /// Runs one complete scrape
    ///
    /// Page-level and listing-level failures are counted in the returned
    /// [`Summary`] and never abort the run. The only fatal error is failing to
    /// fetch page 1, in which case nothing is persisted and the coordinator ends
    /// up `Failed`. Calling this while another run is in progress returns
    /// `HarvestError::InvalidTransition`.
    ///
    /// Dropping the returned future mid-run aborts the in-flight tasks and
    /// leaves the coordinator `Failed("interrupted")`, ready for the next run.
    pub async fn run_scrape(&self) -> Result<Summary> {
        let started = Instant::now();
        self.transition(PipelineState::ResolvingPagination)?;
        let _guard = InterruptGuard { coordinator: self };

        let reported = match resolve_page_count(
            self.fetcher.as_ref(),
            &self.throttle,
            &self.base_url,
            self.settings.page_size,
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("{}", e);
                self.transition(PipelineState::Failed(e.to_string()))?;
                return Err(e);
            }
        };

        let pages_total = match self.settings.max_pages {
            Some(max) if max < reported => {
                tracing::info!("Limiting crawl to {} of {} index pages", max, reported);
                max
            }
            _ => reported,
        };

        let mut summary = Summary {
            pages_total,
            ..Summary::default()
        };

        self.transition(PipelineState::CrawlingIndex)?;
        let listings = self.crawl_index(&mut summary).await;
        summary.listings_discovered = listings.len() as u64;
        tracing::info!(
            "Index phase complete: {} unique listings from {} page(s), {} page(s) skipped",
            summary.listings_discovered,
            summary.pages_crawled,
            summary.pages_skipped
        );

        self.transition(PipelineState::CrawlingDetails)?;
        self.crawl_details(listings, &mut summary).await;

        summary.elapsed = started.elapsed();
        tracing::info!(
            "Scrape complete: {} inserted, {} skipped, {} failed in {:.2}s",
            summary.records_inserted,
            summary.records_skipped,
            summary.records_failed,
            summary.elapsed.as_secs_f64()
        );

        self.transition(PipelineState::Done(summary.clone()))?;
        Ok(summary)
    }

    /// Fetches index pages `1..=pages_total` and returns the unique listing URLs
    ///
    /// Results are merged in page order, so the first occurrence of a URL wins
    /// regardless of which page finished first.
    async fn crawl_index(&self, summary: &mut Summary) -> Vec<Url> {
        let mut tasks = JoinSet::new();

        for page in 1..=summary.pages_total {
            let url = index_page_url(&self.base_url, page, self.settings.page_size);
            let fetcher = Arc::clone(&self.fetcher);
            let throttle = self.throttle.clone();

            tasks.spawn(async move {
                let result = throttle
                    .fetch(fetcher.as_ref(), &url, &FetchOptions::default())
                    .await
                    .map(|fetched| parse_listing_urls(&fetched.body, &fetched.url));
                (page, result)
            });
        }

        let mut pages: Vec<(u32, Vec<Url>)> = Vec::with_capacity(summary.pages_total as usize);
        let mut finished = 0;

        while let Some(joined) = tasks.join_next().await {
            finished += 1;
            match joined {
                Ok((page, Ok(urls))) => {
                    tracing::debug!("Index page {} yielded {} listing(s)", page, urls.len());
                    summary.pages_crawled += 1;
                    pages.push((page, urls));
                }
                Ok((page, Err(e))) => {
                    tracing::warn!("Skipping index page {}: {}", page, e);
                    summary.pages_skipped += 1;
                }
                Err(e) => {
                    tracing::error!("Index task panicked: {}", e);
                    summary.pages_skipped += 1;
                }
            }

            if finished % INDEX_PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {}/{} index pages done",
                    finished,
                    summary.pages_total
                );
            }
        }

        pages.sort_by_key(|(page, _)| *page);

        let mut seen = HashSet::new();
        pages
            .into_iter()
            .flat_map(|(_, urls)| urls)
            .filter(|url| seen.insert(url.as_str().to_string()))
            .collect()
    }

    /// Processes every listing and folds the outcomes into `summary`
    async fn crawl_details(&self, listings: Vec<Url>, summary: &mut Summary) {
        let worker = DetailWorker {
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            throttle: self.throttle.clone(),
            resolve_phone_numbers: self.settings.resolve_phone_numbers,
        };

        let mut tasks = JoinSet::new();
        for url in listings {
            let worker = worker.clone();
            tasks.spawn(async move { worker.process(url).await });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                tracing::error!("Listing task panicked: {}", e);
                ListingOutcome::Failed
            });
            summary.record(outcome);

            let processed = summary.records_processed();
            if processed % DETAIL_PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {}/{} listings ({} inserted, {} skipped, {} failed)",
                    processed,
                    summary.listings_discovered,
                    summary.records_inserted,
                    summary.records_skipped,
                    summary.records_failed
                );
            }
        }
    }
}

/// Marks a run that was dropped before reaching a terminal state
struct InterruptGuard<'a> {
    coordinator: &'a Coordinator,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.coordinator.lock_state();
        if state.is_active() {
            tracing::warn!("Run interrupted during {}", state.name());
            *state = PipelineState::Failed("interrupted".to_string());
        }
    }
}

/// Everything a detail task needs, cloned into each task
#[derive(Clone)]
struct DetailWorker {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ListingStore>,
    throttle: Throttle,
    resolve_phone_numbers: bool,
}

impl DetailWorker {
    /// Fetch, extract and persist one listing
    ///
    /// One permit covers the detail fetch and its phone lookup; it is released
    /// before the database write.
    async fn process(&self, url: Url) -> ListingOutcome {
        let permit = self.throttle.acquire().await;

        let page = match self.fetcher.fetch(&url, &FetchOptions::default()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch listing: {}", e);
                return ListingOutcome::Failed;
            }
        };

        let parsed = match parse_listing(&page.body, &url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("{}", e);
                return ListingOutcome::Failed;
            }
        };

        let mut record = parsed.record;
        if self.resolve_phone_numbers {
            if let Some(phone_url) = parsed.phone_lookup.and_then(|lookup| lookup.url(&url)) {
                record.phone_number = self.lookup_phone(&phone_url).await;
            }
        }
        drop(permit);

        self.persist(&record).await
    }

    async fn lookup_phone(&self, phone_url: &Url) -> Option<String> {
        let options = FetchOptions::default().with_header("X-Requested-With", "XMLHttpRequest");
        match self.fetcher.fetch(phone_url, &options).await {
            Ok(response) => {
                let phone = parse_phone_response(&response.body);
                if phone.is_none() {
                    tracing::debug!("No phone number in response from {}", phone_url);
                }
                phone
            }
            Err(e) => {
                tracing::debug!("Phone lookup failed: {}", e);
                None
            }
        }
    }

    async fn persist(&self, record: &ListingRecord) -> ListingOutcome {
        match self.store.persist(record).await {
            PersistOutcome::Inserted => {
                tracing::debug!("Inserted {}", record.url);
                ListingOutcome::Inserted
            }
            PersistOutcome::Skipped => {
                tracing::debug!("Already stored: {}", record.url);
                ListingOutcome::Skipped
            }
            PersistOutcome::Failed(e) => {
                tracing::error!("Failed to store {}: {}", record.url, e);
                ListingOutcome::Failed
            }
        }
    }
}

/// Runs a complete scrape with the HTTP fetcher and SQLite store from `config`
///
/// # Arguments
///
/// * `config` - The validated configuration
///
/// # Returns
///
/// * `Ok(Summary)` - The run reached `Done`
/// * `Err(HarvestError)` - Set-up failed or page 1 could not be fetched
pub async fn run_scrape(config: &Config) -> Result<Summary> {
    Coordinator::from_config(config)?.run_scrape().await
}
