//! Page-count discovery for the catalog
//!
//! The catalog renders a pagination bar whose links carry their page number in
//! `data-page`. The largest number is the page count; a catalog without the
//! bar has a single page.

use crate::crawler::fetcher::{FetchOptions, PageFetcher};
use crate::crawler::html::{element_text, selector};
use crate::crawler::throttle::Throttle;
use crate::url::index_page_url;
use crate::HarvestError;
use scraper::Html;
use url::Url;

/// Links of the pagination bar
const PAGINATION_LINKS: &str = "#searchPagination .page-item.mhide a.page-link";

/// Reads the page count from the first index page
///
/// Links without a usable `data-page` fall back to their text. Anything
/// unreadable yields 1.
pub fn parse_page_count(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let Some(links) = selector(PAGINATION_LINKS) else {
        return 1;
    };

    document
        .select(&links)
        .filter_map(|link| {
            link.value()
                .attr("data-page")
                .and_then(|page| page.trim().parse::<u32>().ok())
                .or_else(|| element_text(link).parse::<u32>().ok())
        })
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Fetches page 1 of the catalog and returns the number of index pages
///
/// # Errors
///
/// `HarvestError::Pagination` when page 1 cannot be fetched; nothing can be
/// crawled in that case.
pub async fn resolve_page_count(
    fetcher: &dyn PageFetcher,
    throttle: &Throttle,
    base_url: &Url,
    page_size: u32,
) -> Result<u32, HarvestError> {
    let first_page = index_page_url(base_url, 1, page_size);
    tracing::debug!("Resolving pagination from {}", first_page);

    let page = throttle
        .fetch(fetcher, &first_page, &FetchOptions::default())
        .await
        .map_err(|source| HarvestError::Pagination {
            url: first_page.to_string(),
            source,
        })?;

    let count = parse_page_count(&page.body);
    tracing::info!("Catalog reports {} index page(s)", count);
    Ok(count)
}
