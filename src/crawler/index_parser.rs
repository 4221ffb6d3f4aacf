//! Listing-link extraction from catalog index pages

use crate::crawler::html::selector;
use crate::url::resolve_link;
use scraper::Html;
use std::collections::HashSet;
use url::Url;

/// Listing links inside the search results
const LISTING_LINKS: &str = "div#searchResults section.ticket-item .address[href]";

/// Extracts listing URLs from one index page
///
/// Links are resolved against `page_url` and normalized. Duplicates are removed
/// and the first-seen order is kept. A page without listings yields an empty
/// vector.
///
/// # Example
///
/// ```
/// use car_harvest::crawler::parse_listing_urls;
/// use url::Url;
///
/// let html = r#"<div id="searchResults">
///     <section class="ticket-item"><a class="address" href="/auto_1.html">BMW</a></section>
/// </div>"#;
/// let page = Url::parse("https://auto.example.com/search/?page=1").unwrap();
/// let urls = parse_listing_urls(html, &page);
/// assert_eq!(urls[0].as_str(), "https://auto.example.com/auto_1.html");
/// ```
pub fn parse_listing_urls(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Some(links) = selector(LISTING_LINKS) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for element in document.select(&links) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        match resolve_link(href, page_url) {
            Some(url) => {
                if seen.insert(url.as_str().to_string()) {
                    urls.push(url);
                }
            }
            None => tracing::trace!("Ignoring non-listing href '{}' on {}", href, page_url),
        }
    }

    urls
}
