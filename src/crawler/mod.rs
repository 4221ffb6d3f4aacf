//! Crawler module for catalog fetching and listing extraction
//!
//! This module contains the scraping logic, including:
//! - HTTP fetching with fixed-delay retries
//! - A global throttle shared by every request of a run
//! - Pagination, index and detail page parsing
//! - Pipeline coordination from page 1 to the final summary

mod coordinator;
mod detail_parser;
mod fetcher;
mod html;
mod index_parser;
mod pagination;
mod phone;
mod throttle;

pub use coordinator::{run_scrape, Coordinator};
pub use detail_parser::{parse_listing, ExtractionError, ParsedListing};
pub use fetcher::{
    build_http_client, FetchError, FetchOptions, FetchedPage, HttpFetcher, PageFetcher,
};
pub use index_parser::parse_listing_urls;
pub use pagination::{parse_page_count, resolve_page_count};
pub use phone::{parse_phone_response, PhoneLookup};
pub use throttle::{Throttle, ThrottlePermit};
