//! URL handling module for Car-Harvest
//!
//! Listing URLs are the natural key of a stored record, so every link taken from
//! an index page goes through the same normalization before it is compared,
//! fetched or persisted. This module also builds the per-page catalog URLs.

mod catalog;
mod normalize;

pub use catalog::index_page_url;
pub use normalize::{normalize_url, resolve_link};
