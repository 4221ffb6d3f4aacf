//! Storage module for persisting scraped listings
//!
//! This module handles all database operations, including:
//! - SQLite schema bootstrap for the `cars` table
//! - A bounded connection pool shared by all detail workers
//! - Insert-or-ignore persistence keyed on the listing URL
//! - Aggregate statistics for the `--stats` mode

mod pool;
mod schema;
mod sqlite;
mod traits;

pub use pool::{ConnectionPool, PooledConnection};
pub use sqlite::SqliteListingStore;
pub use traits::{ListingStore, PersistError, PersistOutcome, StorageError, StorageResult};

use crate::config::DatabaseConfig;
use chrono::{DateTime, Utc};
use std::path::Path;
use url::Url;

/// Opens the store described by the database section of the configuration
pub fn open_store(config: &DatabaseConfig) -> StorageResult<SqliteListingStore> {
    SqliteListingStore::open(Path::new(&config.path), config.pool_size as usize)
}

/// One scraped car listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    /// Normalized listing URL; unique key
    pub url: String,
    pub title: Option<String>,
    pub price_usd: Option<u64>,
    /// Kilometres
    pub odometer: Option<u64>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    pub images_count: Option<u32>,
    pub car_number: Option<String>,
    pub car_vin: Option<String>,
    /// When the listing was scraped
    pub found_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Creates a record for `url` with every optional field absent
    pub fn new(url: &Url) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            price_usd: None,
            odometer: None,
            username: None,
            phone_number: None,
            image_url: None,
            images_count: None,
            car_number: None,
            car_vin: None,
            found_at: Utc::now(),
        }
    }
}

/// Aggregate view of the stored listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total: u64,
    pub with_price: u64,
    pub with_phone: u64,
    pub with_vin: u64,
    pub first_found: Option<DateTime<Utc>>,
    pub last_found: Option<DateTime<Utc>>,
}
