//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `ListingStore` trait.

use crate::storage::pool::ConnectionPool;
use crate::storage::traits::{
    ListingStore, PersistError, PersistOutcome, StorageError, StorageResult,
};
use crate::storage::{ListingRecord, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const INSERT_SQL: &str = "
    INSERT INTO cars (url, title, price_usd, odometer, username, phone_number,
                      image_url, images_count, car_number, car_vin, datetime_found)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT (url) DO NOTHING";

const SELECT_BY_URL_SQL: &str = "
    SELECT url, title, price_usd, odometer, username, phone_number,
           image_url, images_count, car_number, car_vin, datetime_found
    FROM cars WHERE url = ?1";

/// SQLite listing store backed by a bounded connection pool
pub struct SqliteListingStore {
    pool: ConnectionPool,
}

impl SqliteListingStore {
    /// Opens (creating if needed) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `pool_size` - Maximum number of concurrently open connections
    pub fn open(path: &Path, pool_size: usize) -> StorageResult<Self> {
        let pool = ConnectionPool::open(path, pool_size)?;
        tracing::debug!(
            "Opened listing store at {} (pool size {})",
            path.display(),
            pool.size()
        );
        Ok(Self { pool })
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

/// Every query runs on tokio's blocking pool with a connection moved into it.
#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn persist(&self, record: &ListingRecord) -> PersistOutcome {
        if record.url.is_empty() {
            return PersistOutcome::Failed(PersistError::Other(
                "listing url is empty".to_string(),
            ));
        }

        let conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => return PersistOutcome::Failed(PersistError::ConnectionLost(e.to_string())),
        };

        let record = record.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = insert_record(&conn, &record);
            if matches!(result, Err(PersistError::ConnectionLost(_))) {
                conn.discard();
            }
            result
        })
        .await;

        match joined {
            Ok(result) => PersistOutcome::from_insert(result),
            Err(e) => PersistOutcome::Failed(PersistError::Other(format!(
                "insert task failed: {}",
                e
            ))),
        }
    }

    async fn find_by_url(&self, url: &str) -> StorageResult<Option<ListingRecord>> {
        let conn = self.pool.acquire().await?;
        let url = url.to_string();

        let row = tokio::task::spawn_blocking(move || {
            conn.query_row(SELECT_BY_URL_SQL, params![url], read_raw_record)
                .optional()
        })
        .await??;

        row.map(RawRecord::into_record).transpose()
    }

    async fn stats(&self) -> StorageResult<StoreStats> {
        let conn = self.pool.acquire().await?;
        let (total, with_price, with_phone, with_vin, first, last) =
            tokio::task::spawn_blocking(move || {
                conn.query_row(
                    "SELECT COUNT(*), COUNT(price_usd), COUNT(phone_number), COUNT(car_vin),
                            MIN(datetime_found), MAX(datetime_found)
                     FROM cars",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<String>>(5)?,
                        ))
                    },
                )
            })
            .await??;

        Ok(StoreStats {
            total: total.max(0) as u64,
            with_price: with_price.max(0) as u64,
            with_phone: with_phone.max(0) as u64,
            with_vin: with_vin.max(0) as u64,
            first_found: first.as_deref().map(parse_timestamp).transpose()?,
            last_found: last.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Single-row insert-or-ignore; `Ok(0)` means the URL was already stored
fn insert_record(conn: &Connection, record: &ListingRecord) -> Result<usize, PersistError> {
    conn.execute(
        INSERT_SQL,
        params![
            record.url,
            record.title,
            record.price_usd.and_then(to_db_int),
            record.odometer.and_then(to_db_int),
            record.username,
            record.phone_number,
            record.image_url,
            record.images_count,
            record.car_number,
            record.car_vin,
            format_timestamp(&record.found_at),
        ],
    )
    .map_err(|e| classify_error(&e))
}

/// Row image before integer and timestamp conversion
struct RawRecord {
    url: String,
    title: Option<String>,
    price_usd: Option<i64>,
    odometer: Option<i64>,
    username: Option<String>,
    phone_number: Option<String>,
    image_url: Option<String>,
    images_count: Option<i64>,
    car_number: Option<String>,
    car_vin: Option<String>,
    found_at: String,
}

impl RawRecord {
    fn into_record(self) -> StorageResult<ListingRecord> {
        Ok(ListingRecord {
            url: self.url,
            title: self.title,
            price_usd: self.price_usd.and_then(|v| u64::try_from(v).ok()),
            odometer: self.odometer.and_then(|v| u64::try_from(v).ok()),
            username: self.username,
            phone_number: self.phone_number,
            image_url: self.image_url,
            images_count: self.images_count.and_then(|v| u32::try_from(v).ok()),
            car_number: self.car_number,
            car_vin: self.car_vin,
            found_at: parse_timestamp(&self.found_at)?,
        })
    }
}

fn read_raw_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        url: row.get(0)?,
        title: row.get(1)?,
        price_usd: row.get(2)?,
        odometer: row.get(3)?,
        username: row.get(4)?,
        phone_number: row.get(5)?,
        image_url: row.get(6)?,
        images_count: row.get(7)?,
        car_number: row.get(8)?,
        car_vin: row.get(9)?,
        found_at: row.get(10)?,
    })
}

/// Values above `i64::MAX` cannot be stored and are written as NULL
fn to_db_int(value: u64) -> Option<i64> {
    i64::try_from(value).ok()
}

/// Fixed-width UTC timestamps so lexical order matches time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidValue(format!("datetime_found '{}': {}", raw, e)))
}

/// Maps a driver error onto the persist taxonomy
fn classify_error(err: &rusqlite::Error) -> PersistError {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            PersistError::DuplicateKey
        }
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::NotADatabase
            ) =>
        {
            PersistError::ConnectionLost(err.to_string())
        }
        _ => PersistError::Other(err.to_string()),
    }
}
