//! Database schema definitions
//!
//! The `cars` table is normally provisioned ahead of time; the statement below
//! only creates it when it is missing, so opening an existing database never
//! alters it.

/// SQL schema for the listing store
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cars (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT,
    price_usd INTEGER,
    odometer INTEGER,
    username TEXT,
    phone_number TEXT,
    image_url TEXT,
    images_count INTEGER,
    car_number TEXT,
    car_vin TEXT,
    datetime_found TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cars_datetime_found ON cars(datetime_found);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
