//! Integration tests for the scrape pipeline
//!
//! These tests use wiremock to serve a small catalog and run the full
//! pipeline end-to-end against a temporary SQLite database.

mod common;
mod scrape_tests;
