use std::time::Duration;

/// Final disposition of one discovered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    /// A new row was written
    Inserted,
    /// The URL was already stored
    Skipped,
    /// Fetch, extraction or persistence failed
    Failed,
}

/// Counters for one scrape run
///
/// Every discovered listing ends up in exactly one of `records_inserted`,
/// `records_skipped` or `records_failed`, so the three always add up to
/// `listings_discovered`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    /// Index pages the catalog reported
    pub pages_total: u32,

    /// Index pages fetched and parsed
    pub pages_crawled: u32,

    /// Index pages whose fetch failed
    pub pages_skipped: u32,

    /// Unique listing URLs across all index pages
    pub listings_discovered: u64,

    pub records_inserted: u64,
    pub records_skipped: u64,
    pub records_failed: u64,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl Summary {
    /// Counts one listing outcome
    pub fn record(&mut self, outcome: ListingOutcome) {
        match outcome {
            ListingOutcome::Inserted => self.records_inserted += 1,
            ListingOutcome::Skipped => self.records_skipped += 1,
            ListingOutcome::Failed => self.records_failed += 1,
        }
    }

    /// Number of listings that have reached a final outcome
    pub fn records_processed(&self) -> u64 {
        self.records_inserted + self.records_skipped + self.records_failed
    }
}
