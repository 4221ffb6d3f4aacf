//! Global request throttle
//!
//! One counting semaphore caps the number of fetches in flight for a whole run.
//! The pagination request, every index page, every listing page and its phone
//! lookup all draw from the same pool of permits.

use crate::crawler::fetcher::{FetchError, FetchOptions, FetchedPage, PageFetcher};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Authorization for one in-flight fetch; released on drop
#[derive(Debug)]
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

/// Shared concurrency limiter
///
/// Cloning is cheap and every clone draws from the same permits. Waiters are
/// woken in FIFO order, so no fetch waits forever while others keep cycling.
#[derive(Debug, Clone)]
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Throttle {
    /// Creates a throttle allowing `capacity` concurrent fetches (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot
    pub async fn acquire(&self) -> ThrottlePermit {
        match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => ThrottlePermit { _permit: permit },
            // The semaphore is private and never closed.
            Err(_) => unreachable!("throttle semaphore closed"),
        }
    }

    /// Runs one fetch while holding a permit
    pub async fn fetch(
        &self,
        fetcher: &dyn PageFetcher,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<FetchedPage, FetchError> {
        let _permit = self.acquire().await;
        fetcher.fetch(url, options).await
    }

    /// Maximum number of concurrent fetches
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
