/// Pipeline state definitions for one scrape run
use crate::state::Summary;
use std::fmt;

/// The phase a scrape run is in
///
/// ```text
/// Idle -> ResolvingPagination -> CrawlingIndex -> CrawlingDetails -> Done
///                  |
///                  +-> Failed
/// ```
///
/// Within a run, `Failed` is only reachable while resolving pagination: once at least one
/// page is known, every later failure is counted per item and the run still
/// reaches `Done`. A run whose future is dropped part-way is also left in
/// `Failed`, set directly rather than through this table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PipelineState {
    /// No run in progress
    #[default]
    Idle,

    /// Fetching page 1 to learn the page count
    ResolvingPagination,

    /// Collecting listing URLs from every index page
    CrawlingIndex,

    /// Fetching, parsing and persisting unique listings
    CrawlingDetails,

    /// Run finished; carries the final counters
    Done(Summary),

    /// Run aborted before any page could be crawled
    Failed(String),
}

impl PipelineState {
    /// Returns true while a run is in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::ResolvingPagination | Self::CrawlingIndex | Self::CrawlingDetails
        )
    }

    /// Checks whether moving from `self` to `next` is allowed
    ///
    /// A terminal state may start a new run (`-> ResolvingPagination`), since a
    /// scraper can be invoked repeatedly.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, next),
            (Idle, ResolvingPagination)
                | (Done(_), ResolvingPagination)
                | (Failed(_), ResolvingPagination)
                | (ResolvingPagination, CrawlingIndex)
                | (ResolvingPagination, Failed(_))
                | (CrawlingIndex, CrawlingDetails)
                | (CrawlingDetails, Done(_))
        )
    }

    /// Short lowercase name of the state, without payload
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingPagination => "resolving_pagination",
            Self::CrawlingIndex => "crawling_index",
            Self::CrawlingDetails => "crawling_details",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
