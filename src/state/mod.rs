//! State module for tracking scrape progress
//!
//! # Components
//!
//! - `PipelineState`: the phase a scrape run is in, from `Idle` to `Done`/`Failed`
//! - `Summary`: per-run counters carried by the `Done` state

mod pipeline_state;
mod summary;

pub use pipeline_state::PipelineState;
pub use summary::{ListingOutcome, Summary};
