//! Output module for run summaries and store statistics
//!
//! Everything here writes human-readable reports to stdout; structured
//! progress goes through `tracing` instead.

pub mod stats;

pub use stats::{format_summary, print_store_stats, print_summary, success_rate};
