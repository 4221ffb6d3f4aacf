//! Reports for a finished run and for the listing store

use crate::state::Summary;
use crate::storage::StoreStats;

/// Share of discovered listings that ended up stored (inserted or already present)
pub fn success_rate(summary: &Summary) -> f64 {
    if summary.listings_discovered == 0 {
        return 0.0;
    }
    let stored = summary.records_inserted + summary.records_skipped;
    (stored as f64 / summary.listings_discovered as f64) * 100.0
}

/// Renders the final counters of a run
pub fn format_summary(summary: &Summary) -> String {
    let mut out = String::new();

    out.push_str("=== Scrape Summary ===\n\n");

    out.push_str("Index Pages:\n");
    out.push_str(&format!("  Total: {}\n", summary.pages_total));
    out.push_str(&format!("  Crawled: {}\n", summary.pages_crawled));
    out.push_str(&format!("  Skipped: {}\n\n", summary.pages_skipped));

    out.push_str("Listings:\n");
    out.push_str(&format!("  Discovered: {}\n", summary.listings_discovered));
    out.push_str(&format!("  Inserted: {}\n", summary.records_inserted));
    out.push_str(&format!("  Already stored: {}\n", summary.records_skipped));
    out.push_str(&format!("  Failed: {}\n\n", summary.records_failed));

    out.push_str(&format!(
        "Elapsed: {:.2}s\n",
        summary.elapsed.as_secs_f64()
    ));
    out.push_str(&format!(
        "Success Rate: {:.1}% ({} / {} listings stored)\n",
        success_rate(summary),
        summary.records_inserted + summary.records_skipped,
        summary.listings_discovered
    ));

    out
}

/// Prints the final counters of a run to stdout
pub fn print_summary(summary: &Summary) {
    print!("{}", format_summary(summary));
}

/// Prints aggregate statistics of the listing store to stdout
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_store_stats(stats: &StoreStats) {
    println!("=== Listing Store Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", stats.total);

    let share = |count: u64| {
        if stats.total > 0 {
            (count as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        }
    };

    println!(
        "  With price: {} ({:.1}%)",
        stats.with_price,
        share(stats.with_price)
    );
    println!(
        "  With phone number: {} ({:.1}%)",
        stats.with_phone,
        share(stats.with_phone)
    );
    println!("  With VIN: {} ({:.1}%)", stats.with_vin, share(stats.with_vin));
    println!();

    if let (Some(first), Some(last)) = (stats.first_found, stats.last_found) {
        println!("Found Between:");
        println!("  First: {}", first.to_rfc3339());
        println!("  Last: {}", last.to_rfc3339());
    }
}
