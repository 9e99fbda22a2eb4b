//! Statistics generation from the progress database
//!
//! This module provides functionality for extracting and displaying
//! stored progress for one year.

use crate::record::ConfidenceRating;
use crate::storage::{ProgressStore, RunRecord, StoreResult, YearStatistics};

/// Stored progress for a year plus its most recent run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub year: YearStatistics,
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from the progress store
///
/// # Arguments
///
/// * `store` - The progress store to query
/// * `year` - The year to report on
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StoreError)` - Failed to query statistics
pub fn load_statistics(store: &dyn ProgressStore, year: i32) -> StoreResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        year: store.year_statistics(year)?,
        latest_run: store.latest_run(year)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    let year = &stats.year;
    println!("=== Progress for {} ===\n", year.year);

    println!("Overview:");
    println!("  Completed records: {}", year.completed);
    println!("  Skipped records: {}", year.skipped);
    println!("  Runs: {}", year.runs);
    println!();

    println!("Records by Confidence:");
    for rating in [
        ConfidenceRating::High,
        ConfidenceRating::Medium,
        ConfidenceRating::Low,
    ] {
        let count = year.by_confidence.get(&rating).copied().unwrap_or(0);
        let percentage = if year.completed > 0 {
            (count as f64 / year.completed as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", rating, count, percentage);
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
            println!("  Phase: {}", run.phase);
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded for {}", year.year),
    }
}
