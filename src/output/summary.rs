//! End-of-crawl reports

use crate::crawler::ListingAnomaly;
use crate::output::{Dataset, ValidationReport};
use crate::record::ConfidenceRating;
use crate::state::{CrawlPhase, SkippedRecord};
use std::path::PathBuf;
use std::time::Duration;

/// Summary of one year's crawl
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub year: i32,
    pub run_id: Option<i64>,
    pub phase: CrawlPhase,

    // Discovery
    pub pages_visited: u32,
    pub reported_total: Option<u32>,
    pub discovered: usize,
    pub duplicate_links: usize,
    pub anomalies: Vec<ListingAnomaly>,

    // Records
    pub resumed: usize,
    pub fetched: usize,
    pub completed: usize,
    pub skipped: Vec<SkippedRecord>,
    pub low: usize,
    pub medium: usize,
    pub high: usize,

    pub validation: ValidationReport,
    pub output_path: Option<PathBuf>,
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Tallies confidence ratings over the final dataset
    pub fn count_confidence(&mut self, dataset: &Dataset) {
        self.low = 0;
        self.medium = 0;
        self.high = 0;
        for record in &dataset.records {
            match record.confidence {
                ConfidenceRating::Low => self.low += 1,
                ConfidenceRating::Medium => self.medium += 1,
                ConfidenceRating::High => self.high += 1,
            }
        }
    }

    /// Discovered records neither completed nor skipped
    pub fn unattempted(&self) -> usize {
        self.discovered
            .saturating_sub(self.completed)
            .saturating_sub(self.skipped.len())
    }
}

/// Prints a crawl summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== ASN Harvest: {} ===\n", summary.year);

    println!("Run:");
    if let Some(run_id) = summary.run_id {
        println!("  Run id: {}", run_id);
    }
    println!("  Final phase: {}", summary.phase);
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Discovery:");
    println!("  Listing pages visited: {}", summary.pages_visited);
    match summary.reported_total {
        Some(total) => println!(
            "  Record links: {} (site reports {})",
            summary.discovered, total
        ),
        None => println!("  Record links: {}", summary.discovered),
    }
    if summary.duplicate_links > 0 {
        println!("  Duplicate links ignored: {}", summary.duplicate_links);
    }
    println!();

    println!("Records:");
    println!("  Completed: {}", summary.completed);
    println!("    from earlier runs: {}", summary.resumed);
    println!("    fetched this run: {}", summary.fetched);
    println!("  Skipped: {}", summary.skipped.len());
    if summary.unattempted() > 0 {
        println!("  Not attempted: {}", summary.unattempted());
    }
    println!(
        "  Confidence: {} high, {} medium, {} low",
        summary.high, summary.medium, summary.low
    );
    println!();

    if !summary.validation.is_clean() {
        println!("Validation:");
        println!(
            "  Duplicates removed: {}",
            summary.validation.duplicates_removed
        );
        println!("  Keyless rows removed: {}", summary.validation.missing_urls);
        println!();
    }

    print_anomalies(&summary.anomalies);

    if !summary.skipped.is_empty() {
        println!("Skipped Records ({}):", summary.skipped.len());
        for skipped in &summary.skipped {
            println!("  - {}: {}", skipped.url, skipped.reason);
        }
        println!();
    }

    if let Some(path) = &summary.output_path {
        println!("Dataset written to {}", path.display());
    }
}

/// Result of a discovery-only pass over a year
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub year: i32,
    pub pages_visited: u32,
    pub reported_total: Option<u32>,
    pub links: usize,
    pub duplicate_links: usize,
    /// Listing captions that disagreed with their page or an earlier page
    pub anomalies: Vec<ListingAnomaly>,
    /// Links already committed in the progress store
    pub already_completed: usize,
}

impl DiscoveryReport {
    pub fn remaining(&self) -> usize {
        self.links.saturating_sub(self.already_completed)
    }
}

/// Prints a discovery report to stdout
pub fn print_discovery_report(report: &DiscoveryReport) {
    println!("=== ASN Analysis: {} ===\n", report.year);
    println!("  Listing pages: {}", report.pages_visited);
    if let Some(total) = report.reported_total {
        println!("  Occurrences reported by site: {}", total);
    }
    println!("  Record links found: {}", report.links);
    if report.duplicate_links > 0 {
        println!("  Duplicate links ignored: {}", report.duplicate_links);
    }
    println!("  Already completed: {}", report.already_completed);
    println!("  Remaining to fetch: {}", report.remaining());

    if !report.anomalies.is_empty() {
        println!();
        print_anomalies(&report.anomalies);
    }
}

fn print_anomalies(anomalies: &[ListingAnomaly]) {
    if anomalies.is_empty() {
        return;
    }
    println!("Listing Anomalies ({}):", anomalies.len());
    for anomaly in anomalies {
        println!("  - {}", anomaly);
    }
    println!();
}
