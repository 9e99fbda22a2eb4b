//! Output module for datasets and crawl reports
//!
//! This module handles:
//! - Validating and writing the per-year CSV dataset
//! - Printing crawl summaries and discovery reports
//! - Printing stored progress statistics

pub mod csv;
mod stats;
mod summary;
mod validate;

pub use csv::{dataset_path, write_dataset};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use summary::{print_discovery_report, print_summary, CrawlSummary, DiscoveryReport};
pub use validate::{validate_records, ValidationReport};

use crate::record::AccidentRecord;

/// A year's validated records, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub year: i32,
    pub records: Vec<AccidentRecord>,
}

impl Dataset {
    /// Builds a dataset by running the validation pass over `records`
    pub fn validated(year: i32, records: Vec<AccidentRecord>) -> (Self, ValidationReport) {
        let (records, report) = validate_records(records);
        (Self { year, records }, report)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Output rows, aligned with [`crate::record::COLUMNS`]
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.records.iter().map(AccidentRecord::to_row).collect()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.url.as_str())
    }
}
