//! Validation pass run before a dataset is written

use crate::record::AccidentRecord;
use std::collections::HashSet;

/// What the validation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Records dropped because an earlier record had the same URL
    pub duplicates_removed: usize,
    /// Records dropped because their URL was empty
    pub missing_urls: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates_removed == 0 && self.missing_urls == 0
    }
}

/// Enforces URL uniqueness, keeping the first occurrence and its position
///
/// Column completeness is guaranteed by [`AccidentRecord::to_row`]; this pass
/// only needs to deal with keys.
pub fn validate_records(records: Vec<AccidentRecord>) -> (Vec<AccidentRecord>, ValidationReport) {
    let mut seen = HashSet::with_capacity(records.len());
    let mut report = ValidationReport::default();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if record.url.trim().is_empty() {
            report.missing_urls += 1;
            continue;
        }
        if !seen.insert(record.url.clone()) {
            report.duplicates_removed += 1;
            continue;
        }
        kept.push(record);
    }

    if !report.is_clean() {
        tracing::warn!(
            "Validation dropped {} duplicate and {} keyless record(s)",
            report.duplicates_removed,
            report.missing_urls
        );
    }

    (kept, report)
}
