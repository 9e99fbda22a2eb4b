use crate::crawler::{ListingAnomaly, RecordLink};
use crate::record::AccidentRecord;
use crate::state::CrawlPhase;
use crate::HarvestError;
use std::collections::HashSet;

/// A record that was attempted and given up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub url: String,
    pub reason: String,
}

/// In-memory progress of one year's crawl
///
/// Owned exclusively by the coordinator for the duration of the crawl. The
/// progress store only ever sees snapshots (a URL plus its record) handed to it
/// at commit time.
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// Year being crawled
    year: i32,

    /// Current phase of the state machine
    phase: CrawlPhase,

    /// Discovered record links in first-seen order
    discovered: Vec<RecordLink>,

    /// URLs in `discovered`, for O(1) duplicate checks
    discovered_urls: HashSet<String>,

    /// URLs durably committed, including those from earlier runs
    completed: HashSet<String>,

    /// Records committed during this run
    buffer: Vec<AccidentRecord>,

    /// Records given up on during this run
    skipped: Vec<SkippedRecord>,

    /// URLs that appeared on more than one listing page
    duplicate_links: usize,

    /// Listing pages fetched so far
    pages_visited: u32,

    /// Occurrence count advertised by the first listing caption that had one
    reported_total: Option<u32>,

    /// Listing captions that disagreed with their page or an earlier page
    anomalies: Vec<ListingAnomaly>,
}

impl CrawlState {
    /// Creates a fresh state with nothing completed
    pub fn new(year: i32) -> Self {
        Self::with_completed(year, HashSet::new())
    }

    /// Rehydrates a state from the completed set of an earlier run
    pub fn with_completed(year: i32, completed: HashSet<String>) -> Self {
        Self {
            year,
            phase: CrawlPhase::Discovering,
            discovered: Vec::new(),
            discovered_urls: HashSet::new(),
            completed,
            buffer: Vec::new(),
            skipped: Vec::new(),
            duplicate_links: 0,
            pages_visited: 0,
            reported_total: None,
            anomalies: Vec::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves the state machine forward
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition is allowed and was applied
    /// * `Err(HarvestError::InvalidTransition)` - The transition is not allowed,
    ///   or `Completed` was requested while discovered links are still pending
    pub fn transition(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        let unfinished = next == CrawlPhase::Completed && !self.all_attempted();
        if !self.phase.can_transition_to(next) || unfinished {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Year {}: {} -> {}", self.year, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Records one fetched listing page and its advertised total
    ///
    /// The first advertised total is kept. A later page advertising a
    /// different one is reported as [`ListingAnomaly::TotalChanged`].
    pub fn record_page(
        &mut self,
        page: u32,
        reported_total: Option<u32>,
    ) -> Result<(), ListingAnomaly> {
        self.pages_visited += 1;
        match (self.reported_total, reported_total) {
            (Some(expected), Some(found)) if expected != found => {
                Err(ListingAnomaly::TotalChanged {
                    page,
                    expected,
                    found,
                })
            }
            (None, Some(_)) => {
                self.reported_total = reported_total;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn record_anomaly(&mut self, anomaly: ListingAnomaly) {
        self.anomalies.push(anomaly);
    }

    pub fn anomalies(&self) -> &[ListingAnomaly] {
        &self.anomalies
    }

    /// Appends newly discovered links, keeping the first occurrence of each URL
    ///
    /// Returns the number of links that were new.
    pub fn add_links(&mut self, links: impl IntoIterator<Item = RecordLink>) -> usize {
        let mut added = 0;
        for link in links {
            if self.discovered_urls.insert(link.url.clone()) {
                self.discovered.push(link);
                added += 1;
            } else {
                self.duplicate_links += 1;
            }
        }
        added
    }

    /// Discovered links that still need fetching, in discovery order
    pub fn pending(&self) -> Vec<RecordLink> {
        let skipped: HashSet<&str> = self.skipped.iter().map(|s| s.url.as_str()).collect();
        self.discovered
            .iter()
            .filter(|link| !self.completed.contains(&link.url) && !skipped.contains(link.url.as_str()))
            .cloned()
            .collect()
    }

    /// Records a durable commit; returns false if the URL was already completed
    pub fn mark_completed(&mut self, record: AccidentRecord) -> bool {
        if !self.completed.insert(record.url.clone()) {
            return false;
        }
        self.buffer.push(record);
        true
    }

    /// Records a permanent per-record failure
    pub fn mark_skipped(&mut self, url: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedRecord {
            url: url.into(),
            reason: reason.into(),
        });
    }

    /// True once every discovered link was either completed or skipped
    pub fn all_attempted(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn discovered(&self) -> &[RecordLink] {
        &self.discovered
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    /// Completions that belong to this year's discovered set
    pub fn completed_count(&self) -> usize {
        self.discovered
            .iter()
            .filter(|link| self.completed.contains(&link.url))
            .count()
    }

    pub fn buffer(&self) -> &[AccidentRecord] {
        &self.buffer
    }

    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    pub fn duplicate_links(&self) -> usize {
        self.duplicate_links
    }

    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    pub fn reported_total(&self) -> Option<u32> {
        self.reported_total
    }
}
