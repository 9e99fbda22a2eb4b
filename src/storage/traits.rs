//! Storage traits and error types
//!
//! This module defines the trait interface for progress store backends and
//! associated error types.

use crate::record::AccidentRecord;
use crate::state::{CrawlPhase, SkippedRecord};
use crate::storage::{RunRecord, YearStatistics};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A commit did not reach the database; the record is not completed
    #[error("Failed to commit {url}: {source}")]
    WriteFailure {
        url: String,
        source: rusqlite::Error,
    },

    /// Another connection kept the write-ahead log from being checkpointed
    #[error("Checkpoint for year {0} was blocked by another reader")]
    CheckpointBlocked(i32),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable per-year crawl progress
///
/// Implementations must make `mark_completed` atomic: after a crash,
/// `load_completed` returns exactly the URLs whose commit returned `Ok`.
/// The store is single-writer; callers serialize commits.
pub trait ProgressStore {
    // ===== Completion Tracking =====

    /// Loads the set of URLs already committed for a year
    fn load_completed(&self, year: i32) -> StoreResult<HashSet<String>>;

    /// Durably commits a parsed record
    ///
    /// Idempotent: committing a URL that is already completed for the year is
    /// a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record was newly committed
    /// * `Ok(false)` - The URL was already completed
    /// * `Err(StoreError::WriteFailure)` - Nothing was committed
    fn mark_completed(
        &mut self,
        year: i32,
        url: &str,
        record: &AccidentRecord,
        run_id: Option<i64>,
    ) -> StoreResult<bool>;

    /// Forces committed data for a year out of the write-ahead log
    ///
    /// Fails with `StoreError::CheckpointBlocked` while another connection
    /// still reads an older state. Committed data stays durable either way.
    fn snapshot(&mut self, year: i32) -> StoreResult<()>;

    /// Loads committed records for a year, in commit order
    fn load_records(&self, year: i32) -> StoreResult<Vec<AccidentRecord>>;

    /// Forgets all progress for a year (used for fresh crawls)
    fn clear_year(&mut self, year: i32) -> StoreResult<()>;

    // ===== Skipped Records =====

    /// Records a permanent per-record failure
    fn record_skipped(
        &mut self,
        year: i32,
        url: &str,
        reason: &str,
        run_id: Option<i64>,
    ) -> StoreResult<()>;

    /// Loads skipped records for a year, most recent reason per URL
    fn load_skipped(&self, year: i32) -> StoreResult<Vec<SkippedRecord>>;

    // ===== Run Management =====

    /// Creates a new run row for a year
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn begin_run(&mut self, year: i32, config_hash: &str) -> StoreResult<i64>;

    /// Updates the phase of a run, stamping the finish time for terminal phases
    fn update_run_phase(&mut self, run_id: i64, phase: CrawlPhase) -> StoreResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord>;

    /// Gets the most recent run for a year
    fn latest_run(&self, year: i32) -> StoreResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Summarizes stored progress for a year
    fn year_statistics(&self, year: i32) -> StoreResult<YearStatistics>;
}
