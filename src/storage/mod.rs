//! Storage module for persisting crawl progress
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Per-record durable commits (the resume point of a crawl)
//! - Skipped-record bookkeeping
//! - Run tracking per year

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteProgressStore;
pub use traits::{ProgressStore, StoreError, StoreResult};

use crate::record::ConfidenceRating;
use crate::state::CrawlPhase;
use std::collections::HashMap;
use std::path::Path;

/// Initializes or opens a progress database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteProgressStore)` - Successfully initialized storage
/// * `Err(StoreError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> StoreResult<SqliteProgressStore> {
    SqliteProgressStore::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub year: i32,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub phase: CrawlPhase,
}

/// Stored progress for one year
#[derive(Debug, Clone, Default)]
pub struct YearStatistics {
    pub year: i32,
    pub completed: u64,
    pub skipped: u64,
    pub by_confidence: HashMap<ConfidenceRating, u64>,
    pub runs: u64,
}
