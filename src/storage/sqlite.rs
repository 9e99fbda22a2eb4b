//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ProgressStore trait.

use crate::record::{AccidentRecord, ConfidenceRating, CONFIDENCE_TABLE_VERSION};
use crate::state::{CrawlPhase, SkippedRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProgressStore, StoreError, StoreResult};
use crate::storage::{RunRecord, YearStatistics};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const RECORD_COLUMNS: &str = "url, date, time, aircraft_type, operator, registration, msn,
     year_of_manufacture, engine_model, fatalities, other_fatalities, aircraft_damage,
     category, location, phase, nature, departure_airport, destination_airport,
     investigating_agency, confidence";

/// SQLite progress store backend
pub struct SqliteProgressStore {
    conn: Connection,
}

impl SqliteProgressStore {
    /// Creates a new SqliteProgressStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteProgressStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn new(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Every commit must be on disk before the next record is fetched
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Closes the underlying connection, surfacing any final I/O error
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AccidentRecord> {
    Ok(AccidentRecord {
        url: row.get(0)?,
        date: row.get(1)?,
        time: row.get(2)?,
        aircraft_type: row.get(3)?,
        operator: row.get(4)?,
        registration: row.get(5)?,
        msn: row.get(6)?,
        year_of_manufacture: row.get(7)?,
        engine_model: row.get(8)?,
        fatalities: row.get(9)?,
        other_fatalities: row.get(10)?,
        aircraft_damage: row.get(11)?,
        category: row.get(12)?,
        location: row.get(13)?,
        phase: row.get(14)?,
        nature: row.get(15)?,
        departure_airport: row.get(16)?,
        destination_airport: row.get(17)?,
        investigating_agency: row.get(18)?,
        confidence: confidence_column(row, 19)?,
    })
}

/// Reads a stored confidence label, rejecting values no version ever wrote
fn confidence_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ConfidenceRating> {
    let label: String = row.get(idx)?;
    label.parse().map_err(|message: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        year: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        phase: phase_column(row, 5)?,
    })
}

fn phase_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<CrawlPhase> {
    let label: String = row.get(idx)?;
    CrawlPhase::from_db_string(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown crawl phase '{}'", label).into(),
        )
    })
}

impl ProgressStore for SqliteProgressStore {
    // ===== Completion Tracking =====

    fn load_completed(&self, year: i32) -> StoreResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM completed_records WHERE year = ?1")?;

        let urls = stmt
            .query_map(params![year], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;

        Ok(urls)
    }

    fn mark_completed(
        &mut self,
        year: i32,
        url: &str,
        record: &AccidentRecord,
        run_id: Option<i64>,
    ) -> StoreResult<bool> {
        let write_failure = |source: rusqlite::Error| StoreError::WriteFailure {
            url: url.to_string(),
            source,
        };

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().map_err(write_failure)?;
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO completed_records (
                    year, url, date, time, aircraft_type, operator, registration, msn,
                    year_of_manufacture, engine_model, fatalities, other_fatalities,
                    aircraft_damage, category, location, phase, nature, departure_airport,
                    destination_airport, investigating_agency, confidence, confidence_version,
                    run_id, committed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                           ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                params![
                    year,
                    url,
                    record.date,
                    record.time,
                    record.aircraft_type,
                    record.operator,
                    record.registration,
                    record.msn,
                    record.year_of_manufacture,
                    record.engine_model,
                    record.fatalities,
                    record.other_fatalities,
                    record.aircraft_damage,
                    record.category,
                    record.location,
                    record.phase,
                    record.nature,
                    record.departure_airport,
                    record.destination_airport,
                    record.investigating_agency,
                    record.confidence.as_str(),
                    CONFIDENCE_TABLE_VERSION,
                    run_id,
                    now,
                ],
            )
            .map_err(write_failure)?;
        tx.commit().map_err(write_failure)?;

        Ok(inserted == 1)
    }

    fn snapshot(&mut self, year: i32) -> StoreResult<()> {
        // (busy, wal frames, frames checkpointed); busy is 1 when a reader held it back
        let busy: i64 = self
            .conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
        if busy != 0 {
            return Err(StoreError::CheckpointBlocked(year));
        }
        tracing::debug!("Checkpointed progress store for year {}", year);
        Ok(())
    }

    fn load_records(&self, year: i32) -> StoreResult<Vec<AccidentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM completed_records WHERE year = ?1 ORDER BY id",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![year], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn clear_year(&mut self, year: i32) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM completed_records WHERE year = ?1",
            params![year],
        )?;
        tx.execute("DELETE FROM skipped_records WHERE year = ?1", params![year])?;
        tx.commit()?;
        Ok(())
    }

    // ===== Skipped Records =====

    fn record_skipped(
        &mut self,
        year: i32,
        url: &str,
        reason: &str,
        run_id: Option<i64>,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO skipped_records (year, url, reason, run_id, skipped_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![year, url, reason, run_id, now],
        )?;
        Ok(())
    }

    fn load_skipped(&self, year: i32) -> StoreResult<Vec<SkippedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.url, s.reason FROM skipped_records s
             WHERE s.year = ?1
               AND s.id = (SELECT MAX(id) FROM skipped_records WHERE year = ?1 AND url = s.url)
               AND s.url NOT IN (SELECT url FROM completed_records WHERE year = ?1)
             ORDER BY s.id",
        )?;

        let skipped = stmt
            .query_map(params![year], |row| {
                Ok(SkippedRecord {
                    url: row.get(0)?,
                    reason: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(skipped)
    }

    // ===== Run Management =====

    fn begin_run(&mut self, year: i32, config_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (year, started_at, config_hash, phase) VALUES (?1, ?2, ?3, ?4)",
            params![
                year,
                now,
                config_hash,
                CrawlPhase::Discovering.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_run_phase(&mut self, run_id: i64, phase: CrawlPhase) -> StoreResult<()> {
        let finished_at = phase.is_terminal().then(|| Utc::now().to_rfc3339());
        let updated = self.conn.execute(
            "UPDATE runs SET phase = ?1, finished_at = COALESCE(?2, finished_at) WHERE id = ?3",
            params![phase.to_db_string(), finished_at, run_id],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, year, started_at, finished_at, config_hash, phase FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StoreError::RunNotFound(run_id))
    }

    fn latest_run(&self, year: i32) -> StoreResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, year, started_at, finished_at, config_hash, phase FROM runs
                 WHERE year = ?1 ORDER BY id DESC LIMIT 1",
                params![year],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    // ===== Statistics =====

    fn year_statistics(&self, year: i32) -> StoreResult<YearStatistics> {
        let completed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM completed_records WHERE year = ?1",
            params![year],
            |row| row.get(0),
        )?;

        let skipped = self.load_skipped(year)?.len() as u64;

        let runs: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM runs WHERE year = ?1",
            params![year],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT confidence, COUNT(*) FROM completed_records WHERE year = ?1 GROUP BY confidence",
        )?;
        let rows = stmt.query_map(params![year], |row| {
            let rating = confidence_column(row, 0)?;
            let count: i64 = row.get(1)?;
            Ok((rating, count))
        })?;

        let mut by_confidence = HashMap::new();
        for row in rows {
            let (rating, count) = row?;
            by_confidence.insert(rating, count as u64);
        }

        Ok(YearStatistics {
            year,
            completed: completed as u64,
            skipped,
            by_confidence,
            runs: runs as u64,
        })
    }
}
