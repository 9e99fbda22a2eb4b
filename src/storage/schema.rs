//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the progress database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs, one row per invocation per year
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    phase TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_year ON runs(year);

-- Committed records; a row exists only if its transaction committed
CREATE TABLE IF NOT EXISTS completed_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    url TEXT NOT NULL,
    date TEXT,
    time TEXT,
    aircraft_type TEXT,
    operator TEXT,
    registration TEXT,
    msn TEXT,
    year_of_manufacture TEXT,
    engine_model TEXT,
    fatalities INTEGER,
    other_fatalities INTEGER,
    aircraft_damage TEXT,
    category TEXT,
    location TEXT,
    phase TEXT,
    nature TEXT,
    departure_airport TEXT,
    destination_airport TEXT,
    investigating_agency TEXT,
    confidence TEXT NOT NULL,
    confidence_version INTEGER NOT NULL,
    run_id INTEGER REFERENCES runs(id),
    committed_at TEXT NOT NULL,
    UNIQUE(year, url)
);

CREATE INDEX IF NOT EXISTS idx_completed_year ON completed_records(year);

-- Records given up on, kept for post-hoc review
CREATE TABLE IF NOT EXISTS skipped_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    url TEXT NOT NULL,
    reason TEXT NOT NULL,
    run_id INTEGER REFERENCES runs(id),
    skipped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_skipped_year ON skipped_records(year);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", get_schema_version())?;
    Ok(())
}

/// Gets the current schema version
///
/// Stored in `PRAGMA user_version` for future migrations.
pub fn get_schema_version() -> u32 {
    1
}
