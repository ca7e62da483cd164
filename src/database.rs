//! SQLite store for activity samples.
//!
//! A single append-only table, `usage_stats(timestamp, device, used)`. The
//! connection is owned by the persistence writer thread and never shared.

use crate::types::Sample;
use crate::writer::SampleSink;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::Path;

const INSERT_SAMPLE: &str = "INSERT INTO usage_stats (timestamp, device, used) VALUES (?1, ?2, ?3)";

/// Database wrapper around an exclusively owned connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens or creates the database at `path` and ensures the schema.
    pub fn open(path: &Path) -> SqlResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(?e, dir = ?parent, "Could not create database directory");
            }
        }

        tracing::info!(path = ?path, "Opening database");

        let conn = Connection::open(path)?;

        // WAL mode; rows must survive the process being killed
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let db = Self { conn };
        db.init_schema()?;

        Ok(db)
    }

    /// Opens an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> SqlResult<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Creates the samples table if it does not exist. Safe to call repeatedly.
    pub fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS usage_stats (
                timestamp DATETIME,
                device TEXT,
                used INTEGER
            );
            "#,
        )?;

        tracing::debug!("Database schema initialized");
        Ok(())
    }

    /// Appends one sample row stamped with the commit time `at`.
    pub fn insert_sample(&self, sample: &Sample, at: DateTime<Utc>) -> SqlResult<()> {
        let mut stmt = self.conn.prepare_cached(INSERT_SAMPLE)?;
        stmt.execute(params![
            at.to_rfc3339(),
            sample.device.as_str(),
            sample.used_flag(),
        ])?;
        Ok(())
    }
}

impl SampleSink for Database {
    type Error = rusqlite::Error;

    fn append(&mut self, sample: &Sample, at: DateTime<Utc>) -> Result<(), Self::Error> {
        self.insert_sample(sample, at)
    }
}
