//! Durable liveness tracking for mirrored listings.
//!
//! The `LivenessStore` records, per `(identifier, origin)`, when a listing
//! was first published and the last generation in which it was seen
//! upstream. The reconciliation engine is its only writer.
//!
//! All writes of a cycle go through [`LivenessStore::commit_cycle`], which
//! applies keep-alive bumps, new inserts and the sweep in one SQLite
//! transaction: either the whole cycle is persisted or none of it is.

use std::path::Path;
use std::time::Duration;

use bazaar_core::ListingRecord;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::schema;
use crate::{Error, Result};

/// One tracked listing.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessRow {
    pub identifier: String,
    pub origin: String,
    /// Unix timestamp of the publish that created this row.
    pub first_seen: u64,
    /// Last generation in which the listing was observed upstream.
    pub generation: u64,
    /// Last-known upstream record, kept for cancellation announcements.
    pub record: Option<ListingRecord>,
}

/// Store mutations staged by one cycle of one origin.
#[derive(Debug, Clone)]
pub struct CycleWrites {
    origin: String,
    generation: u64,
    keep_alive: Vec<String>,
    inserts: Vec<LivenessRow>,
}

impl CycleWrites {
    /// Start staging writes for `origin` at generation `generation`.
    pub fn new(origin: impl Into<String>, generation: u64) -> Self {
        Self {
            origin: origin.into(),
            generation,
            keep_alive: Vec::new(),
            inserts: Vec::new(),
        }
    }

    /// Stage a generation bump for a listing still present upstream.
    pub fn keep_alive(&mut self, identifier: impl Into<String>) {
        self.keep_alive.push(identifier.into());
    }

    /// Stage a new row for a listing that was just published.
    pub fn insert(
        &mut self,
        identifier: impl Into<String>,
        first_seen: u64,
        record: Option<ListingRecord>,
    ) {
        self.inserts.push(LivenessRow {
            identifier: identifier.into(),
            origin: self.origin.clone(),
            first_seen,
            generation: self.generation,
            record,
        });
    }

    /// Generation at or below which rows are swept by this cycle.
    pub fn sweep_threshold(&self) -> u64 {
        self.generation.saturating_sub(1)
    }

    pub fn kept_alive(&self) -> usize {
        self.keep_alive.len()
    }
}

/// SQLite-backed liveness store.
pub struct LivenessStore {
    /// SQLite connection (protected by mutex for thread safety).
    conn: Mutex<Connection>,
}

impl LivenessStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        tracing::info!("Opening liveness store at {}", path.display());

        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Database(format!("Failed to set PRAGMA: {}", e)))?;

        schema::init_schema(&conn)
            .map_err(|e| Error::Database(format!("Failed to init schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        schema::init_schema(&conn)
            .map_err(|e| Error::Database(format!("Failed to init schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Highest generation recorded for `origin`, 0 if none.
    pub fn max_generation(&self, origin: &str) -> Result<u64> {
        let conn = self.conn.lock();
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(generation), 0) FROM liveness WHERE origin = ?",
            [origin],
            |row| row.get(0),
        )?;
        Ok(max as u64)
    }

    /// Whether a row exists whose first publish is within `freshness` of `now`.
    ///
    /// Rows older than the window are treated as not live so the listing is
    /// re-announced before its network-side expiration lapses.
    pub fn is_live(
        &self,
        identifier: &str,
        origin: &str,
        freshness: Duration,
        now: u64,
    ) -> Result<bool> {
        let cutoff = now.saturating_sub(freshness.as_secs());
        let conn = self.conn.lock();
        let live: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM liveness
                WHERE identifier = ? AND origin = ? AND first_seen >= ?
            )",
            params![identifier, origin, cutoff as i64],
            |row| row.get(0),
        )?;
        Ok(live)
    }

    /// Fetch one row.
    pub fn get(&self, identifier: &str, origin: &str) -> Result<Option<LivenessRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT identifier, origin, first_seen, generation, record
                 FROM liveness WHERE identifier = ? AND origin = ?",
                params![identifier, origin],
                read_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All rows of an origin, ordered by identifier.
    pub fn rows(&self, origin: &str) -> Result<Vec<LivenessRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT identifier, origin, first_seen, generation, record
             FROM liveness WHERE origin = ? ORDER BY identifier",
        )?;
        let rows = stmt
            .query_map([origin], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Number of rows tracked for an origin.
    pub fn count(&self, origin: &str) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM liveness WHERE origin = ?",
            [origin],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Insert (or replace) a single row in its own transaction.
    pub fn insert(&self, row: &LivenessRow) -> Result<()> {
        self.with_transaction(|tx| insert(tx, row))
    }

    /// Bump a single row's generation in its own transaction.
    pub fn bump_generation(&self, identifier: &str, origin: &str, generation: u64) -> Result<()> {
        self.with_transaction(|tx| bump_generation(tx, identifier, origin, generation))
    }

    /// Delete and return every row of `origin` with `generation <= threshold`.
    pub fn sweep(&self, origin: &str, threshold: u64) -> Result<Vec<LivenessRow>> {
        self.with_transaction(|tx| sweep(tx, origin, threshold))
    }

    /// Persist one cycle atomically: bumps, then inserts, then the sweep.
    ///
    /// Returns the swept rows. On error nothing from the cycle is kept.
    pub fn commit_cycle(&self, writes: &CycleWrites) -> Result<Vec<LivenessRow>> {
        self.with_transaction(|tx| {
            for identifier in &writes.keep_alive {
                bump_generation(tx, identifier, &writes.origin, writes.generation)?;
            }
            for row in &writes.inserts {
                insert(tx, row)?;
            }
            sweep(tx, &writes.origin, writes.sweep_threshold())
        })
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        // Dropping an uncommitted transaction rolls it back
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn insert(tx: &Transaction<'_>, row: &LivenessRow) -> Result<()> {
    let record = row.record.as_ref().map(serde_json::to_string).transpose()?;

    tx.execute(
        "INSERT INTO liveness (identifier, origin, first_seen, generation, record)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(identifier, origin) DO UPDATE SET
            first_seen = excluded.first_seen,
            generation = excluded.generation,
            record = excluded.record",
        params![
            row.identifier,
            row.origin,
            row.first_seen as i64,
            row.generation as i64,
            record,
        ],
    )?;
    Ok(())
}

fn bump_generation(
    tx: &Transaction<'_>,
    identifier: &str,
    origin: &str,
    generation: u64,
) -> Result<()> {
    tx.execute(
        "UPDATE liveness SET generation = ? WHERE identifier = ? AND origin = ?",
        params![generation as i64, identifier, origin],
    )?;
    Ok(())
}

fn sweep(tx: &Transaction<'_>, origin: &str, threshold: u64) -> Result<Vec<LivenessRow>> {
    let swept = {
        let mut stmt = tx.prepare(
            "SELECT identifier, origin, first_seen, generation, record
             FROM liveness WHERE generation <= ? AND origin = ?
             ORDER BY identifier",
        )?;
        stmt.query_map(params![threshold as i64, origin], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
    };

    tx.execute(
        "DELETE FROM liveness WHERE generation <= ? AND origin = ?",
        params![threshold as i64, origin],
    )?;

    Ok(swept)
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LivenessRow> {
    let identifier: String = row.get(0)?;
    let record: Option<String> = row.get(4)?;

    let record = record.and_then(|json| match serde_json::from_str(&json) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!("Unreadable stored record for {}: {}", identifier, e);
            None
        }
    });

    Ok(LivenessRow {
        origin: row.get(1)?,
        first_seen: row.get::<_, i64>(2)? as u64,
        generation: row.get::<_, i64>(3)? as u64,
        identifier,
        record,
    })
}
