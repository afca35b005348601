//! SQLite schema for the liveness store.
//!
//! This module defines the database schema and imports the legacy `orders`
//! bookkeeping table when one is found.

use rusqlite::{Connection, OptionalExtension, Result};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Creates all tables if they don't exist. A fresh database that still
/// carries the legacy `orders` table is seeded from it so listings published
/// by the old bookkeeping are not re-announced.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_tables(conn)?;
        import_legacy_orders(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get the current schema version (0 if not initialized).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Create all tables for a fresh database.
fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per listing currently mirrored, per origin
        CREATE TABLE IF NOT EXISTS liveness (
            identifier TEXT NOT NULL,
            origin TEXT NOT NULL,
            first_seen INTEGER NOT NULL,
            generation INTEGER NOT NULL,
            record TEXT,
            PRIMARY KEY (identifier, origin)
        );

        -- Sweep scans by (generation, origin)
        CREATE INDEX IF NOT EXISTS idx_liveness_generation_origin
            ON liveness(generation, origin);
        "#,
    )?;

    Ok(())
}

/// Seed `liveness` from the legacy `orders` table if one exists.
///
/// The legacy table allowed several rows per listing; the newest publish and
/// the highest iteration win.
fn import_legacy_orders(conn: &Connection) -> Result<()> {
    let has_legacy: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'orders')",
        [],
        |row| row.get(0),
    )?;

    if !has_legacy {
        return Ok(());
    }

    let imported = conn.execute(
        "INSERT OR IGNORE INTO liveness (identifier, origin, first_seen, generation)
         SELECT identifier, origin, MAX(CAST(first_seen AS INTEGER)), MAX(iteration)
         FROM orders
         GROUP BY identifier, origin",
        [],
    )?;

    tracing::info!("Imported {} listings from legacy orders table", imported);
    Ok(())
}
