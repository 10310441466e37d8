//! Persisted layout constants and SQLite migration setup.
//!
//! Uses `rusqlite_migration` to manage schema migrations via SQLite's
//! `user_version` pragma, which doubles as the store's schema version.
//! Migrations are embedded at compile time via `include_str!`. The
//! record-level equivalent used by the in-memory backend lives in
//! [`crate::upgrade`]; both must describe the same versions.

use std::path::Path;

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;
use crate::types::OpenReport;

/// Well-known name of the durable store.
pub const STORE_NAME: &str = "MermaidDiagramsDB";

/// The single record collection, keyed by `id`.
pub const COLLECTION: &str = "diagrams";

/// Schema version this code reads and writes.
pub const SCHEMA_VERSION: u32 = 2;

/// Migration scripts, index `n` upgrades version `n` to `n + 1`.
static MIGRATION_SQL: [&str; SCHEMA_VERSION as usize] = [
    include_str!("migrations/001_initial_schema.sql"),
    include_str!("migrations/002_view_zoom_percent.sql"),
];

/// File name of the SQLite database inside a data directory.
pub fn sqlite_file_name() -> String {
    format!("{}.sqlite3", STORE_NAME)
}

/// Migrations up to and including `version`, applied in order.
pub(crate) fn migrations_through(version: u32) -> Migrations<'static> {
    Migrations::new(
        MIGRATION_SQL
            .iter()
            .take(version as usize)
            .copied()
            .map(M::up)
            .collect(),
    )
}

/// Opens (or creates) a SQLite database at `path` with WAL mode and all
/// pending migrations applied.
pub fn open_database(path: &Path) -> Result<(Connection, OpenReport), StorageError> {
    let mut conn = Connection::open(path).map_err(|e| {
        StorageError::read(format!("failed to open {}: {}", path.display(), e))
    })?;
    let report = configure_and_migrate(&mut conn)?;
    Ok((conn, report))
}

/// Opens an in-memory SQLite database with all migrations applied.
pub fn open_in_memory() -> Result<(Connection, OpenReport), StorageError> {
    let mut conn = Connection::open_in_memory()
        .map_err(|e| StorageError::read(format!("failed to open in-memory database: {}", e)))?;
    let report = configure_and_migrate(&mut conn)?;
    Ok((conn, report))
}

/// Reads the schema version recorded in the database header.
pub(crate) fn user_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))
        .map_err(|e| StorageError::read(format!("failed to read schema version: {}", e)))
}

/// Configures pragmas and applies pending migrations.
fn configure_and_migrate(conn: &mut Connection) -> Result<OpenReport, StorageError> {
    let pragma_err = |e: rusqlite::Error| StorageError::write(format!("pragma failed: {}", e));
    // WAL gives concurrent readers alongside the single writer.
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(pragma_err)?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(pragma_err)?;

    let previous_version = user_version(conn)?;

    migrations_through(SCHEMA_VERSION)
        .to_latest(conn)
        .map_err(|e| StorageError::Upgrade {
            from: previous_version,
            to: SCHEMA_VERSION,
            reason: e.to_string(),
        })?;

    Ok(OpenReport {
        previous_version,
        current_version: user_version(conn)?,
        created: previous_version == 0,
    })
}
