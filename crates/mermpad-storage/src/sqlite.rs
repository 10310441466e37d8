//! SQLite implementation of [`RecordBackend`].
//!
//! [`SqliteBackend`] persists diagrams in a single `diagrams` table with
//! WAL mode and schema upgrades driven by `rusqlite_migration`. The
//! connection is opened lazily by `open()`, so constructing a backend never
//! touches the filesystem.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use mermpad_core::{DiagramId, DiagramRecord, Timestamp};

use crate::error::StorageError;
use crate::schema::{self, SCHEMA_VERSION, STORE_NAME};
use crate::traits::RecordBackend;
use crate::types::{Direction, OpenReport, RecordIndex};

const SELECT_COLUMNS: &str =
    "SELECT id, name, source_text, view_zoom_percent, created_at, updated_at FROM diagrams";

/// SQLite-backed implementation of [`RecordBackend`].
pub struct SqliteBackend {
    /// `None` for a private in-memory database.
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

impl SqliteBackend {
    /// A backend over the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        SqliteBackend {
            path: Some(path.as_ref().to_path_buf()),
            conn: None,
        }
    }

    /// A backend over `MermaidDiagramsDB.sqlite3` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(schema::sqlite_file_name()))
    }

    /// A backend over a private in-memory database (for testing).
    pub fn in_memory() -> Self {
        SqliteBackend {
            path: None,
            conn: None,
        }
    }

    /// Path of the database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<&Connection, StorageError> {
        self.conn.as_ref().ok_or(StorageError::NotInitialized)
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<DiagramRecord>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql).map_err(read_err)?;
        let rows = stmt.query_map(params, raw_row).map_err(read_err)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(decode_row(row.map_err(read_err)?)?);
        }
        Ok(records)
    }
}

/// Columns of one `diagrams` row before validation.
type RawRow = (String, String, String, Option<u32>, i64, i64);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_row(raw: RawRow) -> Result<DiagramRecord, StorageError> {
    let (id, name, source_text, view_zoom_percent, created_at, updated_at) = raw;
    let id = DiagramId::parse(&id)
        .map_err(|e| StorageError::read(format!("corrupt record: {}", e)))?;
    Ok(DiagramRecord {
        id,
        name,
        source_text,
        view_zoom_percent,
        created_at: Timestamp(created_at),
        updated_at: Timestamp(updated_at),
    })
}

fn read_err(err: rusqlite::Error) -> StorageError {
    StorageError::read(format!("{} query failed: {}", STORE_NAME, err))
}

fn write_err(err: rusqlite::Error) -> StorageError {
    StorageError::write(format!("{} write failed: {}", STORE_NAME, err))
}

impl RecordBackend for SqliteBackend {
    fn open(&mut self) -> Result<OpenReport, StorageError> {
        if let Some(conn) = &self.conn {
            let version = schema::user_version(conn)?;
            return Ok(OpenReport {
                previous_version: version,
                current_version: version,
                created: false,
            });
        }

        let (conn, report) = match &self.path {
            Some(path) => schema::open_database(path)?,
            None => schema::open_in_memory()?,
        };
        if report.created {
            tracing::info!("created {} at schema v{}", STORE_NAME, SCHEMA_VERSION);
        } else if report.upgraded() {
            tracing::info!(
                "upgraded {} from schema v{} to v{}",
                STORE_NAME,
                report.previous_version,
                report.current_version
            );
        }
        self.conn = Some(conn);
        Ok(report)
    }

    fn schema_version(&self) -> Result<u32, StorageError> {
        schema::user_version(self.conn()?)
    }

    fn insert(&mut self, record: &DiagramRecord) -> Result<(), StorageError> {
        self.conn()?
            .execute(
                "INSERT INTO diagrams (id, name, source_text, view_zoom_percent, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id.to_string(),
                    record.name,
                    record.source_text,
                    record.view_zoom_percent,
                    record.created_at.0,
                    record.updated_at.0,
                ],
            )
            .map_err(write_err)?;
        Ok(())
    }

    fn put(&mut self, record: &DiagramRecord) -> Result<(), StorageError> {
        self.conn()?
            .execute(
                "INSERT INTO diagrams (id, name, source_text, view_zoom_percent, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     source_text = excluded.source_text,
                     view_zoom_percent = excluded.view_zoom_percent,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at",
                params![
                    record.id.to_string(),
                    record.name,
                    record.source_text,
                    record.view_zoom_percent,
                    record.created_at.0,
                    record.updated_at.0,
                ],
            )
            .map_err(write_err)?;
        Ok(())
    }

    fn get(&self, id: DiagramId) -> Result<Option<DiagramRecord>, StorageError> {
        let raw = self
            .conn()?
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id.to_string()],
                raw_row,
            )
            .optional()
            .map_err(read_err)?;
        raw.map(decode_row).transpose()
    }

    fn get_all(&self) -> Result<Vec<DiagramRecord>, StorageError> {
        self.query_records(SELECT_COLUMNS, [])
    }

    fn delete(&mut self, id: DiagramId) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM diagrams WHERE id = ?1", params![id.to_string()])
            .map_err(write_err)?;
        Ok(())
    }

    fn list_by(
        &self,
        index: RecordIndex,
        direction: Direction,
    ) -> Result<Vec<DiagramRecord>, StorageError> {
        let order = match direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        let sql = format!(
            "{} ORDER BY {} {}, id ASC",
            SELECT_COLUMNS,
            index.column(),
            order
        );
        self.query_records(&sql, [])
    }

    fn find_by_name(&self, name: &str) -> Result<Vec<DiagramRecord>, StorageError> {
        self.query_records(
            &format!("{} WHERE name = ?1 ORDER BY id ASC", SELECT_COLUMNS),
            params![name],
        )
    }
}
