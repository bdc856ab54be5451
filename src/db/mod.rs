//! Embedded SQLite store behind an r2d2 pool.
//!
//! Callers check out a connection per operation; nothing holds a connection
//! across requests. Multi-statement writes run inside a transaction on that
//! connection.

use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::errors::WikiError;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of connections to the wiki database file
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if needed) the database file and its schema
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, WikiError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        });
        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)?;

        let db = Self { pool };
        db.create_tables()?;
        let pages = count_rows(&*db.conn()?, "pages")?;
        info!("Opened wiki database at {:?} ({} pages)", path, pages);
        Ok(db)
    }

    /// Check a connection out of the pool
    pub fn conn(&self) -> Result<DbConn, WikiError> {
        Ok(self.pool.get()?)
    }

    fn create_tables(&self) -> Result<(), WikiError> {
        let conn = self.conn()?;
        debug!("Ensuring wiki schema");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                content TEXT NOT NULL,
                last_modified_utc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_pages_name ON pages(name COLLATE NOCASE);

            CREATE TABLE IF NOT EXISTS page_attachments (
                file_id TEXT PRIMARY KEY COLLATE NOCASE,
                page_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                last_modified_utc TEXT NOT NULL,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_page_attachments_page ON page_attachments(page_id, position);

            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY COLLATE NOCASE,
                file_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                length INTEGER NOT NULL,
                uploaded_utc TEXT NOT NULL,
                data BLOB NOT NULL
            );",
        )?;
        Ok(())
    }
}

/// Timestamps are stored as RFC 3339 text
pub fn timestamp_to_sql(ts: OffsetDateTime) -> SqliteResult<String> {
    ts.format(&Rfc3339)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub fn timestamp_from_row(row: &Row, idx: usize) -> SqliteResult<OffsetDateTime> {
    let raw: String = row.get(idx)?;
    OffsetDateTime::parse(&raw, &Rfc3339)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Count rows in a table, used by tests and start-up logging
pub fn count_rows(conn: &Connection, table: &str) -> SqliteResult<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_schema_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("wiki.db");

        let db = Database::open(&path, 2).unwrap();
        assert!(path.exists());

        let conn = db.conn().unwrap();
        assert_eq!(count_rows(&conn, "pages").unwrap(), 0);
        assert_eq!(count_rows(&conn, "page_attachments").unwrap(), 0);
        assert_eq!(count_rows(&conn, "files").unwrap(), 0);
    }

    #[test]
    fn reopening_keeps_existing_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wiki.db");
        {
            let db = Database::open(&path, 1).unwrap();
            db.conn()
                .unwrap()
                .execute(
                    "INSERT INTO pages (name, content, last_modified_utc) VALUES ('a', 'b', '2024-01-01T00:00:00Z')",
                    [],
                )
                .unwrap();
        }
        let db = Database::open(&path, 1).unwrap();
        assert_eq!(count_rows(&db.conn().unwrap(), "pages").unwrap(), 1);
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        let conn = db.conn().unwrap();

        let now = OffsetDateTime::now_utc();
        let stored = timestamp_to_sql(now).unwrap();
        let back = conn
            .query_row("SELECT ?1", [&stored], |row| timestamp_from_row(row, 0))
            .unwrap();
        assert_eq!(back, now);
    }
}
