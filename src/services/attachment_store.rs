use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use time::OffsetDateTime;

use crate::db::{timestamp_from_row, timestamp_to_sql};
use crate::types::StoredFile;

/// Blob storage for page attachments, keyed by the id generated at upload.
///
/// Works on a borrowed connection so uploads and deletes can share a
/// transaction with the page row they belong to. File name and MIME type are
/// stored exactly as the client supplied them.
pub struct AttachmentStore<'c> {
    conn: &'c Connection,
}

impl<'c> AttachmentStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Store a new blob. Ids are never reused, so an existing id is an error.
    pub fn upload(
        &self,
        id: &str,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> SqliteResult<()> {
        debug!("Uploading attachment {} ({}, {} bytes)", id, file_name, bytes.len());
        let uploaded = timestamp_to_sql(OffsetDateTime::now_utc())?;
        self.conn.execute(
            "INSERT INTO files (id, file_name, mime_type, length, uploaded_utc, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, file_name, mime_type, bytes.len() as i64, uploaded, bytes],
        )?;
        Ok(())
    }

    /// Read a blob and its metadata
    pub fn download(&self, id: &str) -> SqliteResult<Option<StoredFile>> {
        self.conn
            .query_row(
                "SELECT id, file_name, mime_type, length, uploaded_utc, data FROM files WHERE id = ?1",
                [id],
                |row| {
                    Ok(StoredFile {
                        file_id: row.get(0)?,
                        file_name: row.get(1)?,
                        mime_type: row.get(2)?,
                        length: row.get(3)?,
                        uploaded_utc: timestamp_from_row(row, 4)?,
                        bytes: row.get(5)?,
                    })
                },
            )
            .optional()
    }

    /// Remove a blob. Returns false when the id is absent or the store refuses the delete.
    pub fn delete(&self, id: &str) -> bool {
        match self.conn.execute("DELETE FROM files WHERE id = ?1", [id]) {
            Ok(0) => {
                debug!("No stored file with id {}", id);
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to delete stored file {}: {}", id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::tempdir;

    #[test]
    fn upload_then_download_returns_client_metadata() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        let conn = db.conn().unwrap();
        let store = AttachmentStore::new(&conn);

        store.upload("f-1", "notes.txt", "text/plain", b"hello").unwrap();

        let file = store.download("f-1").unwrap().unwrap();
        assert_eq!(file.file_name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.length, 5);
        assert_eq!(file.bytes, b"hello");
    }

    #[test]
    fn mime_type_is_not_sniffed() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        let conn = db.conn().unwrap();
        let store = AttachmentStore::new(&conn);

        store.upload("f-2", "image.png", "text/html", b"\x89PNG").unwrap();
        assert_eq!(store.download("f-2").unwrap().unwrap().mime_type, "text/html");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        let conn = db.conn().unwrap();
        let store = AttachmentStore::new(&conn);

        store.upload("same", "a.bin", "application/octet-stream", b"a").unwrap();
        assert!(store.upload("same", "b.bin", "application/octet-stream", b"b").is_err());
        assert_eq!(store.download("same").unwrap().unwrap().bytes, b"a");
    }

    #[test]
    fn delete_reports_missing_ids() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        let conn = db.conn().unwrap();
        let store = AttachmentStore::new(&conn);

        store.upload("gone", "x", "text/plain", b"x").unwrap();
        assert!(store.delete("gone"));
        assert!(!store.delete("gone"));
        assert!(store.download("gone").unwrap().is_none());
        assert!(store.download("never-there").unwrap().is_none());
    }
}
