//! Page persistence: CRUD over pages and their attachments in the embedded
//! store, plus the cached page listing.
//!
//! Every call checks a fresh connection out of the pool. A page row and the
//! blobs it references are always written in one transaction, so a failed
//! save or attachment delete leaves nothing half-applied. Write transactions
//! begin IMMEDIATE so concurrent writers queue on the busy timeout instead of
//! failing when they upgrade from a stale read snapshot.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use log::{debug, error, info, warn};
use rusqlite::{
    params, Connection, OptionalExtension, Result as SqliteResult, Row, TransactionBehavior,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{timestamp_from_row, timestamp_to_sql, Database};
use crate::errors::WikiError;
use crate::services::attachment_store::AttachmentStore;
use crate::services::page_cache::PageListCache;
use crate::services::page_validator::PageValidator;
use crate::services::slug::page_name_from_input;
use crate::types::{Attachment, Page, PageInput, StoredFile};

pub struct PageRepository {
    db: Database,
    cache: PageListCache,
    home_page_name: String,
}

impl PageRepository {
    pub fn new(db: Database, cache: PageListCache, home_page_name: impl Into<String>) -> Self {
        Self {
            db,
            cache,
            home_page_name: home_page_name.into(),
        }
    }

    /// Open the database under the configured content root
    pub fn open(config: &Config) -> Result<Self, WikiError> {
        let db = Database::open(&config.db_path(), config.pool_size)?;
        Ok(Self::new(
            db,
            PageListCache::new(config.cache_ttl),
            config.home_page_name.clone(),
        ))
    }

    pub fn home_page_name(&self) -> &str {
        &self.home_page_name
    }

    /// All pages ordered by name, served from the listing cache when possible
    pub fn list_all(&self) -> Result<Arc<Vec<Page>>, WikiError> {
        if let Some(pages) = self.cache.get() {
            debug!("Page listing served from cache ({} pages)", pages.len());
            return Ok(pages);
        }

        let pages = Arc::new(self.scan_pages().map_err(|e| report("list pages", &"*", e))?);
        debug!("Page listing rebuilt from store ({} pages)", pages.len());
        self.cache.set(Arc::clone(&pages));
        Ok(pages)
    }

    /// Case-insensitive lookup by name, straight from the store
    pub fn get(&self, name: &str) -> Result<Option<Page>, WikiError> {
        let lookup = || -> Result<Option<Page>, WikiError> {
            let conn = self.db.conn()?;
            // stored names are lowercased in Rust, so fold the key the same way
            Ok(load_page_by_name(&conn, &name.to_lowercase())?)
        };
        lookup().map_err(|e| report("get page", &name, e))
    }

    /// Create or update a page, storing the optional upload alongside it
    pub fn save(&self, input: PageInput) -> Result<Page, WikiError> {
        let target = input.name.clone();
        let page = self.save_page(input).map_err(|e| report("save page", &target, e))?;
        self.cache.invalidate();
        Ok(page)
    }

    /// Delete a page and every blob it owns. The home page is refused.
    pub fn delete_page(&self, id: i64, home_page_name: &str) -> Result<(), WikiError> {
        self.remove_page(id, home_page_name)
            .map_err(|e| report("delete page", &id, e))?;
        self.cache.invalidate();
        Ok(())
    }

    /// Delete one attachment blob and drop it from its page's list
    pub fn delete_attachment(&self, page_id: i64, attachment_id: &str) -> Result<Page, WikiError> {
        let page = self
            .remove_attachment(page_id, attachment_id)
            .map_err(|e| report("delete attachment", &attachment_id, e))?;
        self.cache.invalidate();
        Ok(page)
    }

    /// Read an attachment blob by id
    pub fn get_file(&self, file_id: &str) -> Result<StoredFile, WikiError> {
        let fetch = || -> Result<StoredFile, WikiError> {
            let conn = self.db.conn()?;
            AttachmentStore::new(&conn)
                .download(file_id)?
                .ok_or_else(|| WikiError::NotFound(format!("file {}", file_id)))
        };
        fetch().map_err(|e| report("get file", &file_id, e))
    }

    fn scan_pages(&self) -> Result<Vec<Page>, WikiError> {
        let mut conn = self.db.conn()?;
        // one read transaction so pages and attachments come from the same snapshot
        let tx = conn.transaction()?;
        let mut attachments = load_all_attachments(&tx)?;

        let mut stmt = tx.prepare(
            "SELECT id, name, content, last_modified_utc FROM pages ORDER BY name, id",
        )?;
        let rows = stmt.query_map([], row_to_page)?;

        let mut pages = Vec::new();
        for row in rows {
            let mut page = row?;
            page.attachments = attachments.remove(&page.id).unwrap_or_default();
            pages.push(page);
        }
        Ok(pages)
    }

    fn save_page(&self, input: PageInput) -> Result<Page, WikiError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = match input.id {
            Some(id) => load_page(&tx, id)?,
            None => None,
        };

        PageValidator::new(existing.as_ref().map(|p| p.name.as_str()), &self.home_page_name)
            .validate(&input)?;

        let name = page_name_from_input(&input.name);
        let now = OffsetDateTime::now_utc();
        let stamp = timestamp_to_sql(now)?;

        let mut page = match existing {
            Some(mut page) => {
                tx.execute(
                    "UPDATE pages SET name = ?1, content = ?2, last_modified_utc = ?3 WHERE id = ?4",
                    params![name, input.content, stamp, page.id],
                )?;
                info!("Updated page {} ('{}')", page.id, name);
                page.name = name;
                page.content = input.content;
                page.last_modified_utc = now;
                page
            }
            None => {
                tx.execute(
                    "INSERT INTO pages (name, content, last_modified_utc) VALUES (?1, ?2, ?3)",
                    params![name, input.content, stamp],
                )?;
                let id = tx.last_insert_rowid();
                info!("Created page {} ('{}')", id, name);
                Page {
                    id,
                    name,
                    content: input.content,
                    last_modified_utc: now,
                    attachments: Vec::new(),
                }
            }
        };

        if let Some(upload) = input.attachment.filter(|a| !a.file_name.trim().is_empty()) {
            let attachment = Attachment {
                file_id: Uuid::new_v4().to_string(),
                file_name: upload.file_name,
                mime_type: upload.mime_type,
                last_modified_utc: now,
            };
            AttachmentStore::new(&tx).upload(
                &attachment.file_id,
                &attachment.file_name,
                &attachment.mime_type,
                &upload.bytes,
            )?;
            insert_attachment(&tx, page.id, &attachment)?;
            info!("Attached '{}' as {} to page {}", attachment.file_name, attachment.file_id, page.id);
            page.attachments.push(attachment);
        }

        tx.commit()?;
        Ok(page)
    }

    fn remove_page(&self, id: i64, home_page_name: &str) -> Result<(), WikiError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let page = load_page(&tx, id)?
            .ok_or_else(|| WikiError::NotFound(format!("page id {}", id)))?;

        if page.name.eq_ignore_ascii_case(home_page_name) {
            return Err(WikiError::HomePageProtected(page.name));
        }

        let store = AttachmentStore::new(&tx);
        for attachment in &page.attachments {
            if !store.delete(&attachment.file_id) {
                // keep going, the page row is removed regardless
                warn!(
                    "Could not delete blob {} ('{}') while deleting page {}",
                    attachment.file_id, attachment.file_name, id
                );
            }
        }

        tx.execute("DELETE FROM page_attachments WHERE page_id = ?1", [id])?;
        if tx.execute("DELETE FROM pages WHERE id = ?1", [id])? == 0 {
            return Err(WikiError::NotFound(format!("page id {}", id)));
        }

        tx.commit()?;
        info!("Deleted page {} ('{}') with {} attachment(s)", id, page.name, page.attachments.len());
        Ok(())
    }

    fn remove_attachment(&self, page_id: i64, attachment_id: &str) -> Result<Page, WikiError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut page = load_page(&tx, page_id)?
            .ok_or_else(|| WikiError::NotFound(format!("page id {}", page_id)))?;

        let owned = page
            .attachments
            .iter()
            .any(|a| a.file_id.eq_ignore_ascii_case(attachment_id));

        if !owned || !AttachmentStore::new(&tx).delete(attachment_id) {
            return Err(WikiError::AttachmentMissing {
                page: Box::new(page),
                file_id: attachment_id.to_string(),
            });
        }

        // file_id is NOCASE, matching the in-memory comparison above
        tx.execute(
            "DELETE FROM page_attachments WHERE page_id = ?1 AND file_id = ?2",
            params![page_id, attachment_id],
        )?;
        tx.commit()?;

        page.attachments
            .retain(|a| !a.file_id.eq_ignore_ascii_case(attachment_id));
        info!("Deleted attachment {} from page {}", attachment_id, page_id);
        Ok(page)
    }
}

/// Log a failed operation at the level its kind deserves
fn report(operation: &str, target: &dyn Display, err: WikiError) -> WikiError {
    match &err {
        WikiError::Validation(errors) => {
            debug!("{} '{}' rejected: {}", operation, target, errors);
        }
        WikiError::NotFound(_)
        | WikiError::AttachmentMissing { .. }
        | WikiError::HomePageProtected(_) => {
            warn!("{} '{}' failed: {}", operation, target, err);
        }
        _ => {
            error!("{} '{}' failed: {}", operation, target, err);
        }
    }
    err
}

fn row_to_page(row: &Row) -> SqliteResult<Page> {
    Ok(Page {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        last_modified_utc: timestamp_from_row(row, 3)?,
        attachments: Vec::new(),
    })
}

fn row_to_attachment(row: &Row) -> SqliteResult<Attachment> {
    Ok(Attachment {
        file_id: row.get(0)?,
        file_name: row.get(1)?,
        mime_type: row.get(2)?,
        last_modified_utc: timestamp_from_row(row, 3)?,
    })
}

fn load_page(conn: &Connection, id: i64) -> SqliteResult<Option<Page>> {
    let page = conn
        .query_row(
            "SELECT id, name, content, last_modified_utc FROM pages WHERE id = ?1",
            [id],
            row_to_page,
        )
        .optional()?;
    with_attachments(conn, page)
}

fn load_page_by_name(conn: &Connection, name: &str) -> SqliteResult<Option<Page>> {
    // several pages may share a name; the oldest wins
    let page = conn
        .query_row(
            "SELECT id, name, content, last_modified_utc FROM pages
             WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            [name],
            row_to_page,
        )
        .optional()?;
    with_attachments(conn, page)
}

fn with_attachments(conn: &Connection, page: Option<Page>) -> SqliteResult<Option<Page>> {
    let Some(mut page) = page else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT file_id, file_name, mime_type, last_modified_utc FROM page_attachments
         WHERE page_id = ?1 ORDER BY position",
    )?;
    page.attachments = stmt
        .query_map([page.id], row_to_attachment)?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(Some(page))
}

fn load_all_attachments(conn: &Connection) -> SqliteResult<HashMap<i64, Vec<Attachment>>> {
    let mut stmt = conn.prepare(
        "SELECT page_id, file_id, file_name, mime_type, last_modified_utc FROM page_attachments
         ORDER BY page_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        let page_id: i64 = row.get(0)?;
        Ok((
            page_id,
            Attachment {
                file_id: row.get(1)?,
                file_name: row.get(2)?,
                mime_type: row.get(3)?,
                last_modified_utc: timestamp_from_row(row, 4)?,
            },
        ))
    })?;

    let mut by_page: HashMap<i64, Vec<Attachment>> = HashMap::new();
    for row in rows {
        let (page_id, attachment) = row?;
        by_page.entry(page_id).or_default().push(attachment);
    }
    Ok(by_page)
}

fn insert_attachment(conn: &Connection, page_id: i64, attachment: &Attachment) -> SqliteResult<()> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM page_attachments WHERE page_id = ?1",
        [page_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO page_attachments (file_id, page_id, position, file_name, mime_type, last_modified_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attachment.file_id,
            page_id,
            position,
            attachment.file_name,
            attachment.mime_type,
            timestamp_to_sql(attachment.last_modified_utc)?,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_rows;
    use crate::types::AttachmentUpload;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const HOME: &str = "home-page";

    fn repo() -> (TempDir, PageRepository) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("wiki.db"), 4).unwrap();
        let repo = PageRepository::new(db, PageListCache::new(Duration::from_secs(1800)), HOME);
        (dir, repo)
    }

    fn upload(name: &str, bytes: &[u8]) -> AttachmentUpload {
        AttachmentUpload {
            file_name: name.to_string(),
            mime_type: "text/plain".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn saved_page_is_found_by_name_and_listed_once() {
        let (_dir, repo) = repo();
        assert!(repo.list_all().unwrap().is_empty());

        let saved = repo.save(PageInput::new(None, "My Notes", "# Notes")).unwrap();
        assert_eq!(saved.name, "my-notes");

        let found = repo.get("my-notes").unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.content, "# Notes");

        let listed = repo.list_all().unwrap();
        assert_eq!(listed.iter().filter(|p| p.id == saved.id).count(), 1);
    }

    #[test]
    fn lookup_ignores_case() {
        let (_dir, repo) = repo();
        repo.save(PageInput::new(None, "recipes", "soup")).unwrap();
        assert!(repo.get("RECIPES").unwrap().is_some());
        assert!(repo.get("Recipes").unwrap().is_some());
        assert!(repo.get("recipe").unwrap().is_none());
    }

    #[test]
    fn lookup_ignores_case_beyond_ascii() {
        let (_dir, repo) = repo();
        let saved = repo.save(PageInput::new(None, "Über Notes", "umlaut")).unwrap();
        assert_eq!(saved.name, "über-notes");

        assert_eq!(repo.get("Über-notes").unwrap().unwrap().id, saved.id);
        assert_eq!(repo.get("ÜBER-NOTES").unwrap().unwrap().id, saved.id);
    }

    #[test]
    fn empty_named_upload_is_still_stored() {
        let (_dir, repo) = repo();
        let page = repo
            .save(PageInput::new(None, "blank", "x").with_attachment(upload("empty.txt", b"")))
            .unwrap();
        assert_eq!(page.attachments.len(), 1);

        let file = repo.get_file(&page.attachments[0].file_id).unwrap();
        assert_eq!(file.length, 0);
        assert!(file.bytes.is_empty());
    }

    #[test]
    fn empty_name_is_rejected_and_nothing_stored() {
        let (dir, repo) = repo();
        let err = repo.save(PageInput::new(None, "", "content")).unwrap_err();
        assert!(matches!(err, WikiError::Validation(_)));

        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        assert_eq!(count_rows(&db.conn().unwrap(), "pages").unwrap(), 0);
    }

    #[test]
    fn empty_content_is_rejected() {
        let (_dir, repo) = repo();
        let err = repo.save(PageInput::new(None, "page", "   ")).unwrap_err();
        match err {
            WikiError::Validation(errors) => assert_eq!(errors.for_field("Content").count(), 1),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn home_page_keeps_its_name() {
        let (_dir, repo) = repo();
        let home = repo.save(PageInput::new(None, HOME, "welcome")).unwrap();

        let err = repo
            .save(PageInput::new(Some(home.id), "landing", "welcome"))
            .unwrap_err();
        assert!(matches!(err, WikiError::Validation(_)));

        let stored = repo.get(HOME).unwrap().unwrap();
        assert_eq!(stored.name, HOME);
        assert_eq!(stored.content, "welcome");
        assert!(repo.get("landing").unwrap().is_none());
    }

    #[test]
    fn update_keeps_id_and_appends_attachments() {
        let (_dir, repo) = repo();
        let first = repo
            .save(PageInput::new(None, "docs", "v1").with_attachment(upload("a.txt", b"a")))
            .unwrap();
        let second = repo
            .save(PageInput::new(Some(first.id), "docs", "v2").with_attachment(upload("b.txt", b"b")))
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.content, "v2");
        assert!(second.last_modified_utc >= first.last_modified_utc);

        let stored = repo.get("docs").unwrap().unwrap();
        let names: Vec<&str> = stored.attachments.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(repo.get_file(&stored.attachments[1].file_id).unwrap().bytes, b"b");
    }

    #[test]
    fn unknown_id_inserts_a_new_page() {
        let (_dir, repo) = repo();
        let page = repo.save(PageInput::new(Some(999), "fresh", "text")).unwrap();
        assert_ne!(page.id, 999);
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn blank_upload_name_is_ignored() {
        let (_dir, repo) = repo();
        let page = repo
            .save(PageInput::new(None, "plain", "text").with_attachment(upload("  ", b"zzz")))
            .unwrap();
        assert!(page.attachments.is_empty());
    }

    #[test]
    fn listing_is_sorted_and_refreshed_after_writes() {
        let (_dir, repo) = repo();
        repo.save(PageInput::new(None, "zebra", "z")).unwrap();
        repo.save(PageInput::new(None, "apple", "a")).unwrap();

        let names: Vec<String> = repo.list_all().unwrap().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["apple", "zebra"]);

        let mango = repo.save(PageInput::new(None, "mango", "m")).unwrap();
        let names: Vec<String> = repo.list_all().unwrap().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);

        repo.delete_page(mango.id, HOME).unwrap();
        assert_eq!(repo.list_all().unwrap().len(), 2);
    }

    #[test]
    fn home_page_cannot_be_deleted() {
        let (_dir, repo) = repo();
        let home = repo.save(PageInput::new(None, HOME, "welcome")).unwrap();

        let err = repo.delete_page(home.id, HOME).unwrap_err();
        assert!(matches!(err, WikiError::HomePageProtected(_)));
        let err = repo.delete_page(home.id, "HOME-PAGE").unwrap_err();
        assert!(matches!(err, WikiError::HomePageProtected(_)));
        assert!(repo.get(HOME).unwrap().is_some());
    }

    #[test]
    fn deleting_missing_page_is_not_found() {
        let (_dir, repo) = repo();
        assert!(repo.delete_page(42, HOME).unwrap_err().is_not_found());
    }

    #[test]
    fn deleting_page_removes_its_blobs() {
        let (_dir, repo) = repo();
        let page = repo
            .save(PageInput::new(None, "gallery", "pics").with_attachment(upload("1.txt", b"1")))
            .unwrap();
        let page = repo
            .save(PageInput::new(Some(page.id), "gallery", "pics").with_attachment(upload("2.txt", b"2")))
            .unwrap();
        let page = repo
            .save(PageInput::new(Some(page.id), "gallery", "pics").with_attachment(upload("3.txt", b"3")))
            .unwrap();
        assert_eq!(page.attachments.len(), 3);

        repo.delete_page(page.id, HOME).unwrap();

        assert!(repo.get("gallery").unwrap().is_none());
        for attachment in &page.attachments {
            assert!(repo.get_file(&attachment.file_id).unwrap_err().is_not_found());
        }
    }

    #[test]
    fn deleting_attachment_updates_page() {
        let (_dir, repo) = repo();
        let page = repo
            .save(PageInput::new(None, "files", "x").with_attachment(upload("keep.txt", b"k")))
            .unwrap();
        let page = repo
            .save(PageInput::new(Some(page.id), "files", "x").with_attachment(upload("drop.txt", b"d")))
            .unwrap();
        let drop_id = page.attachments[1].file_id.clone();

        let updated = repo
            .delete_attachment(page.id, &drop_id.to_uppercase())
            .unwrap();
        assert_eq!(updated.attachments.len(), 1);
        assert_eq!(updated.attachments[0].file_name, "keep.txt");

        let stored = repo.get("files").unwrap().unwrap();
        assert_eq!(stored.attachments.len(), 1);
        assert!(repo.get_file(&drop_id).unwrap_err().is_not_found());
    }

    #[test]
    fn deleting_unknown_attachment_leaves_page_alone() {
        let (_dir, repo) = repo();
        let page = repo
            .save(PageInput::new(None, "files", "x").with_attachment(upload("keep.txt", b"k")))
            .unwrap();

        match repo.delete_attachment(page.id, "no-such-file").unwrap_err() {
            WikiError::AttachmentMissing { page: unchanged, .. } => {
                assert_eq!(unchanged.attachments.len(), 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(repo.get("files").unwrap().unwrap().attachments.len(), 1);
    }

    #[test]
    fn attachment_of_another_page_is_not_touched() {
        let (_dir, repo) = repo();
        let owner = repo
            .save(PageInput::new(None, "owner", "x").with_attachment(upload("mine.txt", b"m")))
            .unwrap();
        let other = repo.save(PageInput::new(None, "other", "y")).unwrap();
        let file_id = owner.attachments[0].file_id.clone();

        assert!(repo.delete_attachment(other.id, &file_id).is_err());
        assert_eq!(repo.get_file(&file_id).unwrap().bytes, b"m");
    }

    #[test]
    fn deleting_attachment_of_missing_page_is_not_found() {
        let (_dir, repo) = repo();
        let err = repo.delete_attachment(7, "whatever").unwrap_err();
        assert!(matches!(err, WikiError::NotFound(_)));
    }

    #[test]
    fn failed_save_does_not_leave_blob_behind() {
        let (dir, repo) = repo();
        let err = repo
            .save(PageInput::new(None, "", "x").with_attachment(upload("orphan.txt", b"o")))
            .unwrap_err();
        assert!(matches!(err, WikiError::Validation(_)));

        let db = Database::open(&dir.path().join("wiki.db"), 1).unwrap();
        assert_eq!(count_rows(&db.conn().unwrap(), "files").unwrap(), 0);
    }

    #[test]
    fn duplicate_names_resolve_to_oldest_page() {
        let (_dir, repo) = repo();
        let first = repo.save(PageInput::new(None, "twin", "first")).unwrap();
        repo.save(PageInput::new(None, "twin", "second")).unwrap();

        assert_eq!(repo.get("twin").unwrap().unwrap().id, first.id);
        assert_eq!(repo.list_all().unwrap().len(), 2);
    }

    #[test]
    fn page_name_is_sanitized_on_save() {
        let (_dir, repo) = repo();
        let page = repo
            .save(PageInput::new(None, "Nice <img src=x onerror=alert(1)> Page", "x"))
            .unwrap();
        assert!(!page.name.contains("onerror"));
        assert!(page.name.starts_with("nice-"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, repo) = repo();
        assert!(repo.get_file("nope").unwrap_err().is_not_found());
    }
}
