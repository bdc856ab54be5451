use std::sync::Arc;
use time::OffsetDateTime;

use crate::config::Config;
use crate::services::PageRepository;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pages: Arc<PageRepository>,
}

/// A wiki page as persisted in the `pages` table
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: i64,
    /// Always the normalized slug, never raw user input
    pub name: String,
    /// Raw markdown as submitted by the author
    pub content: String,
    pub last_modified_utc: OffsetDateTime,
    pub attachments: Vec<Attachment>,
}

/// Metadata for a file attached to exactly one page
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub last_modified_utc: OffsetDateTime,
}

/// File payload uploaded alongside a page save
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// What the web layer submits to `PageRepository::save`
#[derive(Debug, Clone, Default)]
pub struct PageInput {
    pub id: Option<i64>,
    pub name: String,
    pub content: String,
    pub attachment: Option<AttachmentUpload>,
}

impl PageInput {
    pub fn new(id: Option<i64>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: AttachmentUpload) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// A blob read back from the attachment store
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub length: i64,
    pub uploaded_utc: OffsetDateTime,
    pub bytes: Vec<u8>,
}

/// Template rendering context
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub title: String,
    pub head: String,
    pub content: String,
    pub side_panel: String,
    pub foot: String,
}
