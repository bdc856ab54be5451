//! Folio - a minimal personal wiki
//!
//! Markdown pages and their attachments live in a single embedded SQLite file.
//! The core is the page persistence and rendering pipeline in [`services`];
//! [`handlers`] and [`components`] are the thin web layer on top of it.

pub mod components;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod logger;
pub mod services;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::Config;
pub use db::Database;
pub use errors::{ValidationErrors, WikiError};
pub use types::{AppState, Attachment, AttachmentUpload, Page, PageInput, StoredFile};
pub use services::{MarkdownService, PageListCache, PageRepository};
pub use components::{NavigationComponent, PageComponent, TemplateComponent};

// Re-export utility functions
pub use utils::{escape_attr, escape_html, format_display_date};
