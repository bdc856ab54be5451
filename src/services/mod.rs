pub mod attachment_store;
pub mod markdown_service;
pub mod page_cache;
pub mod page_repository;
pub mod page_validator;
pub mod slug;

pub use attachment_store::AttachmentStore;
pub use markdown_service::{render_markdown, sanitize_html, MarkdownService};
pub use page_cache::PageListCache;
pub use page_repository::PageRepository;
pub use page_validator::PageValidator;
pub use slug::{normalize_slug, page_name_from_input, title_from_slug};
