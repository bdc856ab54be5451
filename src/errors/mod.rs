use std::fmt;
use std::io;
use axum::{http::StatusCode, response::{IntoResponse, Response}};

use crate::types::Page;

/// A single rejected form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Field-level messages collected while validating a page submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded against one field, in insertion order
    pub fn for_field(&self, field: &str) -> impl Iterator<Item = &str> + '_ {
        let field = field.to_string();
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Custom error types for the wiki application
#[derive(Debug)]
pub enum WikiError {
    Io(io::Error),
    Validation(ValidationErrors),
    NotFound(String),
    /// The blob behind an attachment could not be removed; the page is returned untouched
    AttachmentMissing { page: Box<Page>, file_id: String },
    HomePageProtected(String),
    Storage(String),
    BadRequest(String),
}

impl WikiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WikiError::NotFound(_) | WikiError::AttachmentMissing { .. })
    }
}

impl fmt::Display for WikiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WikiError::Io(e) => write!(f, "I/O error: {}", e),
            WikiError::Validation(errors) => write!(f, "validation failed: {}", errors),
            WikiError::NotFound(what) => write!(f, "not found: {}", what),
            WikiError::AttachmentMissing { page, file_id } => {
                write!(f, "attachment {} of page {} could not be removed", file_id, page.id)
            }
            WikiError::HomePageProtected(name) => {
                write!(f, "page '{}' is the home page and cannot be deleted", name)
            }
            WikiError::Storage(e) => write!(f, "storage error: {}", e),
            WikiError::BadRequest(e) => write!(f, "bad request: {}", e),
        }
    }
}

impl std::error::Error for WikiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WikiError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WikiError {
    fn from(err: io::Error) -> Self {
        WikiError::Io(err)
    }
}

impl From<rusqlite::Error> for WikiError {
    fn from(err: rusqlite::Error) -> Self {
        WikiError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for WikiError {
    fn from(err: r2d2::Error) -> Self {
        WikiError::Storage(format!("connection pool: {}", err))
    }
}

impl From<ValidationErrors> for WikiError {
    fn from(errors: ValidationErrors) -> Self {
        WikiError::Validation(errors)
    }
}

impl IntoResponse for WikiError {
    fn into_response(self) -> Response {
        match self {
            WikiError::NotFound(_) | WikiError::AttachmentMissing { .. } => {
                (StatusCode::NOT_FOUND, "Not found").into_response()
            }
            WikiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, errors.to_string()).into_response()
            }
            WikiError::BadRequest(e) => (StatusCode::BAD_REQUEST, e).into_response(),
            WikiError::HomePageProtected(_) => {
                (StatusCode::FORBIDDEN, "The home page cannot be deleted").into_response()
            }
            WikiError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("I/O error: {}", e),
            )
                .into_response(),
            // Storage details stay in the log
            WikiError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Problem in saving or loading wiki data",
            )
                .into_response(),
        }
    }
}
