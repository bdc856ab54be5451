use axum::{
    body::Body,
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{header, HeaderValue, Response, StatusCode},
    response::{Html, IntoResponse, Redirect},
    Form,
};
use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::components::{NavigationComponent, PageComponent, TemplateComponent};
use crate::errors::{ValidationErrors, WikiError};
use crate::services::{normalize_slug, PageValidator};
use crate::types::{AppState, AttachmentUpload, Page, PageInput};

/// Largest multipart body accepted by the page editor
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct PageNameQuery {
    #[serde(rename = "pageName")]
    pub page_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileIdQuery {
    #[serde(rename = "fileId")]
    pub file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePageForm {
    #[serde(rename = "Id")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAttachmentForm {
    #[serde(rename = "Id")]
    pub id: Option<String>,
    #[serde(rename = "PageId")]
    pub page_id: Option<String>,
}

/// Run a repository call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, WikiError>
where
    F: FnOnce() -> Result<T, WikiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WikiError::Storage(format!("blocking task failed: {}", e)))?
}

async fn all_pages(state: &AppState) -> Result<std::sync::Arc<Vec<Page>>, WikiError> {
    let repo = state.pages.clone();
    blocking(move || repo.list_all()).await
}

async fn find_page(state: &AppState, name: String) -> Result<Option<Page>, WikiError> {
    let repo = state.pages.clone();
    blocking(move || repo.get(&name)).await
}

/// Redirect target for a page name, safe to put in a Location header
fn page_location(name: &str) -> String {
    format!("/{}", urlencoding::encode(name))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn render_view(page: &Page, pages: &[Page]) -> String {
    let side_panel = NavigationComponent::new(pages).build_page_list_html(&page.name);
    let body = PageComponent::new().render_view(page);
    TemplateComponent::new().render_page(&page.name, &body, &side_panel)
}

fn render_editor(
    page_name: &str,
    input: &PageInput,
    errors: Option<&ValidationErrors>,
    pages: &[Page],
) -> String {
    let form = PageComponent::new().render_form(input, page_name, errors);
    let side_panel = NavigationComponent::new(pages).build_link_list_html();
    TemplateComponent::new().render_editor_page(page_name, &form, &side_panel)
}

/// `GET /`: the home page, or its editor when it does not exist yet
pub async fn handle_root(State(state): State<AppState>) -> Result<Response<Body>, WikiError> {
    let home = state.config.home_page_name.clone();
    let Some(page) = find_page(&state, home.clone()).await? else {
        debug!("Home page '{}' missing, redirecting to its editor", home);
        return Ok(Redirect::to(&page_location(&home)).into_response());
    };

    let pages = all_pages(&state).await?;
    Ok(Html(render_view(&page, &pages)).into_response())
}

/// `GET /new-page?pageName=`: slug the requested title and go there
pub async fn handle_new_page(Query(query): Query<PageNameQuery>) -> Redirect {
    match non_empty(query.page_name) {
        Some(name) => {
            let slug = normalize_slug(&name);
            debug!("New page '{}' maps to '{}'", name, slug);
            Redirect::to(&page_location(&slug))
        }
        None => {
            warn!("Invalid empty string to add");
            Redirect::to("/")
        }
    }
}

/// `GET /edit?pageName=`: editor for an existing page
pub async fn handle_edit(
    State(state): State<AppState>,
    Query(query): Query<PageNameQuery>,
) -> Result<Response<Body>, WikiError> {
    let page_name = non_empty(query.page_name)
        .ok_or_else(|| WikiError::BadRequest("pageName is required".to_string()))?;
    let page = find_page(&state, page_name.clone())
        .await?
        .ok_or_else(|| WikiError::NotFound(format!("page '{}'", page_name)))?;
    let pages = all_pages(&state).await?;

    let component = PageComponent::new();
    let input = PageInput::new(Some(page.id), page_name.clone(), page.content.clone());
    let body = format!(
        "{}{}",
        component.render_form(&input, &page_name, None),
        component.render_attachments_for_edit(&page)
    );

    let mut side_panel = String::new();
    if page_name != state.config.home_page_name {
        side_panel.push_str(&component.render_delete_page_button(&page));
    }
    side_panel.push_str("<br>");
    side_panel.push_str(&NavigationComponent::new(&pages).build_link_list_html());

    let html = TemplateComponent::new().render_editor_page(&page_name, &body, &side_panel);
    Ok(Html(html).into_response())
}

/// `GET /attachment?fileId=`: the stored bytes with their recorded MIME type
pub async fn handle_attachment(
    State(state): State<AppState>,
    Query(query): Query<FileIdQuery>,
) -> Result<Response<Body>, WikiError> {
    let file_id = non_empty(query.file_id)
        .ok_or_else(|| WikiError::BadRequest("fileId is required".to_string()))?;
    let repo = state.pages.clone();
    let file = blocking(move || repo.get_file(&file_id)).await?;

    info!("Attachment {} - {}", file.file_id, file.file_name);

    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        header_safe_file_name(&file.file_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    let mut resp = Response::new(Body::from(file.bytes));
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    Ok(resp)
}

fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect()
}

/// `GET /{pageName}`: the page, or an empty editor when no page has that name
pub async fn handle_page(
    State(state): State<AppState>,
    AxumPath(page_name): AxumPath<String>,
) -> Result<Response<Body>, WikiError> {
    let page = find_page(&state, page_name.clone()).await?;
    let pages = all_pages(&state).await?;

    let html = match page {
        Some(page) => render_view(&page, &pages),
        None => {
            debug!("No page named '{}', offering the editor", page_name);
            let input = PageInput::new(None, page_name.clone(), String::new());
            render_editor(&page_name, &input, None, &pages)
        }
    };
    Ok(Html(html).into_response())
}

/// `POST /{pageName}`: validate and save the editor form
pub async fn handle_save(
    State(state): State<AppState>,
    AxumPath(page_name): AxumPath<String>,
    multipart: Multipart,
) -> Result<Response<Body>, WikiError> {
    let input = read_page_input(multipart).await?;

    let checked = PageValidator::new(Some(&page_name), &state.config.home_page_name).validate(&input);
    if let Err(errors) = checked {
        debug!("Rejected save of '{}': {}", page_name, errors);
        return render_invalid(&state, &page_name, &input, &errors).await;
    }

    // Kept for re-displaying the form; the upload itself moves into the repository
    let echo = PageInput::new(input.id, input.name.clone(), input.content.clone());
    let repo = state.pages.clone();
    match blocking(move || repo.save(input)).await {
        Ok(page) => Ok(Redirect::to(&page_location(&page.name)).into_response()),
        Err(WikiError::Validation(errors)) => render_invalid(&state, &page_name, &echo, &errors).await,
        Err(e) => {
            error!("Problem in saving page '{}': {}", page_name, e);
            Err(e)
        }
    }
}

async fn render_invalid(
    state: &AppState,
    page_name: &str,
    input: &PageInput,
    errors: &ValidationErrors,
) -> Result<Response<Body>, WikiError> {
    let pages = all_pages(state).await?;
    let html = render_editor(page_name, input, Some(errors), &pages);
    Ok(Html(html).into_response())
}

/// Collect `Id`, `Name`, `Content` and the optional `Attachment` file from the editor form
async fn read_page_input(mut multipart: Multipart) -> Result<PageInput, WikiError> {
    let mut input = PageInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WikiError::BadRequest(format!("invalid multipart payload: {}", e)))?
    {
        match field.name() {
            Some("Id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| WikiError::BadRequest(format!("invalid Id field: {}", e)))?;
                if !value.trim().is_empty() {
                    let id = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| WikiError::BadRequest(format!("invalid page id '{}'", value)))?;
                    input.id = Some(id);
                }
            }
            Some("Name") => {
                input.name = field
                    .text()
                    .await
                    .map_err(|e| WikiError::BadRequest(format!("invalid Name field: {}", e)))?;
            }
            Some("Content") => {
                input.content = field
                    .text()
                    .await
                    .map_err(|e| WikiError::BadRequest(format!("invalid Content field: {}", e)))?;
            }
            Some("Attachment") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| WikiError::BadRequest(format!("invalid Attachment field: {}", e)))?;
                input.attachment = attachment_from_part(file_name, mime_type, bytes.to_vec());
            }
            _ => {}
        }
    }

    Ok(input)
}

/// An untouched file input still posts a part, but without a filename
fn attachment_from_part(file_name: String, mime_type: String, bytes: Vec<u8>) -> Option<AttachmentUpload> {
    if file_name.is_empty() {
        return None;
    }
    Some(AttachmentUpload { file_name, mime_type, bytes })
}

/// `POST /delete-page`: always lands back on `/`
pub async fn handle_delete_page(
    State(state): State<AppState>,
    Form(form): Form<DeletePageForm>,
) -> Redirect {
    let Some(raw_id) = non_empty(form.id) else {
        warn!("Unable to delete page because form Id is missing");
        return Redirect::to("/");
    };
    let Ok(id) = raw_id.trim().parse::<i64>() else {
        warn!("Unable to delete page because form Id '{}' is not a number", raw_id);
        return Redirect::to("/");
    };

    let repo = state.pages.clone();
    if let Err(e) = blocking(move || repo.delete_page(id, repo.home_page_name())).await {
        error!("Unable to delete page id {}: {}", id, e);
    }
    Redirect::to("/")
}

/// `POST /delete-attachment`: back to the owning page when it is known
pub async fn handle_delete_attachment(
    State(state): State<AppState>,
    Form(form): Form<DeleteAttachmentForm>,
) -> Redirect {
    let Some(id) = non_empty(form.id) else {
        warn!("Unable to delete attachment because form Id is missing");
        return Redirect::to("/");
    };
    let Some(page_id) = non_empty(form.page_id).and_then(|p| p.trim().parse::<i64>().ok()) else {
        warn!("Unable to delete attachment because form PageId is missing");
        return Redirect::to("/");
    };

    let repo = state.pages.clone();
    let attachment_id = id.clone();
    match blocking(move || repo.delete_attachment(page_id, &attachment_id)).await {
        Ok(page) => Redirect::to(&page_location(&page.name)),
        Err(WikiError::AttachmentMissing { page, .. }) => {
            error!("Unable to delete page attachment id {}", id);
            Redirect::to(&page_location(&page.name))
        }
        Err(e) => {
            error!("Error in deleting page attachment id {}: {}", id, e);
            Redirect::to("/")
        }
    }
}

/// Fallback for unknown methods and paths
pub async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
