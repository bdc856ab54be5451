use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};
use log::{error, info};
use tokio::net::TcpListener;

use folio::handlers::{
    handle_attachment, handle_delete_attachment, handle_delete_page, handle_edit, handle_new_page,
    handle_not_found, handle_page, handle_root, handle_save, MAX_UPLOAD_BYTES,
};
use folio::logger::Logger;
use folio::{AppState, Config, PageRepository, WikiError};

#[tokio::main]
async fn main() -> Result<(), WikiError> {
    if let Err(e) = Logger::init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let config = Config::from_env();
    info!(
        "Opening wiki store at {} (home page '{}')",
        config.db_path().display(),
        config.home_page_name
    );

    let pages = PageRepository::open(&config).map_err(|e| {
        error!("Unable to open wiki store: {}", e);
        e
    })?;

    let addr = config.socket_addr();
    let state = AppState {
        config: Arc::new(config),
        pages: Arc::new(pages),
    };

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/new-page", get(handle_new_page))
        .route("/edit", get(handle_edit))
        .route("/attachment", get(handle_attachment))
        .route("/delete-page", post(handle_delete_page))
        .route("/delete-attachment", post(handle_delete_attachment))
        .route("/:page_name", get(handle_page).post(handle_save))
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    info!("Wiki listening on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await.map_err(WikiError::from)
}
