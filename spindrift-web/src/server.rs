//! Axum server wiring for the Spindrift HTTP surface.
//!
//! Builds the router over a shared [`AppState`] and runs it on a TCP
//! listener. Handlers never own state; everything hangs off the
//! registry, the content source, and the config.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use axum::Router;
use axum::response::Redirect;
use axum::routing::{delete, get, post};
use spindrift_core::registry::DownloadRegistry;
use spindrift_core::source::ContentSource;
use spindrift_core::SpindriftConfig;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::handlers::api::{
    cancel_download, delete_file, download_file, download_status, list_files, remove_download,
    start_download, upload_torrent,
};
use crate::handlers::streaming::{downloading_videos, job_files, stream};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DownloadRegistry>,
    pub source: Arc<dyn ContentSource>,
    pub config: SpindriftConfig,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Creates state over a fresh registry.
    pub fn new(source: Arc<dyn ContentSource>, config: SpindriftConfig) -> Self {
        Self {
            registry: Arc::new(DownloadRegistry::new()),
            source,
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Builds the full route table. Separated from [`run_server`] so tests
/// can drive the router without binding a socket.
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.storage.static_dir.clone();

    Router::new()
        .route("/", get(|| async { Redirect::permanent("/static/index.html") }))
        // Acquisition management
        .route("/download", post(start_download))
        .route("/upload", post(upload_torrent))
        .route("/status", get(download_status))
        .route("/cancel/{id}", post(cancel_download))
        .route("/remove/{id}", delete(remove_download))
        // Streaming
        .route("/stream/{*path}", get(stream))
        .route("/downloading-videos", get(downloading_videos))
        .route("/torrent/{id}/files", get(job_files))
        // Resident files
        .route("/files", get(list_files))
        .route("/downloads/{*path}", get(download_file))
        .route("/delete-file", delete(delete_file))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn run_server(
    source: Arc<dyn ContentSource>,
    config: SpindriftConfig,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(source, config);
    let app = router(state);

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Spindrift server listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
