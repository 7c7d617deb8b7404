//! JSON endpoints for job management and resident-file access.
//!
//! Ingestion endpoints are fire-and-forget: the acquisition job is
//! started on a spawned task and failures are logged, never returned to
//! the client. Status always answers from the registry's current view.

use std::path::{Path as StdPath, PathBuf};

use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use spindrift_core::registry::RegistryError;
use spindrift_core::source::JobId;
use spindrift_core::spawn_job_monitor;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::handlers::utils::{json_error, resolve_under};
use crate::server::AppState;

/// Body of `POST /download`. Exactly one field is expected; they are
/// checked in declaration order.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub magnet_url: Option<String>,
    pub torrent_file: Option<String>,
    pub torrent_url: Option<String>,
}

/// Body of `DELETE /delete-file`.
#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub file_path: String,
}

/// Body of `GET /status`.
#[derive(Serialize)]
pub struct StatusResponse {
    pub active_downloads: usize,
    pub torrents: Vec<TorrentStatus>,
}

/// One job's row in the status listing.
#[derive(Serialize)]
pub struct TorrentStatus {
    pub name: String,
    pub progress: f64,
    pub downloaded: u64,
    pub total: u64,
    pub speed: u64,
    pub status: &'static str,
    pub hash: JobId,
}

/// Registers the job and spawns its monitor. Shared tail of every
/// ingestion path.
fn track_job(state: &AppState, job: JobId) {
    state.registry.insert(job);
    spawn_job_monitor(
        state.registry.clone(),
        state.source.clone(),
        job,
        state.config.source.clone(),
    );
}

async fn ingest_magnet(state: AppState, magnet_url: String) {
    match state.source.add_magnet(&magnet_url).await {
        Ok(job) => {
            info!(%job, "magnet ingested");
            track_job(&state, job);
        }
        Err(error) => warn!(%error, "magnet ingestion failed"),
    }
}

async fn ingest_torrent_file(state: AppState, path: PathBuf) {
    match state.source.add_torrent_file(&path).await {
        Ok(job) => {
            info!(%job, path = %path.display(), "torrent file ingested");
            track_job(&state, job);
        }
        Err(error) => warn!(%error, path = %path.display(), "torrent file ingestion failed"),
    }
}

/// Fetches a remote `.torrent`, ingests it from a temp file beside the
/// download root, and removes the temp file afterwards.
async fn ingest_torrent_url(state: AppState, torrent_url: String) {
    let fetched = async {
        let response = state.http_client.get(&torrent_url).send().await?;
        response.error_for_status()?.bytes().await
    }
    .await;

    let contents = match fetched {
        Ok(contents) => contents,
        Err(error) => {
            warn!(%error, url = %torrent_url, "remote torrent fetch failed");
            return;
        }
    };

    let file_name = torrent_url
        .rsplit('/')
        .next()
        .filter(|name| name.ends_with(".torrent"))
        .unwrap_or("remote.torrent");
    let temp_path = state.config.storage.download_dir.join(file_name);

    if let Err(error) = tokio::fs::create_dir_all(&state.config.storage.download_dir).await {
        warn!(%error, "could not create download directory");
        return;
    }
    if let Err(error) = tokio::fs::write(&temp_path, &contents).await {
        warn!(%error, path = %temp_path.display(), "could not save remote torrent");
        return;
    }

    ingest_torrent_file(state, temp_path.clone()).await;

    if let Err(error) = tokio::fs::remove_file(&temp_path).await {
        warn!(%error, path = %temp_path.display(), "could not remove temp torrent");
    }
}

/// `POST /download` - starts acquisition from a magnet link, a local
/// `.torrent` path, or a remote `.torrent` URL.
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Response {
    if let Some(magnet_url) = request.magnet_url {
        let source = magnet_url.clone();
        tokio::spawn(ingest_magnet(state, magnet_url));
        return Json(json!({
            "message": "magnet download started",
            "type": "magnet",
            "source": source,
        }))
        .into_response();
    }

    if let Some(torrent_file) = request.torrent_file {
        let source = torrent_file.clone();
        tokio::spawn(ingest_torrent_file(state, PathBuf::from(torrent_file)));
        return Json(json!({
            "message": "torrent file download started",
            "type": "file",
            "source": source,
        }))
        .into_response();
    }

    if let Some(torrent_url) = request.torrent_url {
        let source = torrent_url.clone();
        tokio::spawn(ingest_torrent_url(state, torrent_url));
        return Json(json!({
            "message": "remote torrent download started",
            "type": "url",
            "source": source,
        }))
        .into_response();
    }

    json_error(
        StatusCode::BAD_REQUEST,
        "provide one of magnet_url, torrent_file or torrent_url",
    )
}

/// `POST /upload` - multipart upload of a `.torrent` file, saved to the
/// upload directory and then ingested.
pub async fn upload_torrent(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("torrent") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            return json_error(StatusCode::BAD_REQUEST, "missing file name");
        };
        if !file_name.ends_with(".torrent") {
            return json_error(StatusCode::BAD_REQUEST, "only .torrent files are supported");
        }

        // The filename comes from the client; only a bare final component
        // may land in the upload dir.
        let upload_dir = &state.config.storage.upload_dir;
        let Some(destination) = resolve_under(upload_dir, &file_name)
            .filter(|path| path.parent() == Some(upload_dir.as_path()))
        else {
            return json_error(StatusCode::BAD_REQUEST, "illegal file name");
        };

        let contents = match field.bytes().await {
            Ok(contents) => contents,
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "upload failed"),
        };

        if tokio::fs::create_dir_all(upload_dir).await.is_err() {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not create upload directory",
            );
        }
        if tokio::fs::write(&destination, &contents).await.is_err() {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "could not save file");
        }

        let size = contents.len();
        tokio::spawn(ingest_torrent_file(state, destination));
        return Json(json!({
            "message": "torrent uploaded, download started",
            "filename": file_name,
            "size": size,
        }))
        .into_response();
    }

    json_error(StatusCode::BAD_REQUEST, "upload failed")
}

/// `GET /status` - registry snapshot of every tracked job.
pub async fn download_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let torrents = state
        .registry
        .snapshots()
        .into_iter()
        .map(|entry| TorrentStatus {
            name: entry.display_name.clone(),
            progress: entry.progress(),
            downloaded: entry.downloaded_bytes,
            total: entry.total_bytes,
            speed: entry.bytes_per_second,
            status: entry.state.label(),
            hash: entry.id,
        })
        .collect();

    Json(StatusResponse {
        active_downloads: state.registry.active_count(),
        torrents,
    })
}

/// `POST /cancel/{id}` - terminalizes the job and drops its source state.
pub async fn cancel_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(job) = JobId::from_hex(&id) else {
        return json_error(StatusCode::NOT_FOUND, "download task not found");
    };

    match state.registry.cancel(job) {
        Ok(()) => {
            if let Err(error) = state.source.remove(job) {
                warn!(%job, %error, "source drop after cancel failed");
            }
            info!(%job, "download cancelled");
            Json(json!({ "message": "download cancelled" })).into_response()
        }
        Err(RegistryError::NotFound { .. }) => {
            json_error(StatusCode::NOT_FOUND, "download task not found")
        }
        Err(RegistryError::AlreadyTerminal { .. }) => {
            json_error(StatusCode::BAD_REQUEST, "download already finished")
        }
    }
}

/// `DELETE /remove/{id}` - drops the job from registry and source.
pub async fn remove_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(job) = JobId::from_hex(&id) else {
        return json_error(StatusCode::NOT_FOUND, "download task not found");
    };

    match state.registry.remove(job) {
        Ok(entry) => {
            if let Err(error) = state.source.remove(job) {
                warn!(%job, %error, "source drop after remove failed");
            }
            info!(%job, name = %entry.display_name, "download removed");
            Json(json!({ "message": "download task removed" })).into_response()
        }
        Err(_) => json_error(StatusCode::NOT_FOUND, "download task not found"),
    }
}

#[derive(Serialize)]
struct ResidentFile {
    name: String,
    size: u64,
    path: String,
}

fn collect_files(
    root: &StdPath,
    dir: &StdPath,
    out: &mut Vec<ResidentFile>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "torrent") {
            continue;
        }
        let metadata = entry.metadata()?;
        let relative = path.strip_prefix(root).unwrap_or(&path);
        out.push(ResidentFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            path: relative.to_string_lossy().into_owned(),
        });
    }
    Ok(())
}

/// `GET /files` - recursive listing of the download root, `.torrent`
/// files skipped.
pub async fn list_files(State(state): State<AppState>) -> Response {
    let root = state.config.storage.download_dir.clone();
    let mut files = Vec::new();
    if root.is_dir()
        && let Err(error) = collect_files(&root, &root, &mut files)
    {
        warn!(%error, root = %root.display(), "file listing failed");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "could not list files");
    }
    Json(json!({ "files": files })).into_response()
}

/// `DELETE /delete-file` - removes one file under the download root.
pub async fn delete_file(
    State(state): State<AppState>,
    Json(request): Json<DeleteFileRequest>,
) -> Response {
    if request.file_path.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "file path must not be empty");
    }

    let root = &state.config.storage.download_dir;
    let Some(full_path) = resolve_under(root, &request.file_path) else {
        return json_error(StatusCode::BAD_REQUEST, "illegal file path");
    };

    if !full_path.is_file() {
        return json_error(StatusCode::NOT_FOUND, "file not found");
    }

    if let Err(error) = tokio::fs::remove_file(&full_path).await {
        warn!(%error, path = %full_path.display(), "file deletion failed");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "could not delete file");
    }

    // Drop a now-empty parent directory; fails harmlessly when non-empty.
    if let Some(parent) = full_path.parent()
        && parent != root.as_path()
    {
        let _ = tokio::fs::remove_dir(parent).await;
    }

    info!(path = %full_path.display(), "file deleted");
    Json(json!({
        "message": "file deleted",
        "deleted_file": request.file_path,
    }))
    .into_response()
}

/// `GET /downloads/{*path}` - attachment download of a resident file.
pub async fn download_file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let root = &state.config.storage.download_dir;
    let Some(full_path) = resolve_under(root, &path) else {
        return json_error(StatusCode::BAD_REQUEST, "illegal file path");
    };

    let metadata = match tokio::fs::metadata(&full_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return json_error(StatusCode::NOT_FOUND, "file not found"),
    };

    let file = match tokio::fs::File::open(&full_path).await {
        Ok(file) => file,
        Err(error) => {
            warn!(%error, path = %full_path.display(), "could not open file");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "file access error");
        }
    };

    let file_name = full_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Response::builder()
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(Body::from_stream(ReaderStream::new(file)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
