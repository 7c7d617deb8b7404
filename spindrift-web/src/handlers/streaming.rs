//! Progressive streaming handlers.
//!
//! `/stream/torrent/{id}/{path}` serves byte ranges out of a job that is
//! still being assembled: the head of the file (or a window around a
//! seek target) is prioritized, then a spawned writer task feeds the
//! response body chunk by chunk, waiting for each span to become
//! available. Any other `/stream` path serves a fully resident file
//! under the download root with identical Range semantics.

use std::io::SeekFrom;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use spindrift_core::config::StreamingConfig;
use spindrift_core::source::{JobId, SourceFile};
use spindrift_core::streaming::{
    ByteRange, ChannelSink, StreamOutcome, is_playable, parse_range_header, progress_percent,
    stream_range,
};
use spindrift_core::video::{content_type_for, is_video_file};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::handlers::utils::{json_error, resolve_under};
use crate::server::AppState;

/// `GET /stream/{*path}` - dispatches between progressive job streaming
/// (`torrent/{id}/{file}`) and resident-file streaming.
pub async fn stream(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    match path.strip_prefix("torrent/") {
        Some(rest) => stream_job_file(state, rest, &headers).await,
        None => stream_resident_file(state, &path, &headers).await,
    }
}

async fn stream_job_file(state: AppState, rest: &str, headers: &HeaderMap) -> Response {
    let Some((id, file_path)) = rest.split_once('/') else {
        return json_error(StatusCode::BAD_REQUEST, "invalid torrent stream path");
    };
    let Ok(job) = JobId::from_hex(id) else {
        return json_error(StatusCode::NOT_FOUND, "download task not found");
    };
    if !state.registry.contains(job) {
        return json_error(StatusCode::NOT_FOUND, "download task not found");
    }

    let file = match SourceFile::open(
        state.source.clone(),
        job,
        file_path,
        state.config.source.file_list_timeout,
    )
    .await
    {
        Ok(file) => file,
        Err(error) => {
            info!(%job, path = file_path, %error, "stream target not found");
            return json_error(StatusCode::NOT_FOUND, "file not found in torrent");
        }
    };

    if !is_video_file(file_path) {
        return json_error(StatusCode::BAD_REQUEST, "not a video file");
    }

    let total = file.length();
    let streaming = &state.config.streaming;

    // Make the head of the file arrive first so playback can start.
    file.prioritize_range(0, streaming.preload_bytes.min(total));

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    match range_header {
        Some(value) => match parse_range_header(value, total) {
            Ok(range) => {
                if range.start > 0 {
                    preload_window(&file, range.start, streaming.seek_preload_bytes);
                }
                progressive_response(file, range, true, streaming.clone())
            }
            Err(error) => {
                debug!(%job, path = file_path, %error, "unsatisfiable range");
                unsatisfiable_response(total)
            }
        },
        None => match ByteRange::full(total) {
            Ok(range) => progressive_response(file, range, false, streaming.clone()),
            // Zero-length file: nothing to stream.
            Err(_) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type_for(file_path))
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CONTENT_LENGTH, 0)
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        },
    }
}

/// Raises priority on a window centered on `position`, clamped to the
/// file. Keeps seeks into cold regions from stalling for a full window.
fn preload_window(file: &SourceFile, position: u64, window: u64) {
    let start = position.saturating_sub(window / 2);
    let end = (position + window / 2).min(file.length());
    if end > start {
        file.prioritize_range(start, end - start);
    }
}

/// Builds the chunked response: one writer task per stream, bridged to
/// the body through a capacity-one channel so each chunk is flushed as
/// soon as it is produced.
fn progressive_response(
    file: SourceFile,
    range: ByteRange,
    partial: bool,
    config: StreamingConfig,
) -> Response {
    let content_type = content_type_for(file.path());
    let (mut sink, rx) = ChannelSink::new();

    tokio::spawn(async move {
        match stream_range(&file, range, &mut sink, &config).await {
            StreamOutcome::Completed => {
                debug!(job = %file.job(), path = file.path(), "stream completed")
            }
            StreamOutcome::Disconnected => {
                debug!(job = %file.job(), path = file.path(), "client disconnected")
            }
            StreamOutcome::AvailabilityTimeout => {
                warn!(job = %file.job(), path = file.path(), "stream aborted: data never arrived")
            }
            StreamOutcome::ReadFailed => {
                warn!(job = %file.job(), path = file.path(), "stream aborted: read failed")
            }
        }
    });

    let mut builder = Response::builder()
        .status(if partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_LENGTH, range.length());
    if partial {
        builder = builder.header(header::CONTENT_RANGE, range.content_range());
    }

    builder
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// 416 with the `bytes */{total}` form required for rejected ranges.
fn unsatisfiable_response(total: u64) -> Response {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_RANGE, format!("bytes */{total}"))
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn stream_resident_file(state: AppState, path: &str, headers: &HeaderMap) -> Response {
    let root = &state.config.storage.download_dir;
    let Some(full_path) = resolve_under(root, path) else {
        return json_error(StatusCode::BAD_REQUEST, "illegal file path");
    };

    let metadata = match tokio::fs::metadata(&full_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return json_error(StatusCode::NOT_FOUND, "file not found"),
    };

    if !is_video_file(path) {
        return json_error(StatusCode::BAD_REQUEST, "not a video file");
    }

    let total = metadata.len();
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let (range, partial) = match range_header {
        Some(value) => match parse_range_header(value, total) {
            Ok(range) => (range, true),
            Err(_) => return unsatisfiable_response(total),
        },
        None => match ByteRange::full(total) {
            Ok(range) => (range, false),
            Err(_) => {
                return Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, content_type_for(path))
                    .header(header::ACCEPT_RANGES, "bytes")
                    .header(header::CONTENT_LENGTH, 0)
                    .body(Body::empty())
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        },
    };

    let mut file = match tokio::fs::File::open(&full_path).await {
        Ok(file) => file,
        Err(error) => {
            warn!(%error, path = %full_path.display(), "could not open file");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "could not open file");
        }
    };
    if file.seek(SeekFrom::Start(range.start)).await.is_err() {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "file access error");
    }

    let limited = file.take(range.length());
    let body = Body::from_stream(ReaderStream::with_capacity(
        limited,
        state.config.streaming.chunk_size,
    ));

    let mut builder = Response::builder()
        .status(if partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_LENGTH, range.length());
    if partial {
        builder = builder.header(header::CONTENT_RANGE, range.content_range());
    }

    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// `GET /downloading-videos` - every video file across non-terminal jobs
/// whose metadata has resolved, with the playability verdict.
pub async fn downloading_videos(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut videos = Vec::new();

    for entry in state.registry.snapshots() {
        if entry.state.is_terminal() {
            continue;
        }
        // Non-blocking: jobs still waiting on metadata are skipped.
        let Some(metadata) = state.source.metadata(entry.id) else {
            continue;
        };
        for info in &metadata.files {
            if !is_video_file(&info.path) {
                continue;
            }
            let downloaded = state
                .source
                .file_bytes_completed(entry.id, &info.path)
                .unwrap_or(0);
            videos.push(json!({
                "hash": entry.id,
                "torrent_name": metadata.name,
                "file_name": info.path,
                "file_size": info.length,
                "downloaded": downloaded,
                "progress": progress_percent(downloaded, info.length),
                "playable": is_playable(downloaded, info.length),
                "status": entry.state.label(),
            }));
        }
    }

    Json(json!({ "downloading_videos": videos }))
}

/// `GET /torrent/{id}/files` - per-file progress for one job, with a
/// stricter leading-window playability check.
pub async fn job_files(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(job) = JobId::from_hex(&id) else {
        return json_error(StatusCode::NOT_FOUND, "download task not found");
    };

    let metadata = match state
        .source
        .resolve_metadata(job, state.config.source.file_list_timeout)
        .await
    {
        Ok(metadata) => metadata,
        Err(error) => return json_error(StatusCode::NOT_FOUND, &error.to_string()),
    };

    let mut files = Vec::new();
    for info in &metadata.files {
        let downloaded = state
            .source
            .file_bytes_completed(job, &info.path)
            .unwrap_or(0);
        // Playable here means the leading window is fully assembled, not
        // just that enough bytes exist somewhere in the file.
        let window = info.length.min(1024 * 1024);
        let playable = SourceFile::from_info(state.source.clone(), job, info.clone())
            .map(|file| file.is_range_available(0, window))
            .unwrap_or(false);
        files.push(json!({
            "path": info.path,
            "size": info.length,
            "downloaded": downloaded,
            "progress": progress_percent(downloaded, info.length),
            "is_video": is_video_file(&info.path),
            "playable": playable,
        }));
    }

    Json(json!({ "hash": id, "files": files })).into_response()
}
