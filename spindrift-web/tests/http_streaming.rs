//! Router-level tests driving the HTTP surface against the in-memory
//! content source.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use spindrift_core::SpindriftConfig;
use spindrift_core::source::JobId;
use spindrift_sim::InMemorySource;
use spindrift_web::{AppState, router};
use tower::ServiceExt;

fn video_bytes(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

fn test_state(source: InMemorySource) -> AppState {
    AppState::new(Arc::new(source), SpindriftConfig::default())
}

fn app_for(state: &AppState) -> Router {
    router(state.clone())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_range(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

fn header_str<'a>(response: &'a axum::response::Response, name: header::HeaderName) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

/// Seeds a 1000-byte fully available video and registers its job.
fn seeded_video(state: &AppState, source: &InMemorySource) -> (JobId, Bytes) {
    let data = video_bytes(1000);
    let job = source.add_content("pack", 1024, [("video.mp4", data.clone())]);
    state.registry.insert(job);
    (job, data)
}

#[tokio::test]
async fn open_ended_range_returns_tail_as_partial_content() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let (job, data) = seeded_video(&state, &source);
    let app = app_for(&state);

    let response = app
        .oneshot(get_with_range(
            &format!("/stream/torrent/{job}/video.mp4"),
            "bytes=500-",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 500-999/1000"
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "500");
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), "bytes");
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "video/mp4");

    let body = body_bytes(response).await;
    assert_eq!(body, data.slice(500..1000));
}

#[tokio::test]
async fn range_past_eof_is_unsatisfiable_with_empty_body() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let (job, _) = seeded_video(&state, &source);
    let app = app_for(&state);

    let response = app
        .oneshot(get_with_range(
            &format!("/stream/torrent/{job}/video.mp4"),
            "bytes=2000-3000",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes */1000"
    );
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn missing_range_header_streams_whole_file_as_200() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let (job, data) = seeded_video(&state, &source);
    let app = app_for(&state);

    let response = app
        .oneshot(get(&format!("/stream/torrent/{job}/video.mp4")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "1000");
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn malformed_range_is_unsatisfiable() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let (job, _) = seeded_video(&state, &source);
    let app = app_for(&state);

    for bad in ["bytes=-500", "bytes=abc-", "bytes=10-20-30", "items=0-1"] {
        let response = app
            .clone()
            .oneshot(get_with_range(
                &format!("/stream/torrent/{job}/video.mp4"),
                bad,
            ))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::RANGE_NOT_SATISFIABLE,
            "header {bad:?}"
        );
    }
}

#[tokio::test]
async fn non_video_file_is_rejected() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let job = source.add_content("pack", 1024, [("notes.txt", video_bytes(100))]);
    state.registry.insert(job);
    let app = app_for(&state);

    let response = app
        .oneshot(get(&format!("/stream/torrent/{job}/notes.txt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let state = test_state(InMemorySource::new());
    let app = app_for(&state);

    let hash = "0".repeat(40);
    let response = app
        .oneshot(get(&format!("/stream/torrent/{hash}/video.mp4")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_delivers_bytes_as_pieces_arrive() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());

    let data = video_bytes(3000);
    let job = source.add_pending("pack");
    source.attach_files(job, 1024, [("video.mp4", data.clone())]);
    source.set_piece_complete(job, 0, true);
    state.registry.insert(job);

    // Remaining pieces arrive while the response body is being read.
    let completer = source.clone();
    tokio::spawn(async move {
        for piece in 1..3 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            completer.set_piece_complete(job, piece, true);
        }
    });

    let app = app_for(&state);
    let response = app
        .oneshot(get(&format!("/stream/torrent/{job}/video.mp4")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn seek_streams_prioritize_the_target_window() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());

    // 3 MiB file, 256 KiB pieces, nothing available yet.
    let data = video_bytes(3 * 1024 * 1024);
    let job = source.add_pending("pack");
    source.attach_files(job, 256 * 1024, [("video.mp4", data.clone())]);
    state.registry.insert(job);

    let completer = source.clone();
    tokio::spawn(async move {
        // Complete everything shortly after the request lands, once the
        // priority hints have been recorded.
        tokio::time::sleep(Duration::from_millis(100)).await;
        completer.complete_all(job);
    });

    let app = app_for(&state);
    let response = app
        .oneshot(get_with_range(
            &format!("/stream/torrent/{job}/video.mp4"),
            "bytes=2097152-",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, data.slice(2 * 1024 * 1024..));

    // Head preload plus the seek window around 2 MiB were both hinted.
    let hints = source.high_priority_hints(job);
    assert!(hints.contains(&0), "head piece hinted: {hints:?}");
    assert!(hints.contains(&8), "seek target piece hinted: {hints:?}");
}

#[tokio::test]
async fn status_reflects_registry_snapshot() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let (job, _) = seeded_video(&state, &source);
    let app = app_for(&state);

    let response = app.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(status["active_downloads"], 1);
    assert_eq!(status["torrents"][0]["hash"], job.to_string());
    assert_eq!(status["torrents"][0]["status"], "connecting");
}

#[tokio::test]
async fn cancel_and_remove_lifecycle() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());
    let (job, _) = seeded_video(&state, &source);
    let app = app_for(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/cancel/{job}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A second cancel hits the terminal-state guard.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/cancel/{job}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/remove/{job}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/remove/{job}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_unknown_job_is_not_found() {
    let state = test_state(InMemorySource::new());
    let app = app_for(&state);

    let hash = "f".repeat(40);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/cancel/{hash}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_job_id_is_not_found_on_cancel_and_remove() {
    let state = test_state(InMemorySource::new());
    let app = app_for(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cancel/not-a-hash")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/remove/not-a-hash")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn multipart_upload(file_name: &str, contents: &[u8]) -> Request<Body> {
    let boundary = "------------------------spindrift";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"torrent\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn upload_saves_torrent_and_tracks_the_job() {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = SpindriftConfig::default();
    config.storage.upload_dir = uploads.path().to_path_buf();
    let state = AppState::new(Arc::new(InMemorySource::new()), config);
    let app = app_for(&state);

    let contents = b"d8:announce0:e";
    let response = app
        .oneshot(multipart_upload("show.torrent", contents))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ack: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(ack["filename"], "show.torrent");
    assert_eq!(ack["size"], contents.len());

    let saved = std::fs::read(uploads.path().join("show.torrent")).unwrap();
    assert_eq!(saved, contents);

    // Ingestion is spawned; give it a beat, then the job must be tracked.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(state.registry.active_count(), 1);
}

#[tokio::test]
async fn upload_rejects_filename_escaping_the_upload_dir() {
    let root = tempfile::tempdir().unwrap();
    let uploads = root.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    let mut config = SpindriftConfig::default();
    config.storage.upload_dir = uploads.clone();
    let state = AppState::new(Arc::new(InMemorySource::new()), config);
    let app = app_for(&state);

    for file_name in ["../escaped.torrent", "/tmp/abs.torrent", "a/b.torrent"] {
        let response = app
            .clone()
            .oneshot(multipart_upload(file_name, b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{file_name}");
    }
    assert!(!root.path().join("escaped.torrent").exists());
    assert_eq!(state.registry.active_count(), 0);
}

#[tokio::test]
async fn job_file_listing_reports_leading_window_playability() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());

    // 4 MiB video, 256 KiB pieces: complete the first 2 MiB only.
    let job = source.add_pending("pack");
    source.attach_files(
        job,
        256 * 1024,
        [("video.mp4", video_bytes(4 * 1024 * 1024))],
    );
    for piece in 0..8 {
        source.set_piece_complete(job, piece, true);
    }
    state.registry.insert(job);
    let app = app_for(&state);

    let response = app
        .oneshot(get(&format!("/torrent/{job}/files")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listing: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let file = &listing["files"][0];
    assert_eq!(file["path"], "video.mp4");
    assert_eq!(file["is_video"], true);
    assert_eq!(file["downloaded"], 2 * 1024 * 1024);
    assert_eq!(file["playable"], true);
    assert_eq!(file["progress"], 50.0);
}

#[tokio::test]
async fn downloading_videos_lists_playable_files() {
    let source = InMemorySource::new();
    let state = test_state(source.clone());

    // 100 MiB video with 6 MiB done: over the 5 MiB absolute threshold.
    let job = source.add_pending("pack");
    source.attach_files(
        job,
        1024 * 1024,
        [("show/episode.mkv", video_bytes(100 * 1024 * 1024))],
    );
    for piece in 0..6 {
        source.set_piece_complete(job, piece, true);
    }
    state.registry.insert(job);
    let app = app_for(&state);

    let response = app.oneshot(get("/downloading-videos")).await.unwrap();
    let listing: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let video = &listing["downloading_videos"][0];
    assert_eq!(video["file_name"], "show/episode.mkv");
    assert_eq!(video["downloaded"], 6 * 1024 * 1024);
    assert_eq!(video["playable"], true);
}

#[tokio::test]
async fn download_requires_one_source_field() {
    let state = test_state(InMemorySource::new());
    let app = app_for(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn magnet_download_registers_a_job() {
    let state = test_state(InMemorySource::new());
    let app = app_for(&state);

    let hash = "c".repeat(40);
    let body = serde_json::json!({
        "magnet_url": format!("magnet:?xt=urn:btih:{hash}&dn=Show")
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ack: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(ack["type"], "magnet");

    // Ingestion is spawned; give it a beat, then the job must be tracked.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let job = JobId::from_hex(&hash).unwrap();
    assert!(state.registry.contains(job));
}

#[tokio::test]
async fn resident_file_streaming_and_deletion() {
    let downloads = tempfile::tempdir().unwrap();
    let data = video_bytes(1000);
    let nested = downloads.path().join("show");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("clip.mp4"), &data).unwrap();

    let mut config = SpindriftConfig::default();
    config.storage.download_dir = downloads.path().to_path_buf();
    let state = AppState::new(Arc::new(InMemorySource::new()), config);
    let app = app_for(&state);

    // Range semantics match the torrent path.
    let response = app
        .clone()
        .oneshot(get_with_range("/stream/show/clip.mp4", "bytes=500-"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 500-999/1000"
    );
    assert_eq!(body_bytes(response).await, data.slice(500..1000));

    // Listing sees the file.
    let response = app.clone().oneshot(get("/files")).await.unwrap();
    let listing: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(listing["files"][0]["path"], "show/clip.mp4");

    // Traversal attempts are rejected outright.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/delete-file")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"file_path":"../secret"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Deleting the file also sweeps its now-empty parent.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/delete-file")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"file_path":"show/clip.mp4"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!nested.exists());

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/delete-file")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"file_path":"show/clip.mp4"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn downloads_endpoint_serves_attachments() {
    let downloads = tempfile::tempdir().unwrap();
    let data = video_bytes(300);
    std::fs::write(downloads.path().join("archive.bin"), &data).unwrap();

    let mut config = SpindriftConfig::default();
    config.storage.download_dir = downloads.path().to_path_buf();
    let state = AppState::new(Arc::new(InMemorySource::new()), config);
    let app = app_for(&state);

    let response = app.oneshot(get("/downloads/archive.bin")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        "attachment; filename=\"archive.bin\""
    );
    assert_eq!(body_bytes(response).await, data);
}
