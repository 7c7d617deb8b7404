//! Video file detection and MIME types.
//!
//! The recognized-extension list is part of the HTTP contract: only these
//! extensions stream, everything else is served as a plain download.

use std::path::Path;

const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("webm", "video/webm"),
    ("m4v", "video/x-m4v"),
];

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Whether the filename carries a recognized video extension.
pub fn is_video_file(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| VIDEO_TYPES.iter().any(|(e, _)| *e == ext))
        .unwrap_or(false)
}

/// MIME type derived from the file extension.
pub fn content_type_for(filename: &str) -> &'static str {
    extension_of(filename)
        .and_then(|ext| {
            VIDEO_TYPES
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}
