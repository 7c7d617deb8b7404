//! HTTP request handlers organized by functionality.

pub mod api;
pub mod streaming;
pub mod utils;

pub use api::{
    DeleteFileRequest, DownloadRequest, cancel_download, delete_file, download_file,
    download_status, list_files, remove_download, start_download, upload_torrent,
};
pub use streaming::{downloading_videos, job_files, stream};
