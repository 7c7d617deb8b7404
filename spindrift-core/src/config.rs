//! Centralized configuration for Spindrift.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Spindrift components.
///
/// Groups related settings into logical sections.
#[derive(Debug, Clone, Default)]
pub struct SpindriftConfig {
    pub streaming: StreamingConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
}

/// Streaming path configuration.
///
/// Controls chunk delivery, availability polling, and the preload windows
/// raised around playback positions.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Size of each chunk written to the client.
    pub chunk_size: usize,
    /// How long a stream waits for a byte span to become available.
    pub availability_timeout: Duration,
    /// Interval between availability re-checks.
    pub availability_poll_interval: Duration,
    /// Bytes prioritized at the head of a file when a stream opens.
    pub preload_bytes: u64,
    /// Window prioritized around a seek target.
    pub seek_preload_bytes: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 32 * 1024, // 32 KiB
            availability_timeout: Duration::from_secs(30),
            availability_poll_interval: Duration::from_millis(500),
            preload_bytes: 5 * 1024 * 1024,
            seek_preload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Content source and job monitoring configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Bound on waiting for a job's metadata to resolve in the background
    /// monitor. Expiry is terminal for the job.
    pub metadata_timeout: Duration,
    /// Shorter bound used when a request needs the file list inline.
    pub file_list_timeout: Duration,
    /// Interval of the progress monitor tick.
    pub progress_interval: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(30),
            file_list_timeout: Duration::from_secs(5),
            progress_interval: Duration::from_secs(5),
        }
    }
}

/// On-disk layout for resident files and uploads.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of fully resident (already downloaded) files.
    pub download_dir: PathBuf,
    /// Where uploaded `.torrent` files are saved before ingestion.
    pub upload_dir: PathBuf,
    /// Static web assets.
    pub static_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
        }
    }
}
