//! Spindrift Core - progressive range-streaming engine
//!
//! Provides the building blocks for serving HTTP byte ranges out of media
//! files that a background acquisition backend is still assembling:
//! the `ContentSource` capability trait, Range header parsing, the
//! availability wait-and-prioritize loop, chunked delivery, and the
//! download registry shared with the web layer.

pub mod config;
pub mod monitor;
pub mod registry;
pub mod source;
pub mod streaming;
pub mod tracing_setup;
pub mod video;

// Re-export main types for convenient access
pub use config::SpindriftConfig;
pub use monitor::spawn_job_monitor;
pub use registry::{DownloadEntry, DownloadRegistry, JobState, RegistryError};
pub use source::{
    ContentSource, JobId, JobMetadata, PieceIndex, PiecePriority, SourceError, SourceFile,
    SourceFileInfo,
};
pub use streaming::{AvailabilityWaiter, ByteRange, RangeError, StreamOutcome};

/// Errors that can bubble up from any Spindrift subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SpindriftError {
    #[error("Content source error: {0}")]
    Source(#[from] SourceError),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

pub type Result<T> = std::result::Result<T, SpindriftError>;
