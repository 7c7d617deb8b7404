//! Content source abstraction for incremental acquisition backends.
//!
//! The engine never talks to peers, verifies pieces, or lays out bytes on
//! disk. It consumes those capabilities through the [`ContentSource`]
//! trait: total length, per-piece completion state, an advisory priority
//! hint, and a readable cursor over the assembled byte range.

pub mod file;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

pub use file::SourceFile;

/// 20-byte content fingerprint identifying one acquisition job.
///
/// Immutable once assigned by the backend. Displayed and parsed as 40
/// hex characters in URLs and JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId([u8; 20]);

impl JobId {
    /// Creates JobId from a 20-byte fingerprint.
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns reference to the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40-character hex string.
    ///
    /// # Errors
    ///
    /// - `SourceError::InvalidJobId` - Wrong length or non-hex characters
    pub fn from_hex(s: &str) -> Result<Self, SourceError> {
        let decoded = hex::decode(s).map_err(|_| SourceError::InvalidJobId {
            value: s.to_string(),
        })?;
        let bytes: [u8; 20] = decoded.try_into().map_err(|_| SourceError::InvalidJobId {
            value: s.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for JobId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Zero-based index of a piece within a job's byte space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceIndex(pub u64);

impl PieceIndex {
    /// Creates PieceIndex from zero-based index.
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Advisory fetch priority for a piece.
///
/// A hint to the backend scheduler, not a guarantee of immediacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PiecePriority {
    Normal,
    High,
}

/// One file inside a job, located by its byte offset within the job's
/// contiguous piece space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileInfo {
    /// Path of the file relative to the job root, `/`-separated.
    pub path: String,
    /// Byte offset of the file within the job.
    pub offset: u64,
    /// File length in bytes.
    pub length: u64,
}

/// Resolved metadata for a job: display name, total size, file list.
#[derive(Debug, Clone)]
pub struct JobMetadata {
    pub name: String,
    pub total_bytes: u64,
    pub files: Vec<SourceFileInfo>,
}

impl JobMetadata {
    /// Finds a file by its job-relative path.
    pub fn file(&self, path: &str) -> Option<&SourceFileInfo> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Errors reported by a content source backend.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Job {job} not found")]
    JobNotFound { job: JobId },

    #[error("Invalid job id: {value}")]
    InvalidJobId { value: String },

    #[error("File not found in job: {path}")]
    FileNotFound { path: String },

    #[error("Metadata for job {job} did not resolve within {timeout:?}")]
    MetadataTimeout { job: JobId, timeout: Duration },

    #[error("Read of {length} bytes at {offset} exceeds file size {file_size}")]
    ReadOutOfBounds {
        offset: u64,
        length: usize,
        file_size: u64,
    },

    #[error("Invalid ingest source: {reason}")]
    InvalidIngest { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability set required of any backing acquisition engine.
///
/// Piece state is job-global; files map into the job's byte space via
/// their [`SourceFileInfo::offset`]. Synchronous methods must not block;
/// they answer from the backend's current view.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Starts acquiring content described by a magnet URL. Returns the job
    /// id immediately; metadata resolves later.
    async fn add_magnet(&self, magnet_url: &str) -> Result<JobId, SourceError>;

    /// Starts acquiring content described by an on-disk `.torrent` file.
    async fn add_torrent_file(&self, path: &Path) -> Result<JobId, SourceError>;

    /// Waits until the job's metadata (name, length, file list) resolves,
    /// bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// - `SourceError::JobNotFound` - Unknown job
    /// - `SourceError::MetadataTimeout` - Metadata did not resolve in time
    async fn resolve_metadata(
        &self,
        job: JobId,
        timeout: Duration,
    ) -> Result<JobMetadata, SourceError>;

    /// Returns metadata if already resolved, without waiting.
    fn metadata(&self, job: JobId) -> Option<JobMetadata>;

    /// Fixed granularity at which availability is tracked.
    fn piece_length(&self, job: JobId) -> Result<u64, SourceError>;

    /// Number of pieces in the job (the last piece may be short).
    fn num_pieces(&self, job: JobId) -> Result<u64, SourceError>;

    /// Whether a piece has been fully acquired and verified.
    fn is_piece_complete(&self, job: JobId, piece: PieceIndex) -> bool;

    /// Asks the backend to fetch a piece sooner. Advisory and idempotent;
    /// safe to call repeatedly for the same piece.
    fn set_piece_priority(&self, job: JobId, piece: PieceIndex, priority: PiecePriority);

    /// Bytes acquired across the whole job.
    fn bytes_completed(&self, job: JobId) -> Result<u64, SourceError>;

    /// Bytes acquired within one file of the job.
    fn file_bytes_completed(&self, job: JobId, path: &str) -> Result<u64, SourceError>;

    /// Reads bytes from a file's assembled byte range. May return fewer
    /// bytes than requested only at EOF. The caller guarantees the range
    /// is available before calling; this must not block on completeness.
    ///
    /// # Errors
    ///
    /// - `SourceError::JobNotFound` / `SourceError::FileNotFound`
    /// - `SourceError::ReadOutOfBounds` - Offset past EOF
    async fn read_file_at(
        &self,
        job: JobId,
        path: &str,
        offset: u64,
        length: usize,
    ) -> Result<bytes::Bytes, SourceError>;

    /// Stops acquisition and drops the backend's state for the job.
    fn remove(&self, job: JobId) -> Result<(), SourceError>;
}
