//! Per-file facade over a content source.
//!
//! A [`SourceFile`] binds one `(job, file)` pair and presents the
//! file-relative view the streaming path works in: length, range
//! availability, priority hints, and byte reads. File offsets are
//! translated into the job's absolute piece space here and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::{ContentSource, JobId, PieceIndex, PiecePriority, SourceError, SourceFileInfo};
use crate::streaming::range::{PieceSpan, piece_span};

/// File-like handle into a job's partially assembled byte space.
#[derive(Clone)]
pub struct SourceFile {
    source: Arc<dyn ContentSource>,
    job: JobId,
    info: SourceFileInfo,
    piece_length: u64,
    num_pieces: u64,
}

impl SourceFile {
    /// Opens a handle to `path` inside `job`, waiting up to `timeout` for
    /// the job's metadata to resolve.
    ///
    /// # Errors
    ///
    /// - `SourceError::JobNotFound` / `SourceError::MetadataTimeout`
    /// - `SourceError::FileNotFound` - Path not in the job's file list
    pub async fn open(
        source: Arc<dyn ContentSource>,
        job: JobId,
        path: &str,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let metadata = source.resolve_metadata(job, timeout).await?;
        let info = metadata
            .file(path)
            .cloned()
            .ok_or_else(|| SourceError::FileNotFound {
                path: path.to_string(),
            })?;
        Self::from_info(source, job, info)
    }

    /// Builds a handle from an already-resolved file entry, avoiding a
    /// second metadata wait when the caller holds the job's file list.
    ///
    /// # Errors
    ///
    /// - `SourceError::JobNotFound` - Job dropped since the list resolved
    pub fn from_info(
        source: Arc<dyn ContentSource>,
        job: JobId,
        info: SourceFileInfo,
    ) -> Result<Self, SourceError> {
        let piece_length = source.piece_length(job)?;
        let num_pieces = source.num_pieces(job)?;
        Ok(Self {
            source,
            job,
            info,
            piece_length,
            num_pieces,
        })
    }

    /// Job this file belongs to.
    pub fn job(&self) -> JobId {
        self.job
    }

    /// Job-relative path of the file.
    pub fn path(&self) -> &str {
        &self.info.path
    }

    /// Total file length in bytes.
    pub fn length(&self) -> u64 {
        self.info.length
    }

    /// Bytes of this file acquired so far.
    ///
    /// # Errors
    ///
    /// - `SourceError::JobNotFound` - Job dropped by the backend
    pub fn bytes_completed(&self) -> Result<u64, SourceError> {
        self.source.file_bytes_completed(self.job, &self.info.path)
    }

    /// Piece span covering `length` bytes at file-relative `offset`.
    pub fn span(&self, offset: u64, length: u64) -> PieceSpan {
        piece_span(
            self.info.offset + offset,
            length,
            self.piece_length,
            self.num_pieces,
        )
    }

    /// First incomplete piece in the span, or `None` when the whole span
    /// is available.
    pub fn first_incomplete_piece(&self, offset: u64, length: u64) -> Option<PieceIndex> {
        self.span(offset, length)
            .indices()
            .map(PieceIndex::new)
            .find(|&piece| !self.source.is_piece_complete(self.job, piece))
    }

    /// Whether every piece covering the span is complete.
    pub fn is_range_available(&self, offset: u64, length: u64) -> bool {
        if length == 0 {
            return true;
        }
        self.first_incomplete_piece(offset, length).is_none()
    }

    /// Raises the fetch priority of a single piece.
    pub fn prioritize_piece(&self, piece: PieceIndex) {
        self.source
            .set_piece_priority(self.job, piece, PiecePriority::High);
    }

    /// Raises the fetch priority of every incomplete piece covering the
    /// span. Used to preload playback windows ahead of the stream cursor.
    pub fn prioritize_range(&self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }
        for index in self.span(offset, length).indices() {
            let piece = PieceIndex::new(index);
            if !self.source.is_piece_complete(self.job, piece) {
                self.prioritize_piece(piece);
            }
        }
    }

    /// Reads up to `length` bytes at file-relative `offset`. Short reads
    /// occur only at EOF; the caller ensures availability first.
    ///
    /// # Errors
    ///
    /// - `SourceError::ReadOutOfBounds` - Offset past EOF
    /// - `SourceError::JobNotFound` / `SourceError::FileNotFound`
    pub async fn read_at(&self, offset: u64, length: usize) -> Result<Bytes, SourceError> {
        self.source
            .read_file_at(self.job, &self.info.path, offset, length)
            .await
    }
}
