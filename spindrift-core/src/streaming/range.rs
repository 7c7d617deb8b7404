//! HTTP Range header parsing and piece-span arithmetic.
//!
//! Implements the subset of RFC 7233 the streaming path accepts:
//! `bytes=<start>-<end>` and `bytes=<start>-`. Suffix ranges
//! (`bytes=-<n>`) are not supported and parse as malformed.

/// A validated half-open byte interval, stored with an inclusive end.
///
/// Invariant: `0 <= start <= end < total`; a range is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// The implicit whole-file range used when no Range header is present.
    ///
    /// # Errors
    ///
    /// - `RangeError::Unsatisfiable` - Zero-length file
    pub fn full(total: u64) -> Result<Self, RangeError> {
        if total == 0 {
            return Err(RangeError::Unsatisfiable {
                start: 0,
                end: 0,
                total,
            });
        }
        Ok(Self {
            start: 0,
            end: total - 1,
            total,
        })
    }

    /// Number of bytes covered by the range.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Errors from Range header validation. Both map to HTTP 416.
#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("Malformed range header: {header}")]
    Malformed { header: String },

    #[error("Range {start}-{end} not satisfiable for size {total}")]
    Unsatisfiable { start: u64, end: u64, total: u64 },
}

fn parse_digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Parses a raw `Range` header value against a known total length.
///
/// - `bytes=<start>-<end>`: closed range; `end >= total` is clamped to
///   `total - 1` rather than rejected (common HTTP-range leniency).
/// - `bytes=<start>-`: open end, streams to EOF.
/// - Anything else (missing prefix, more or fewer than one `-`, empty or
///   non-digit start, suffix form) is malformed.
///
/// # Errors
///
/// - `RangeError::Malformed` - Header shape or digit validation failed
/// - `RangeError::Unsatisfiable` - `start > end` or `start >= total`
pub fn parse_range_header(header: &str, total: u64) -> Result<ByteRange, RangeError> {
    let malformed = || RangeError::Malformed {
        header: header.to_string(),
    };

    let spec = header.strip_prefix("bytes=").ok_or_else(malformed)?;
    let mut fields = spec.split('-');
    let (start_str, end_str) = match (fields.next(), fields.next(), fields.next()) {
        (Some(s), Some(e), None) => (s, e),
        _ => return Err(malformed()),
    };

    let start = parse_digits(start_str).ok_or_else(malformed)?;
    let end = if end_str.is_empty() {
        total.saturating_sub(1)
    } else {
        let end = parse_digits(end_str).ok_or_else(malformed)?;
        end.min(total.saturating_sub(1))
    };

    if start > end || start >= total {
        return Err(RangeError::Unsatisfiable { start, end, total });
    }

    Ok(ByteRange { start, end, total })
}

/// Inclusive span of piece indices covering a byte interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSpan {
    pub start_piece: u64,
    pub end_piece: u64,
}

impl PieceSpan {
    /// Iterates the indices in the span.
    pub fn indices(&self) -> impl Iterator<Item = u64> + use<> {
        self.start_piece..=self.end_piece
    }
}

/// Computes the piece span covering `length` bytes at `offset`.
///
/// Pure function of its inputs; the end is clamped against the final
/// (possibly short) piece. `length` must be non-zero.
pub fn piece_span(offset: u64, length: u64, piece_length: u64, num_pieces: u64) -> PieceSpan {
    debug_assert!(length > 0);
    debug_assert!(piece_length > 0);
    let last_piece = num_pieces.saturating_sub(1);
    let start_piece = (offset / piece_length).min(last_piece);
    let end_piece = ((offset + length - 1) / piece_length).min(last_piece);
    PieceSpan {
        start_piece,
        end_piece,
    }
}
