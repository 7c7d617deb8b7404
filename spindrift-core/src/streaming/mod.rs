//! Progressive streaming pipeline.
//!
//! Range parsing, availability waiting, and chunked delivery are kept as
//! separate leaves so each is testable against a scripted content source.

pub mod playability;
pub mod range;
pub mod waiter;
pub mod writer;

pub use playability::{is_playable, progress_percent};
pub use range::{ByteRange, PieceSpan, RangeError, parse_range_header, piece_span};
pub use waiter::AvailabilityWaiter;
pub use writer::{ChannelSink, ChunkSink, StreamOutcome, stream_range};
