//! Chunked delivery of a byte range to a client sink.
//!
//! One writer loop per in-flight stream: wait for the next chunk's span,
//! read it, hand it to the sink, advance. No buffering beyond the chunk in
//! flight, so the client sees bytes as soon as they are produced and
//! playback can begin before the file finishes downloading.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::range::ByteRange;
use super::waiter::AvailabilityWaiter;
use crate::config::StreamingConfig;
use crate::source::SourceFile;

/// Outcome of a writer loop, for logging and tests. The HTTP response is
/// already in flight whatever the outcome; nothing here reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every byte of the range was delivered.
    Completed,
    /// The client went away; normal termination, not an error.
    Disconnected,
    /// A chunk's span never became available within the wait bound.
    AvailabilityTimeout,
    /// The source failed mid-stream.
    ReadFailed,
}

/// Destination for stream chunks.
///
/// Delivery order is the only ordering guarantee a client gets, so a sink
/// must forward chunks in the order received.
#[async_trait]
pub trait ChunkSink: Send {
    /// Hands one chunk to the client. Returns `false` when the client has
    /// gone away; the stream stops silently.
    async fn deliver(&mut self, chunk: Bytes) -> bool;

    /// Resolves when the client is gone. Raced against availability waits
    /// so a disconnected client does not pin the task for the full bound.
    async fn closed(&self);
}

/// Sink backed by a bounded channel whose receiving half feeds the HTTP
/// response body. Capacity of one keeps exactly one chunk in flight.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

impl ChannelSink {
    /// Creates the sink and the receiver to build the response body from.
    pub fn new() -> (Self, mpsc::Receiver<Result<Bytes, std::io::Error>>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn deliver(&mut self, chunk: Bytes) -> bool {
        self.tx.send(Ok(chunk)).await.is_ok()
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Streams `range` from `file` into `sink` in fixed-size chunks.
///
/// Chunks are delivered strictly in increasing offset order. Each chunk's
/// span is waited for (and prioritized) before reading; a wait timeout or
/// read failure aborts the stream, leaving already-sent bytes sent - HTTP
/// responses cannot be un-sent once headers are flushed. Disconnects are
/// detected between chunks and during waits.
pub async fn stream_range<S: ChunkSink>(
    file: &SourceFile,
    range: ByteRange,
    sink: &mut S,
    config: &StreamingConfig,
) -> StreamOutcome {
    let waiter = AvailabilityWaiter::from_config(config);
    let mut cursor = range.start;

    while cursor <= range.end {
        let want = (range.end - cursor + 1).min(config.chunk_size as u64);

        // Racing against closed() cancels the waiter's sleep, so a
        // disconnected client stops pinning the task mid-wait.
        let available = tokio::select! {
            available = waiter.wait_for(file, cursor, want) => available,
            _ = sink.closed() => {
                debug!(job = %file.job(), path = file.path(), "client gone during wait");
                return StreamOutcome::Disconnected;
            }
        };
        if !available {
            return StreamOutcome::AvailabilityTimeout;
        }

        let chunk = match file.read_at(cursor, want as usize).await {
            Ok(chunk) => chunk,
            Err(error) => {
                warn!(
                    job = %file.job(),
                    path = file.path(),
                    offset = cursor,
                    %error,
                    "read failed mid-stream"
                );
                return StreamOutcome::ReadFailed;
            }
        };
        if chunk.is_empty() {
            return StreamOutcome::Completed;
        }

        let written = chunk.len() as u64;
        if !sink.deliver(chunk).await {
            debug!(job = %file.job(), path = file.path(), "client disconnected");
            return StreamOutcome::Disconnected;
        }
        cursor += written;
    }

    StreamOutcome::Completed
}
