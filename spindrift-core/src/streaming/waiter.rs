//! Availability wait-and-prioritize loop.
//!
//! Fixed-interval polling, not event-driven wake-up: the content source
//! contract has no completion-notification channel, so the waiter trades a
//! latency of at most one poll interval for a minimal capability set.
//! Callers that must abandon the wait early (client disconnect) race the
//! returned future against their cancellation signal; dropping it cancels
//! the in-flight sleep.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::StreamingConfig;
use crate::source::SourceFile;

/// Blocks a stream until a byte span is fully available, raising the
/// fetch priority of whatever piece is holding it up.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityWaiter {
    poll_interval: Duration,
    max_wait: Duration,
}

impl AvailabilityWaiter {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    pub fn from_config(config: &StreamingConfig) -> Self {
        Self::new(
            config.availability_poll_interval,
            config.availability_timeout,
        )
    }

    /// Waits until `length` bytes at file-relative `offset` are fully
    /// available, returning `false` once `max_wait` elapses first.
    ///
    /// Completeness is checked before the first sleep, so an
    /// already-available span returns without suspending. The blocking
    /// piece is re-prioritized on every iteration; the hint is idempotent
    /// and piece state can change between polls.
    pub async fn wait_for(&self, file: &SourceFile, offset: u64, length: u64) -> bool {
        let deadline = Instant::now() + self.max_wait;

        loop {
            match file.first_incomplete_piece(offset, length) {
                None => return true,
                Some(piece) => {
                    trace!(job = %file.job(), %piece, offset, "waiting for piece");
                    file.prioritize_piece(piece);
                }
            }

            if Instant::now() >= deadline {
                debug!(
                    job = %file.job(),
                    path = file.path(),
                    offset,
                    length,
                    "availability wait timed out"
                );
                return false;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
