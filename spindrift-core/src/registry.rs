//! Shared registry of acquisition jobs and their status snapshots.
//!
//! The registry is an explicitly owned object handed by `Arc` to request
//! handlers and monitor tasks. One reader/writer lock guards the map and
//! is held only for the duration of a lookup or mutation, never across an
//! await. Each entry has a single writer (its monitor task); handlers read
//! snapshots or apply the cancel/remove transitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::source::JobId;
use crate::streaming::progress_percent;

/// Lifecycle of one acquisition job.
///
/// `Connecting → MetadataPending → Downloading → {Completed | Cancelled |
/// TimedOut}`. The three right-hand states are terminal; `TimedOut` is
/// surfaced to the operator via logs only, with no automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Connecting,
    MetadataPending,
    Downloading,
    Completed,
    Cancelled,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::TimedOut
        )
    }

    /// Status label used in JSON responses.
    pub fn label(self) -> &'static str {
        match self {
            JobState::Connecting => "connecting",
            JobState::MetadataPending => "metadata_pending",
            JobState::Downloading => "downloading",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::TimedOut => "timed_out",
        }
    }
}

/// Status snapshot of one acquisition job.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadEntry {
    pub id: JobId,
    /// Placeholder until metadata resolves, then the job's real name.
    pub display_name: String,
    pub state: JobState,
    /// Monotone non-decreasing; written only by the job's monitor.
    pub downloaded_bytes: u64,
    /// Zero until metadata resolves, then fixed.
    pub total_bytes: u64,
    /// Derived from monitor tick deltas.
    pub bytes_per_second: u64,
    pub added_at: DateTime<Utc>,
}

impl DownloadEntry {
    fn new(id: JobId) -> Self {
        Self {
            id,
            display_name: "resolving metadata...".to_string(),
            state: JobState::Connecting,
            downloaded_bytes: 0,
            total_bytes: 0,
            bytes_per_second: 0,
            added_at: Utc::now(),
        }
    }

    /// Progress percentage, clamped to 100.
    pub fn progress(&self) -> f64 {
        progress_percent(self.downloaded_bytes, self.total_bytes)
    }
}

/// Errors from registry transitions.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Job {job} not found")]
    NotFound { job: JobId },

    #[error("Job {job} already in terminal state {state:?}")]
    AlreadyTerminal { job: JobId, state: JobState },
}

/// Concurrent-safe map of in-flight acquisition jobs.
#[derive(Default)]
pub struct DownloadRegistry {
    entries: RwLock<HashMap<JobId, DownloadEntry>>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly added job in `Connecting` state. Re-adding an
    /// existing job leaves the current entry untouched.
    pub fn insert(&self, job: JobId) {
        self.entries
            .write()
            .entry(job)
            .or_insert_with(|| DownloadEntry::new(job));
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.entries.read().contains_key(&job)
    }

    /// Snapshot of one job.
    pub fn snapshot(&self, job: JobId) -> Option<DownloadEntry> {
        self.entries.read().get(&job).cloned()
    }

    /// Snapshot of every job, in unspecified order.
    pub fn snapshots(&self) -> Vec<DownloadEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Jobs not yet in a terminal state.
    pub fn active_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| !e.state.is_terminal())
            .count()
    }

    /// `Connecting → MetadataPending` once the job is accepted by the
    /// acquisition backend.
    pub fn mark_metadata_pending(&self, job: JobId) {
        if let Some(entry) = self.entries.write().get_mut(&job)
            && entry.state == JobState::Connecting
        {
            entry.state = JobState::MetadataPending;
        }
    }

    /// `MetadataPending → Downloading` once name and total length resolve.
    pub fn begin_downloading(&self, job: JobId, display_name: String, total_bytes: u64) {
        if let Some(entry) = self.entries.write().get_mut(&job)
            && !entry.state.is_terminal()
        {
            entry.display_name = display_name;
            entry.total_bytes = total_bytes;
            entry.state = JobState::Downloading;
        }
    }

    /// Records a monitor tick. Downloaded bytes are kept monotone against
    /// racy backend counters; speed is the caller's tick delta.
    pub fn record_progress(&self, job: JobId, downloaded_bytes: u64, bytes_per_second: u64) {
        if let Some(entry) = self.entries.write().get_mut(&job)
            && entry.state == JobState::Downloading
        {
            entry.downloaded_bytes = entry.downloaded_bytes.max(downloaded_bytes);
            entry.bytes_per_second = bytes_per_second;
        }
    }

    /// `Downloading → Completed`.
    pub fn mark_completed(&self, job: JobId) {
        if let Some(entry) = self.entries.write().get_mut(&job)
            && entry.state == JobState::Downloading
        {
            entry.downloaded_bytes = entry.total_bytes;
            entry.bytes_per_second = 0;
            entry.state = JobState::Completed;
        }
    }

    /// Metadata never resolved; terminal, no retry.
    pub fn mark_timed_out(&self, job: JobId) {
        if let Some(entry) = self.entries.write().get_mut(&job)
            && !entry.state.is_terminal()
        {
            entry.state = JobState::TimedOut;
        }
    }

    /// Explicit cancel. Rejected for unknown jobs and terminal states.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` / `RegistryError::AlreadyTerminal`
    pub fn cancel(&self, job: JobId) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&job)
            .ok_or(RegistryError::NotFound { job })?;
        if entry.state.is_terminal() {
            return Err(RegistryError::AlreadyTerminal {
                job,
                state: entry.state,
            });
        }
        entry.state = JobState::Cancelled;
        entry.bytes_per_second = 0;
        Ok(())
    }

    /// Drops the entry entirely.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` - Unknown job
    pub fn remove(&self, job: JobId) -> Result<DownloadEntry, RegistryError> {
        self.entries
            .write()
            .remove(&job)
            .ok_or(RegistryError::NotFound { job })
    }
}
