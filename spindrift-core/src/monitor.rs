//! Background job monitor.
//!
//! One lightweight task per acquisition job: a bounded wait for metadata,
//! then a periodic tick that republishes the backend's completed-byte
//! counter into the registry until the job finishes or is terminalized
//! elsewhere (cancel, remove).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::registry::{DownloadRegistry, JobState};
use crate::source::{ContentSource, JobId, SourceError};

/// Spawns the monitor task for a freshly added job.
///
/// The job must already be registered. The task owns all writes to the
/// entry besides cancel/remove.
pub fn spawn_job_monitor(
    registry: Arc<DownloadRegistry>,
    source: Arc<dyn ContentSource>,
    job: JobId,
    config: SourceConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_monitor(registry, source, job, config).await;
    })
}

async fn run_monitor(
    registry: Arc<DownloadRegistry>,
    source: Arc<dyn ContentSource>,
    job: JobId,
    config: SourceConfig,
) {
    registry.mark_metadata_pending(job);

    let metadata = match source.resolve_metadata(job, config.metadata_timeout).await {
        Ok(metadata) => metadata,
        Err(SourceError::MetadataTimeout { .. }) => {
            warn!(%job, timeout = ?config.metadata_timeout, "metadata never resolved");
            registry.mark_timed_out(job);
            return;
        }
        Err(error) => {
            warn!(%job, %error, "metadata resolution failed");
            registry.mark_timed_out(job);
            return;
        }
    };

    info!(%job, name = %metadata.name, files = metadata.files.len(), total = metadata.total_bytes, "metadata resolved");
    registry.begin_downloading(job, metadata.name, metadata.total_bytes);

    let mut ticker = tokio::time::interval(config.progress_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First interval tick fires immediately; skip it so deltas span a
    // full interval.
    ticker.tick().await;

    let mut last_downloaded = 0u64;
    loop {
        ticker.tick().await;

        // Stop quietly once the entry is gone or was terminalized by a
        // cancel/remove request.
        let entry = match registry.snapshot(job) {
            Some(entry) if entry.state == JobState::Downloading => entry,
            _ => return,
        };

        let downloaded = match source.bytes_completed(job) {
            Ok(downloaded) => downloaded,
            Err(error) => {
                warn!(%job, %error, "progress read failed");
                return;
            }
        };

        let speed = downloaded.saturating_sub(last_downloaded)
            / config.progress_interval.as_secs().max(1);
        last_downloaded = downloaded;
        registry.record_progress(job, downloaded, speed);

        if metadata.total_bytes > 0 && downloaded >= metadata.total_bytes {
            registry.mark_completed(job);
            info!(%job, name = %entry.display_name, "download completed");
            return;
        }
    }
}
