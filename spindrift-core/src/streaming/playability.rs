//! Playability heuristic for partially downloaded files.
//!
//! A proxy for "enough of the file, likely including a usable header
//! region, is present" without inspecting container structure. Advisory
//! only: listings use it to mark files watchable, but the streaming path
//! always waits for real piece availability regardless.

/// Downloaded bytes past which a file is playable outright.
pub const PLAYABLE_BYTES_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Progress percentage past which a file is playable, given a floor of
/// downloaded bytes.
pub const PLAYABLE_PROGRESS_THRESHOLD: f64 = 5.0;

/// Minimum downloaded bytes for the progress-based clause.
pub const PLAYABLE_MIN_BYTES: u64 = 1024 * 1024;

/// Whether playback of a partially downloaded file can plausibly begin.
pub fn is_playable(downloaded_bytes: u64, file_size: u64) -> bool {
    if file_size == 0 {
        return false;
    }
    if downloaded_bytes >= PLAYABLE_BYTES_THRESHOLD {
        return true;
    }
    let progress = progress_percent(downloaded_bytes, file_size);
    progress >= PLAYABLE_PROGRESS_THRESHOLD && downloaded_bytes >= PLAYABLE_MIN_BYTES
}

/// Download progress as a percentage, clamped to 100 to absorb transient
/// overshoot from racy backend byte counters.
pub fn progress_percent(downloaded_bytes: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 0.0;
    }
    (downloaded_bytes as f64 / total_bytes as f64 * 100.0).min(100.0)
}
