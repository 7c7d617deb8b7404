//! In-memory content source for simulation environments.
//!
//! Stores job bytes and per-piece completion flags in memory so tests
//! and the development server can drive the streaming path without a
//! real acquisition backend. Piece completion is either controlled
//! explicitly by the harness or advanced on a timer by an
//! [`AssemblyProfile`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use sha1::{Digest, Sha1};
use spindrift_core::source::{
    ContentSource, JobId, JobMetadata, PieceIndex, PiecePriority, SourceError, SourceFileInfo,
};
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Timing profile for automatic job assembly.
///
/// When attached to an [`InMemorySource`], every ingested magnet or
/// torrent file spawns a background task that resolves synthetic
/// metadata after `metadata_delay` and then completes one piece every
/// `piece_interval`, preferring pieces the streaming path has flagged
/// high priority.
#[derive(Debug, Clone)]
pub struct AssemblyProfile {
    /// Delay before a pending job's metadata resolves.
    pub metadata_delay: Duration,
    /// Interval between piece completions.
    pub piece_interval: Duration,
    /// Total size of the synthetic content generated per job.
    pub content_bytes: u64,
    /// Piece length of the synthetic content.
    pub piece_length: u64,
}

impl Default for AssemblyProfile {
    fn default() -> Self {
        Self {
            metadata_delay: Duration::from_millis(500),
            piece_interval: Duration::from_millis(50),
            content_bytes: 64 * 1024 * 1024,
            piece_length: 256 * 1024,
        }
    }
}

struct SimJob {
    name: String,
    piece_length: u64,
    data: Bytes,
    files: Vec<SourceFileInfo>,
    complete: Vec<bool>,
    high_priority: Vec<u64>,
    metadata_ready: bool,
}

impl SimJob {
    fn pending(name: String) -> Self {
        Self {
            name,
            piece_length: 0,
            data: Bytes::new(),
            files: Vec::new(),
            complete: Vec::new(),
            high_priority: Vec::new(),
            metadata_ready: false,
        }
    }

    fn num_pieces(&self) -> u64 {
        let total = self.data.len() as u64;
        if total == 0 {
            return 0;
        }
        total.div_ceil(self.piece_length)
    }

    fn piece_byte_len(&self, piece: u64) -> u64 {
        let total = self.data.len() as u64;
        let start = piece * self.piece_length;
        self.piece_length.min(total.saturating_sub(start))
    }

    fn metadata(&self) -> JobMetadata {
        JobMetadata {
            name: self.name.clone(),
            total_bytes: self.data.len() as u64,
            files: self.files.clone(),
        }
    }
}

struct Inner {
    jobs: RwLock<HashMap<JobId, SimJob>>,
    metadata_changed: Notify,
    assembly: Option<AssemblyProfile>,
}

/// In-memory [`ContentSource`] with harness-controlled piece state.
///
/// Cheap to clone; all clones share the same job table.
#[derive(Clone)]
pub struct InMemorySource {
    inner: Arc<Inner>,
}

impl InMemorySource {
    /// Creates an empty source whose piece state only changes through
    /// explicit harness calls.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                metadata_changed: Notify::new(),
                assembly: None,
            }),
        }
    }

    /// Creates a source that assembles ingested jobs automatically
    /// according to `profile`.
    pub fn with_auto_assembly(profile: AssemblyProfile) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                metadata_changed: Notify::new(),
                assembly: Some(profile),
            }),
        }
    }

    /// Adds a fully seeded job: metadata resolved, every piece complete.
    ///
    /// Files are laid out back to back in the job's byte space in the
    /// order given. The job id is the SHA-1 of the concatenated content.
    pub fn add_content<I, P>(&self, name: &str, piece_length: u64, files: I) -> JobId
    where
        I: IntoIterator<Item = (P, Bytes)>,
        P: Into<String>,
    {
        let mut data = Vec::new();
        let mut infos = Vec::new();
        for (path, content) in files {
            infos.push(SourceFileInfo {
                path: path.into(),
                offset: data.len() as u64,
                length: content.len() as u64,
            });
            data.extend_from_slice(&content);
        }
        let job = fingerprint(&data);
        let data = Bytes::from(data);
        let num_pieces = (data.len() as u64).div_ceil(piece_length);
        let record = SimJob {
            name: name.to_string(),
            piece_length,
            data,
            files: infos,
            complete: vec![true; num_pieces as usize],
            high_priority: Vec::new(),
            metadata_ready: true,
        };
        self.inner.jobs.write().insert(job, record);
        self.inner.metadata_changed.notify_waiters();
        job
    }

    /// Adds a job whose metadata never resolves on its own. Used to
    /// exercise metadata timeouts; pair with [`Self::attach_files`] to
    /// resolve it later.
    pub fn add_pending(&self, name: &str) -> JobId {
        let job = fingerprint(name.as_bytes());
        self.inner
            .jobs
            .write()
            .insert(job, SimJob::pending(name.to_string()));
        job
    }

    /// Resolves a pending job's metadata with the given content, all
    /// pieces incomplete. Wakes any `resolve_metadata` waiters.
    pub fn attach_files<I, P>(&self, job: JobId, piece_length: u64, files: I)
    where
        I: IntoIterator<Item = (P, Bytes)>,
        P: Into<String>,
    {
        let mut data = Vec::new();
        let mut infos = Vec::new();
        for (path, content) in files {
            infos.push(SourceFileInfo {
                path: path.into(),
                offset: data.len() as u64,
                length: content.len() as u64,
            });
            data.extend_from_slice(&content);
        }
        let num_pieces = (data.len() as u64).div_ceil(piece_length);
        let mut jobs = self.inner.jobs.write();
        if let Some(record) = jobs.get_mut(&job) {
            record.piece_length = piece_length;
            record.data = Bytes::from(data);
            record.files = infos;
            record.complete = vec![false; num_pieces as usize];
            record.metadata_ready = true;
        }
        drop(jobs);
        self.inner.metadata_changed.notify_waiters();
    }

    /// Sets one piece's completion flag.
    pub fn set_piece_complete(&self, job: JobId, piece: u64, complete: bool) {
        let mut jobs = self.inner.jobs.write();
        if let Some(record) = jobs.get_mut(&job)
            && let Some(flag) = record.complete.get_mut(piece as usize)
        {
            *flag = complete;
        }
    }

    /// Marks every piece of the job complete.
    pub fn complete_all(&self, job: JobId) {
        let mut jobs = self.inner.jobs.write();
        if let Some(record) = jobs.get_mut(&job) {
            record.complete.fill(true);
        }
    }

    /// Piece indices flagged high priority so far, in hint order.
    pub fn high_priority_hints(&self, job: JobId) -> Vec<u64> {
        self.inner
            .jobs
            .read()
            .get(&job)
            .map(|record| record.high_priority.clone())
            .unwrap_or_default()
    }

    fn ingest(&self, job: JobId, name: String) -> JobId {
        {
            let mut jobs = self.inner.jobs.write();
            jobs.entry(job).or_insert_with(|| SimJob::pending(name));
        }
        if let Some(profile) = self.inner.assembly.clone() {
            let source = self.clone();
            tokio::spawn(async move {
                source.run_assembly(job, profile).await;
            });
        }
        job
    }

    /// Resolves synthetic metadata for a pending job, then completes
    /// pieces on a timer until the job finishes or is removed.
    async fn run_assembly(&self, job: JobId, profile: AssemblyProfile) {
        tokio::time::sleep(profile.metadata_delay).await;
        {
            let mut jobs = self.inner.jobs.write();
            let Some(record) = jobs.get_mut(&job) else {
                return;
            };
            if !record.metadata_ready {
                let data = synthetic_content(job, profile.content_bytes);
                let file_name = format!("{}.mp4", record.name);
                record.files = vec![SourceFileInfo {
                    path: file_name,
                    offset: 0,
                    length: data.len() as u64,
                }];
                record.piece_length = profile.piece_length;
                record.complete = vec![false; data.len().div_ceil(profile.piece_length as usize)];
                record.data = data;
                record.metadata_ready = true;
            }
        }
        self.inner.metadata_changed.notify_waiters();
        debug!(%job, "simulated metadata resolved");

        loop {
            tokio::time::sleep(profile.piece_interval).await;
            let mut jobs = self.inner.jobs.write();
            let Some(record) = jobs.get_mut(&job) else {
                return;
            };
            // High-priority hints jump the queue, matching how a real
            // backend reorders its fetch schedule.
            let next = record
                .high_priority
                .iter()
                .copied()
                .find(|&index| !record.complete[index as usize])
                .or_else(|| {
                    record
                        .complete
                        .iter()
                        .position(|done| !done)
                        .map(|index| index as u64)
                });
            match next {
                Some(index) => {
                    record.complete[index as usize] = true;
                    trace!(%job, piece = index, "simulated piece complete");
                }
                None => return,
            }
        }
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for InMemorySource {
    async fn add_magnet(&self, magnet_url: &str) -> Result<JobId, SourceError> {
        let parsed = url::Url::parse(magnet_url).map_err(|_| SourceError::InvalidIngest {
            reason: format!("not a valid URL: {magnet_url}"),
        })?;
        if parsed.scheme() != "magnet" {
            return Err(SourceError::InvalidIngest {
                reason: format!("unsupported scheme: {}", parsed.scheme()),
            });
        }

        let mut job = None;
        let mut name = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "xt" => {
                    if let Some(hash) = value.strip_prefix("urn:btih:")
                        && let Ok(id) = JobId::from_hex(hash)
                    {
                        job = Some(id);
                    }
                }
                "dn" => name = Some(value.into_owned()),
                _ => {}
            }
        }

        let job = job.unwrap_or_else(|| fingerprint(magnet_url.as_bytes()));
        let name = name.unwrap_or_else(|| format!("download-{}", &job.to_string()[..8]));
        Ok(self.ingest(job, name))
    }

    async fn add_torrent_file(&self, path: &Path) -> Result<JobId, SourceError> {
        let contents = tokio::fs::read(path).await?;
        let job = fingerprint(&contents);
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("download-{}", &job.to_string()[..8]));
        Ok(self.ingest(job, name))
    }

    async fn resolve_metadata(
        &self,
        job: JobId,
        timeout: Duration,
    ) -> Result<JobMetadata, SourceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.metadata_changed.notified();
            tokio::pin!(notified);
            // Register before checking state so a notification between
            // the check and the await is not lost.
            notified.as_mut().enable();
            {
                let jobs = self.inner.jobs.read();
                let record = jobs.get(&job).ok_or(SourceError::JobNotFound { job })?;
                if record.metadata_ready {
                    return Ok(record.metadata());
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(SourceError::MetadataTimeout { job, timeout });
            }
        }
    }

    fn metadata(&self, job: JobId) -> Option<JobMetadata> {
        let jobs = self.inner.jobs.read();
        jobs.get(&job)
            .filter(|record| record.metadata_ready)
            .map(SimJob::metadata)
    }

    fn piece_length(&self, job: JobId) -> Result<u64, SourceError> {
        let jobs = self.inner.jobs.read();
        let record = jobs.get(&job).ok_or(SourceError::JobNotFound { job })?;
        Ok(record.piece_length)
    }

    fn num_pieces(&self, job: JobId) -> Result<u64, SourceError> {
        let jobs = self.inner.jobs.read();
        let record = jobs.get(&job).ok_or(SourceError::JobNotFound { job })?;
        Ok(record.num_pieces())
    }

    fn is_piece_complete(&self, job: JobId, piece: PieceIndex) -> bool {
        let jobs = self.inner.jobs.read();
        jobs.get(&job)
            .and_then(|record| record.complete.get(piece.as_u64() as usize))
            .copied()
            .unwrap_or(false)
    }

    fn set_piece_priority(&self, job: JobId, piece: PieceIndex, priority: PiecePriority) {
        let mut jobs = self.inner.jobs.write();
        if let Some(record) = jobs.get_mut(&job)
            && priority == PiecePriority::High
            && !record.high_priority.contains(&piece.as_u64())
        {
            record.high_priority.push(piece.as_u64());
        }
    }

    fn bytes_completed(&self, job: JobId) -> Result<u64, SourceError> {
        let jobs = self.inner.jobs.read();
        let record = jobs.get(&job).ok_or(SourceError::JobNotFound { job })?;
        let done = (0..record.num_pieces())
            .filter(|&piece| record.complete[piece as usize])
            .map(|piece| record.piece_byte_len(piece))
            .sum();
        Ok(done)
    }

    fn file_bytes_completed(&self, job: JobId, path: &str) -> Result<u64, SourceError> {
        let jobs = self.inner.jobs.read();
        let record = jobs.get(&job).ok_or(SourceError::JobNotFound { job })?;
        let info = record
            .files
            .iter()
            .find(|file| file.path == path)
            .ok_or_else(|| SourceError::FileNotFound {
                path: path.to_string(),
            })?;
        let file_start = info.offset;
        let file_end = info.offset + info.length;
        let mut done = 0;
        for piece in 0..record.num_pieces() {
            if !record.complete[piece as usize] {
                continue;
            }
            let piece_start = piece * record.piece_length;
            let piece_end = piece_start + record.piece_byte_len(piece);
            let overlap_start = piece_start.max(file_start);
            let overlap_end = piece_end.min(file_end);
            if overlap_start < overlap_end {
                done += overlap_end - overlap_start;
            }
        }
        Ok(done)
    }

    async fn read_file_at(
        &self,
        job: JobId,
        path: &str,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, SourceError> {
        let jobs = self.inner.jobs.read();
        let record = jobs.get(&job).ok_or(SourceError::JobNotFound { job })?;
        let info = record
            .files
            .iter()
            .find(|file| file.path == path)
            .ok_or_else(|| SourceError::FileNotFound {
                path: path.to_string(),
            })?;
        if offset > info.length {
            return Err(SourceError::ReadOutOfBounds {
                offset,
                length,
                file_size: info.length,
            });
        }
        let available = (info.length - offset).min(length as u64);
        let start = (info.offset + offset) as usize;
        Ok(record.data.slice(start..start + available as usize))
    }

    fn remove(&self, job: JobId) -> Result<(), SourceError> {
        let removed = self.inner.jobs.write().remove(&job);
        // Wake metadata waiters so they observe the job is gone.
        self.inner.metadata_changed.notify_waiters();
        match removed {
            Some(_) => Ok(()),
            None => Err(SourceError::JobNotFound { job }),
        }
    }
}

fn fingerprint(data: &[u8]) -> JobId {
    let mut hasher = Sha1::new();
    hasher.update(data);
    JobId::new(hasher.finalize().into())
}

/// Deterministic filler bytes derived from the job id, so repeated runs
/// stream identical content.
fn synthetic_content(job: JobId, total_bytes: u64) -> Bytes {
    let seed = job.as_bytes();
    let mut data = Vec::with_capacity(total_bytes as usize);
    for index in 0..total_bytes {
        let byte = seed[(index % 20) as usize].wrapping_add((index / 20) as u8);
        data.push(byte);
    }
    Bytes::from(data)
}
