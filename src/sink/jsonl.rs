//! Append-only JSON Lines sink.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{ResultSink, SinkError};
use crate::pipeline::PipelineResult;

/// Counts reported when a sink is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkTotals {
    /// Records written to the file.
    pub saved: usize,
    /// Records handed to [`ResultSink::save`].
    pub processed: usize,
}

struct SinkState {
    file: File,
    buffer: Vec<String>,
    saved: usize,
    processed: usize,
}

/// Lock-guarded JSON Lines writer.
///
/// One mutex guards both the buffer and the file handle, so concurrent
/// `save` calls never interleave partial records. The buffer is written out
/// with a single `write_all` whenever it reaches `batch_size`.
pub struct JsonlSink {
    path: PathBuf,
    batch_size: usize,
    state: Mutex<SinkState>,
}

impl JsonlSink {
    /// Open `path` for a fresh run, truncating any existing content.
    pub async fn create(path: impl Into<PathBuf>, batch_size: usize) -> Result<Self, SinkError> {
        let path = path.into();
        ensure_parent(&path).await?;
        let file = File::create(&path).await?;
        Ok(Self::from_file(path, file, batch_size))
    }

    /// Open `path` to continue a previous run, keeping existing records.
    ///
    /// A final record cut short by a crash is truncated away so the file
    /// holds only complete lines before new records are appended.
    pub async fn append(path: impl Into<PathBuf>, batch_size: usize) -> Result<Self, SinkError> {
        let path = path.into();
        ensure_parent(&path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        let keep = complete_prefix_len(&mut file, len).await?;
        if keep < len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = len - keep,
                "Discarding incomplete trailing record"
            );
            file.set_len(keep).await?;
        }

        Ok(Self::from_file(path, file, batch_size))
    }

    fn from_file(path: PathBuf, file: File, batch_size: usize) -> Self {
        Self {
            path,
            batch_size: batch_size.max(1),
            state: Mutex::new(SinkState {
                file,
                buffer: Vec::new(),
                saved: 0,
                processed: 0,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write out the buffer. Lines from a failed write are dropped rather
    /// than retried, so a partial write is never duplicated.
    async fn flush_buffer(state: &mut SinkState) -> Result<(), SinkError> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        let lines = std::mem::take(&mut state.buffer);
        let mut chunk = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in &lines {
            chunk.push_str(line);
            chunk.push('\n');
        }

        state.file.write_all(chunk.as_bytes()).await?;
        state.file.flush().await?;
        state.saved += lines.len();
        Ok(())
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn save(&self, result: &PipelineResult) -> Result<(), SinkError> {
        let line = serde_json::to_string(result)?;

        let mut state = self.state.lock().await;
        state.buffer.push(line);
        state.processed += 1;

        if state.buffer.len() >= self.batch_size {
            Self::flush_buffer(&mut state).await?;
        }
        Ok(())
    }

    async fn finalize(&self) -> Result<SinkTotals, SinkError> {
        let mut state = self.state.lock().await;
        Self::flush_buffer(&mut state).await?;
        state.file.sync_data().await?;

        tracing::info!(
            path = %self.path.display(),
            saved = state.saved,
            processed = state.processed,
            "Result sink finalized"
        );

        Ok(SinkTotals {
            saved: state.saved,
            processed: state.processed,
        })
    }
}

async fn ensure_parent(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Length of the prefix of `file` that ends in a newline: `len` when the
/// last byte is `\n`, otherwise the offset just past the last `\n`, or 0.
async fn complete_prefix_len(file: &mut File, len: u64) -> Result<u64, SinkError> {
    const CHUNK: u64 = 8192;
    let mut buf = vec![0u8; CHUNK as usize];
    let mut end = len;

    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Read every well-formed record already in `path`.
///
/// A missing file yields no records. Unparsable lines (typically a record
/// cut short by a crash) are skipped with a warning.
pub async fn recorded_results(path: &Path) -> Result<Vec<PipelineResult>, SinkError> {
    if !fs::try_exists(path).await? {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).await?;
    let mut results = Vec::new();
    let mut skipped = 0usize;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<PipelineResult>(line) {
            Ok(result) => results.push(result),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            path = %path.display(),
            skipped = skipped,
            "Skipped unreadable records in existing output"
        );
    }

    Ok(results)
}

/// Collect the `index` of every well-formed record already in `path`.
pub async fn recorded_indices(path: &Path) -> Result<HashSet<u64>, SinkError> {
    Ok(recorded_results(path)
        .await?
        .into_iter()
        .map(|r| r.index)
        .collect())
}
