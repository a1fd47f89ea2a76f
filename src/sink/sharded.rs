//! Batched read-modify-write updates into shared JSON documents.
//!
//! Many concurrent tasks may target the same document, so every write goes
//! through one background flush worker. The worker groups updates by path and
//! flushes when the number of pending paths reaches the batch size or the
//! flush interval elapses, whichever comes first. Each document is rewritten
//! under its own lock from a [`FileLockRegistry`].

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SinkError;

const CHANNEL_CAPACITY: usize = 1024;

/// Lazily-created async mutex per document path.
#[derive(Debug, Default)]
pub struct FileLockRegistry {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl FileLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `path`, created on first use.
    pub fn lock_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Set `document[field][key] = value` in the document at `path`.
#[derive(Debug, Clone)]
pub struct DocumentUpdate {
    pub path: PathBuf,
    pub key: String,
    pub value: Value,
}

impl DocumentUpdate {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            value,
        }
    }
}

/// Flush worker settings.
#[derive(Debug, Clone)]
pub struct ShardedUpdaterConfig {
    /// Top-level object field the updates are written into.
    pub field: String,
    /// Flush once this many distinct paths have pending updates.
    pub batch_size: usize,
    /// Flush pending updates at least this often.
    pub flush_interval: Duration,
}

impl Default for ShardedUpdaterConfig {
    fn default() -> Self {
        Self {
            field: "evaluate_result".to_string(),
            batch_size: 10,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Counts reported when the updater is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterTotals {
    pub updates_written: usize,
    pub documents_written: usize,
    pub failed_updates: usize,
    pub failed_documents: usize,
}

/// Cloneable handle for submitting updates from worker tasks.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    sender: mpsc::Sender<DocumentUpdate>,
}

impl UpdateSender {
    pub async fn submit(&self, update: DocumentUpdate) -> Result<(), SinkError> {
        self.sender.send(update).await.map_err(|_| SinkError::Closed)
    }
}

/// Owner of the background flush worker.
pub struct ShardedUpdater {
    sender: UpdateSender,
    worker: JoinHandle<UpdaterTotals>,
    locks: Arc<FileLockRegistry>,
}

impl ShardedUpdater {
    /// Start the flush worker.
    pub fn spawn(config: ShardedUpdaterConfig, locks: Arc<FileLockRegistry>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let worker = tokio::spawn(run_flush_worker(rx, config, locks.clone()));
        Self {
            sender: UpdateSender { sender: tx },
            worker,
            locks,
        }
    }

    pub fn sender(&self) -> UpdateSender {
        self.sender.clone()
    }

    pub fn locks(&self) -> &Arc<FileLockRegistry> {
        &self.locks
    }

    pub async fn submit(&self, update: DocumentUpdate) -> Result<(), SinkError> {
        self.sender.submit(update).await
    }

    /// Stop accepting updates, flush everything pending and report totals.
    ///
    /// Waits until every outstanding [`UpdateSender`] clone is dropped.
    pub async fn close(self) -> Result<UpdaterTotals, SinkError> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| SinkError::WorkerFailed(e.to_string()))
    }
}

async fn run_flush_worker(
    mut rx: mpsc::Receiver<DocumentUpdate>,
    config: ShardedUpdaterConfig,
    locks: Arc<FileLockRegistry>,
) -> UpdaterTotals {
    let batch_size = config.batch_size.max(1);
    let mut pending: BTreeMap<PathBuf, BTreeMap<String, Value>> = BTreeMap::new();
    let mut totals = UpdaterTotals::default();

    let mut tick = tokio::time::interval(config.flush_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await; // skip the immediate first tick

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(update) => {
                    pending
                        .entry(update.path)
                        .or_default()
                        .insert(update.key, update.value);
                    if pending.len() >= batch_size {
                        flush_pending(&mut pending, &config.field, &locks, &mut totals).await;
                        tick.reset();
                    }
                }
                None => break,
            },
            _ = tick.tick() => {
                if !pending.is_empty() {
                    flush_pending(&mut pending, &config.field, &locks, &mut totals).await;
                }
            }
        }
    }

    flush_pending(&mut pending, &config.field, &locks, &mut totals).await;
    tracing::debug!(
        documents = totals.documents_written,
        updates = totals.updates_written,
        failed = totals.failed_documents,
        "Flush worker stopped"
    );
    totals
}

async fn flush_pending(
    pending: &mut BTreeMap<PathBuf, BTreeMap<String, Value>>,
    field: &str,
    locks: &FileLockRegistry,
    totals: &mut UpdaterTotals,
) {
    for (path, updates) in std::mem::take(pending) {
        let count = updates.len();
        let lock = locks.lock_for(&path);
        let _guard = lock.lock().await;

        match apply_updates(&path, field, updates).await {
            Ok(()) => {
                totals.documents_written += 1;
                totals.updates_written += count;
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    updates = count,
                    error = %e,
                    "Failed to update document"
                );
                totals.failed_documents += 1;
                totals.failed_updates += count;
            }
        }
    }
}

/// Rewrite one document with `updates` merged into `field`.
///
/// The new content goes to a sibling temp file first and is renamed over the
/// original, so readers never see a half-written document.
async fn apply_updates(
    path: &Path,
    field: &str,
    updates: BTreeMap<String, Value>,
) -> Result<(), SinkError> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut document: Value = serde_json::from_str(&content)?;

    let invalid = |message: &str| SinkError::InvalidDocument {
        path: path.display().to_string(),
        message: message.to_string(),
    };

    let root = document
        .as_object_mut()
        .ok_or_else(|| invalid("top level is not an object"))?;
    let target = root
        .entry(field)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| invalid("result field is not an object"))?;

    for (key, value) in updates {
        target.insert(key, value);
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, serde_json::to_string_pretty(&document)?).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
