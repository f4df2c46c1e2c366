use crate::{
    error::CheckpointError,
    retry::{RetryPolicy, classify_checkpoint_error},
    state::CheckpointStore,
};
use async_trait::async_trait;
use fs2::FileExt;
use model::{core::identifiers::JobKey, pagination::position::ResumePosition};
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Entries = BTreeMap<String, ResumePosition>;

/// JSON checkpoint file shared by every job in a run, and by other processes
/// pointed at the same path.
///
/// Each read or read-modify-write holds an exclusive lock on `<file>.lock`.
/// Writes go to `<file>.tmp`, are synced, then renamed over the original.
pub struct FileCheckpointStore {
    path: PathBuf,
    lock_path: PathBuf,
    // Serializes access from this process so blocking threads don't queue on the file lock.
    gate: Mutex<()>,
    retry: RetryPolicy,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            lock_path: sibling(&path, "lock"),
            path,
            gate: Mutex::new(()),
            retry: RetryPolicy::for_checkpoint(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Entries, CheckpointError> {
        let _gate = self.gate.lock().await;
        let (path, lock_path) = (self.path.clone(), self.lock_path.clone());
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&lock_path)?;
            read_file(&path)
        })
        .await
        .map_err(|e| CheckpointError::Worker(e.to_string()))?
    }

    async fn write_entry(
        &self,
        key: &JobKey,
        position: &ResumePosition,
    ) -> Result<(), CheckpointError> {
        let _gate = self.gate.lock().await;
        let (path, lock_path) = (self.path.clone(), self.lock_path.clone());
        let (key, position) = (key.as_str().to_string(), position.clone());
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&lock_path)?;
            let mut entries = match read_file(&path) {
                Ok(entries) => entries,
                Err(CheckpointError::Corrupt(err)) => {
                    warn!(file = %path.display(), error = %err, "Discarding unreadable checkpoint file");
                    Entries::new()
                }
                Err(err) => return Err(err),
            };
            entries.insert(key, position);
            write_file(&path, &entries)
        })
        .await
        .map_err(|e| CheckpointError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, key: &JobKey) -> ResumePosition {
        match self.read_entries().await {
            Ok(mut entries) => entries.remove(key.as_str()).unwrap_or_default(),
            Err(err) => {
                warn!(
                    job = %key,
                    file = %self.path.display(),
                    error = %err,
                    "Checkpoint unreadable, starting fresh"
                );
                ResumePosition::FRESH
            }
        }
    }

    async fn set(&self, key: &JobKey, position: &ResumePosition) -> Result<(), CheckpointError> {
        self.retry
            .run(
                "checkpoint_write",
                || self.write_entry(key, position),
                classify_checkpoint_error,
            )
            .await
            .map_err(|e| e.into_inner())?;
        debug!(job = %key, %position, "Checkpoint saved");
        Ok(())
    }

    async fn entries(&self) -> Result<Entries, CheckpointError> {
        self.read_entries().await
    }
}

/// Exclusive advisory lock, released on drop.
struct FileLock(File);

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, CheckpointError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(FileLock(file))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn read_file(path: &Path) -> Result<Entries, CheckpointError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Entries::new()),
        Err(err) => Err(err.into()),
    }
}

fn write_file(path: &Path, entries: &Entries) -> Result<(), CheckpointError> {
    let tmp = sibling(path, "tmp");
    let body = serde_json::to_vec_pretty(entries)?;
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
