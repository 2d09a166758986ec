//! Lock-coordinated persisted counter shared between processes.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use tokio::sync::Mutex;

use super::file::{advance_record, init_if_empty, open_counter_file};
use crate::error::{SequenceError, SequenceResult};
use crate::sequence::Sequence;

/// A file-persisted sequence safe to share between independent processes.
///
/// Same record format and external contract as
/// [`FileSequence`](crate::FileSequence), but every read-modify-write cycle
/// runs under an exclusive advisory lock on the backing file, released
/// before the call returns. N processes pointed at one file therefore issue
/// each value exactly once, at the cost of one lock acquisition and two I/O
/// operations per call. Only lock-aware processes are excluded; the lock is
/// advisory.
///
/// File locking is blocking, so the cycle runs on the blocking pool.
pub struct LockedFileSequence {
    path: PathBuf,
    file: Mutex<Option<Arc<File>>>,
}

impl LockedFileSequence {
    /// Creates a sequence over the given path. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Opens the backing file, creating and zero-initializing it if it is
    /// absent or empty. A second call is a no-op.
    ///
    /// Initialization runs under the exclusive lock so two processes opening
    /// a fresh file cannot both write the initial record after one of them
    /// has already advanced it.
    pub async fn open(&self) -> SequenceResult<()> {
        let mut guard = self.file.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || -> SequenceResult<File> {
            let file = open_counter_file(&path)?;
            file.lock_exclusive().map_err(SequenceError::from_io)?;
            let init = init_if_empty(&file);
            let unlock = file.unlock().map_err(SequenceError::from_io);
            init.and(unlock)?;
            Ok(file)
        })
        .await
        .map_err(|e| SequenceError::Io(format!("blocking task failed: {}", e)))??;

        *guard = Some(Arc::new(file));
        Ok(())
    }

    /// Releases the file handle. Closing an already closed sequence is a
    /// no-op.
    pub async fn close(&self) -> SequenceResult<()> {
        let mut guard = self.file.lock().await;
        guard.take();
        Ok(())
    }
}

#[async_trait]
impl Sequence for LockedFileSequence {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn next(&self) -> SequenceResult<u64> {
        let guard = self.file.lock().await;
        let file = Arc::clone(guard.as_ref().ok_or(SequenceError::NotOpen)?);

        tokio::task::spawn_blocking(move || {
            file.lock_exclusive().map_err(SequenceError::from_io)?;
            let outcome = advance_record(&file);
            // The handle outlives this call, so release explicitly rather
            // than relying on drop.
            file.unlock().map_err(SequenceError::from_io)?;
            outcome
        })
        .await
        .map_err(|e| SequenceError::Io(format!("blocking task failed: {}", e)))?
    }
}
