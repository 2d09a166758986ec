//! Single-process persisted counter.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{SequenceError, SequenceResult};
use crate::sequence::Sequence;
use crate::serde::CounterRecord;

/// A sequence that uses a file to persist progress.
///
/// Every `next()` reads the 8-byte record, writes back the incremented
/// value, and returns the value read, so a restart resumes exactly where the
/// previous process stopped. In-process callers are serialized by an
/// internal mutex; there is no cross-process coordination — point several
/// processes at one file through
/// [`LockedFileSequence`](crate::LockedFileSequence) instead.
///
/// The file handle is acquired by [`open`](Self::open) and released by
/// [`close`](Self::close) or on drop.
pub struct FileSequence {
    path: PathBuf,
    file: Mutex<Option<Arc<File>>>,
}

impl FileSequence {
    /// Creates a sequence over the given path. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Opens the backing file, creating and zero-initializing it if it is
    /// absent or empty. A second call is a no-op.
    pub async fn open(&self) -> SequenceResult<()> {
        let mut guard = self.file.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || -> SequenceResult<File> {
            let file = open_counter_file(&path)?;
            init_if_empty(&file)?;
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
impl Sequence for FileSequence {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn next(&self) -> SequenceResult<u64> {
        // The guard is held across the blocking call so in-process callers
        // cannot interleave read-modify-write cycles.
        let guard = self.file.lock().await;
        let file = Arc::clone(guard.as_ref().ok_or(SequenceError::NotOpen)?);

        tokio::task::spawn_blocking(move || advance_record(&file))
            .await
            .map_err(|e| SequenceError::Io(format!("blocking task failed: {}", e)))?
    }
}

/// Opens (creating if needed) a counter file for read and write.
pub(crate) fn open_counter_file(path: &Path) -> SequenceResult<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(SequenceError::from_io)
}

/// Writes the initial record if the file holds nothing yet.
pub(crate) fn init_if_empty(mut file: &File) -> SequenceResult<()> {
    let len = file.metadata().map_err(SequenceError::from_io)?.len();
    if len == 0 {
        file.write_all(&CounterRecord::new(0).serialize())
            .map_err(SequenceError::from_io)?;
    }
    Ok(())
}

/// One read-modify-write cycle against the record at offset 0.
///
/// Returns the value read; the record left behind is that value plus one.
pub(crate) fn advance_record(mut file: &File) -> SequenceResult<u64> {
    let mut buf = [0u8; CounterRecord::LEN];
    file.seek(SeekFrom::Start(0)).map_err(SequenceError::from_io)?;
    if let Err(e) = file.read_exact(&mut buf) {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => SequenceError::TruncatedRecord(format!(
                "counter record shorter than {} bytes",
                CounterRecord::LEN
            )),
            _ => SequenceError::from_io(e),
        });
    }

    let value = CounterRecord::deserialize(&buf)?.value();
    let next = value.checked_add(1).ok_or(SequenceError::Exhausted)?;

    file.seek(SeekFrom::Start(0)).map_err(SequenceError::from_io)?;
    file.write_all(&CounterRecord::new(next).serialize())
        .map_err(SequenceError::from_io)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_fail_next_before_open() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let sequence = FileSequence::new(dir.path().join("counter.seq"));

        // when
        let result = sequence.next().await;

        // then
        assert_eq!(result, Err(SequenceError::NotOpen));
    }

    #[tokio::test]
    async fn should_issue_consecutive_values_from_fresh_file() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let sequence = FileSequence::new(dir.path().join("counter.seq"));
        sequence.open().await.unwrap();

        // then
        assert_eq!(sequence.next().await.unwrap(), 0);
        assert_eq!(sequence.next().await.unwrap(), 1);
        assert_eq!(sequence.next().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn should_resume_after_reopen() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.seq");

        let old_instance = FileSequence::new(&path);
        old_instance.open().await.unwrap();
        for _ in 0..1000 {
            old_instance.next().await.unwrap();
        }
        old_instance.close().await.unwrap();

        // when
        let sequence = FileSequence::new(&path);
        sequence.open().await.unwrap();
        let value = sequence.next().await.unwrap();

        // then
        assert_eq!(value, 1000);
    }

    #[tokio::test]
    async fn should_treat_second_open_as_noop() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let sequence = FileSequence::new(dir.path().join("counter.seq"));
        sequence.open().await.unwrap();
        sequence.next().await.unwrap();

        // when
        sequence.open().await.unwrap();

        // then - progress was not reset
        assert_eq!(sequence.next().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_fail_next_after_close() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let sequence = FileSequence::new(dir.path().join("counter.seq"));
        sequence.open().await.unwrap();
        sequence.close().await.unwrap();

        // when
        let result = sequence.next().await;

        // then
        assert_eq!(result, Err(SequenceError::NotOpen));

        // and a second close is a no-op
        sequence.close().await.unwrap();
    }

    #[tokio::test]
    async fn should_fail_on_truncated_record() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.seq");
        std::fs::write(&path, [0u8; 3]).unwrap();

        let sequence = FileSequence::new(&path);
        sequence.open().await.unwrap();

        // when
        let result = sequence.next().await;

        // then
        assert!(matches!(result, Err(SequenceError::TruncatedRecord(_))));
    }
}
