use super::file::QueueFile;
use crate::config::QueueFileConfig;
use crate::io::{FileIo, StdFileIo};
use shared::errors::QueueFileError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Thread-safe handle to a [`QueueFile`], for callers that need to share one queue across
/// threads without hand-rolling their own locking.
///
/// `QueueFile` itself expects single-threaded-cooperative access; this wraps it in a `Mutex`
/// and hands out `Arc` clones so producers and consumers can each hold a handle.
#[derive(Clone)]
pub struct SharedQueueFile<IO: FileIo> {
    inner: Arc<Mutex<QueueFile<IO>>>,
}

impl SharedQueueFile<StdFileIo> {
    /// Opens (or creates) the queue file at `path` with default tunables, shared-ready.
    pub fn open(path: &Path) -> Result<Self, QueueFileError> {
        Ok(Self::wrap(QueueFile::open(path)?))
    }

    /// Opens (or creates) the queue file at `path` with the given tunables, shared-ready.
    pub fn open_with_config(path: &Path, config: QueueFileConfig) -> Result<Self, QueueFileError> {
        Ok(Self::wrap(QueueFile::open_with_config(path, config)?))
    }
}

impl<IO: FileIo> SharedQueueFile<IO> {
    /// Wraps an already-open `QueueFile` for sharing across threads.
    pub fn wrap(queue: QueueFile<IO>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(queue)),
        }
    }

    /// Appends `payload` to the tail of the queue.
    pub fn add(&self, payload: &[u8]) -> Result<(), QueueFileError> {
        self.lock().add(payload)
    }

    /// Returns a copy of the head record's payload without removing it.
    pub fn peek(&self) -> Result<Option<Vec<u8>>, QueueFileError> {
        self.lock().peek()
    }

    /// Removes the head record.
    pub fn remove(&self) -> Result<(), QueueFileError> {
        self.lock().remove()
    }

    /// Discards all records and shrinks the file back to its configured initial length.
    pub fn clear(&self) -> Result<(), QueueFileError> {
        self.lock().clear()
    }

    /// Number of records currently in the queue.
    pub fn size(&self) -> u32 {
        self.lock().size()
    }

    /// Whether the queue holds no records.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Marks the queue closed; subsequent operations fail with `QueueFileError::Closed`.
    pub fn close(&self) {
        self.lock().close()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueFile<IO>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::error!("queue file mutex poisoned by a panicking holder; recovering");
            poisoned.into_inner()
        })
    }
}
