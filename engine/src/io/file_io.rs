use std::io;
use std::sync::Arc;

/// Positional byte I/O on a single open file.
///
/// Implementations do not need to be `Sync`-safe for concurrent callers; the engine that owns
/// a `FileIo` is itself single-threaded-cooperative and expects external callers to serialize
/// access (see `SharedQueueFile` for a ready-made mutex wrapper).
pub trait FileIo {
    /// Reads exactly `len` bytes starting at `offset`. Fails if the read would run past the
    /// end of the file.
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>>;

    /// Writes `buf` starting at `offset`. Never changes the file's length.
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Forces any buffered data and metadata to stable storage.
    fn sync(&self) -> io::Result<()>;

    /// Current length of the file in bytes.
    fn len(&self) -> io::Result<u64>;

    /// Grows or shrinks the file to exactly `new_len` bytes. Growing zero-fills the new tail.
    fn set_len(&self, new_len: u64) -> io::Result<()>;
}

/// Lets a `QueueFile` own a shared handle to its backend, so tests (or other callers) can keep
/// a second `Arc` to the same `FaultInjectingFileIo` and toggle it after the queue is built.
impl<T: FileIo + ?Sized> FileIo for Arc<T> {
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        (**self).read_at(offset, len)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, buf)
    }

    fn sync(&self) -> io::Result<()> {
        (**self).sync()
    }

    fn len(&self) -> io::Result<u64> {
        (**self).len()
    }

    fn set_len(&self, new_len: u64) -> io::Result<()> {
        (**self).set_len(new_len)
    }
}
