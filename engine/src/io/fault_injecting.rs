use super::file_io::FileIo;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Decorates any `FileIo` with an instance-level toggle that forces `write_at`/`sync` to fail.
///
/// This replaces the reference implementation's process-global fault-injection switch: the
/// flag lives on the instance, so two `FaultInjectingFileIo` wrapping two different queue
/// files in the same test process do not interfere with each other.
pub struct FaultInjectingFileIo<T: FileIo> {
    inner: T,
    fail_writes: AtomicBool,
}

impl<T: FileIo> FaultInjectingFileIo<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Arms or disarms write/sync failure. While armed, every `write_at` and `sync` call
    /// returns an error instead of touching the underlying file.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected_error() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "fault injected for testing")
    }
}

impl<T: FileIo> FileIo for FaultInjectingFileIo<T> {
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected_error());
        }
        self.inner.write_at(offset, buf)
    }

    fn sync(&self) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected_error());
        }
        self.inner.sync()
    }

    fn len(&self) -> io::Result<u64> {
        self.inner.len()
    }

    fn set_len(&self, new_len: u64) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected_error());
        }
        self.inner.set_len(new_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::StdFileIo;

    #[test]
    fn armed_flag_fails_writes_and_sync_but_not_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f.bin");
        let real = StdFileIo::open(&path).expect("open");
        real.set_len(16).expect("set_len");
        let io = FaultInjectingFileIo::new(real);

        io.set_fail_writes(true);
        assert!(io.write_at(0, b"x").is_err());
        assert!(io.sync().is_err());
        assert!(io.set_len(32).is_err());
        assert!(io.read_at(0, 4).is_ok());

        io.set_fail_writes(false);
        assert!(io.write_at(0, b"x").is_ok());
        assert!(io.sync().is_ok());
    }
}
