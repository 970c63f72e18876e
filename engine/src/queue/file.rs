use super::element::{capacity, ring_spans, used_bytes, wrap, ElementIndex};
use super::header::Header;
use crate::config::QueueFileConfig;
use crate::io::{FileIo, StdFileIo};
use shared::constants::HEADER_LEN;
use shared::errors::QueueFileError;
use std::path::Path;

/// How many payload bytes `remove`/`clear` will best-effort zero per element; large elements
/// are only partially scrubbed so hygiene never dominates the cost of an operation.
const MAX_ZEROED_PAYLOAD: u32 = 4096;

/// A durable, crash-resilient FIFO byte-record queue backed by a single file.
///
/// `QueueFile` is generic over its `FileIo` backend so the same engine runs against a real
/// file (`StdFileIo`) or a fault-injecting decorator in tests. All public operations run to
/// completion with exclusive access to `self`; concurrent callers must serialize externally,
/// or wrap the instance in [`super::SharedQueueFile`].
pub struct QueueFile<IO: FileIo> {
    io: IO,
    config: QueueFileConfig,
    file_length: u32,
    element_count: u32,
    first: ElementIndex,
    last: ElementIndex,
    closed: bool,
}

impl QueueFile<StdFileIo> {
    /// Opens (or creates) the queue file at `path` with default tunables.
    pub fn open(path: &Path) -> Result<Self, QueueFileError> {
        Self::open_with_config(path, QueueFileConfig::default())
    }

    /// Opens (or creates) the queue file at `path` with the given tunables.
    pub fn open_with_config(path: &Path, config: QueueFileConfig) -> Result<Self, QueueFileError> {
        let io = StdFileIo::open(path).map_err(QueueFileError::Io)?;
        Self::open_with_io(io, config)
    }
}

impl<IO: FileIo> QueueFile<IO> {
    /// Opens (or creates) a queue backed by an already-constructed `FileIo`. Used directly by
    /// tests that want a `FaultInjectingFileIo` or other non-`StdFileIo` backend.
    pub fn open_with_io(io: IO, config: QueueFileConfig) -> Result<Self, QueueFileError> {
        config
            .validate()
            .map_err(|e| QueueFileError::BadArg(e.to_string()))?;

        let existing_len = io.len()?;
        if existing_len == 0 {
            Self::initialize_fresh(io, config)
        } else {
            Self::open_existing(io, config, existing_len)
        }
    }

    fn initialize_fresh(io: IO, config: QueueFileConfig) -> Result<Self, QueueFileError> {
        let file_length = config.initial_length;
        io.set_len(file_length as u64)?;
        io.write_at(HEADER_LEN as u64, &vec![0u8; (file_length - HEADER_LEN) as usize])?;
        io.write_at(0, &Header::empty(file_length).encode())?;
        io.sync()?;
        log::info!("created new queue file: length={file_length}");
        Ok(Self {
            io,
            config,
            file_length,
            element_count: 0,
            first: ElementIndex::EMPTY,
            last: ElementIndex::EMPTY,
            closed: false,
        })
    }

    fn open_existing(io: IO, config: QueueFileConfig, existing_len: u64) -> Result<Self, QueueFileError> {
        if existing_len < HEADER_LEN as u64 + 4 {
            return Err(QueueFileError::CorruptHeader(format!(
                "file too small to hold a header: {existing_len} bytes"
            )));
        }
        let header_buf = io.read_at(0, HEADER_LEN as usize)?;
        let header = Header::decode(&header_buf);

        if existing_len < header.file_length as u64 {
            return Err(QueueFileError::CorruptHeader(format!(
                "header file_length {} exceeds actual length {existing_len}",
                header.file_length
            )));
        }
        if existing_len > header.file_length as u64 {
            // A crash between growing the file (expand_if_necessary's truncate+sync) and
            // committing the new header leaves a physically larger file than the last
            // committed header describes. The old header is still valid and the grown tail
            // holds nothing but zero-fill or unreferenced relocation bytes, so recover by
            // truncating back to the committed length rather than failing to open.
            log::warn!(
                "truncating queue file from {existing_len} back to last committed length {} \
                 (likely a crash during expansion)",
                header.file_length
            );
            io.set_len(header.file_length as u64)?;
        }

        let cap = capacity(header.file_length);
        let (first, last) = if header.element_count == 0 {
            if header.first_pos != 0 || header.last_pos != 0 {
                return Err(QueueFileError::CorruptHeader(
                    "element_count is zero but first/last positions are non-zero".into(),
                ));
            }
            (ElementIndex::EMPTY, ElementIndex::EMPTY)
        } else {
            for pos in [header.first_pos, header.last_pos] {
                if pos < HEADER_LEN || pos >= header.file_length {
                    return Err(QueueFileError::CorruptHeader(format!(
                        "element position {pos} out of range [{HEADER_LEN}, {})",
                        header.file_length
                    )));
                }
            }
            let first_len = Self::read_element_len(&io, header.first_pos, header.file_length, cap)?;
            let last_len = Self::read_element_len(&io, header.last_pos, header.file_length, cap)?;
            (
                ElementIndex { pos: header.first_pos, len: first_len },
                ElementIndex { pos: header.last_pos, len: last_len },
            )
        };

        log::info!(
            "opened existing queue file: length={} elements={}",
            header.file_length,
            header.element_count
        );

        Ok(Self {
            io,
            config,
            file_length: header.file_length,
            element_count: header.element_count,
            first,
            last,
            closed: false,
        })
    }

    fn read_element_len(io: &IO, pos: u32, file_length: u32, cap: u32) -> Result<u32, QueueFileError> {
        let (a, b) = ring_spans(pos, 4, file_length);
        let mut buf = io.read_at(a.start as u64, (a.end - a.start) as usize)?;
        if let Some(b) = b {
            let mut rest = io.read_at(b.start as u64, (b.end - b.start) as usize)?;
            buf.append(&mut rest);
        }
        let len = u32::from_be_bytes(buf.try_into().unwrap());
        if len > cap {
            return Err(QueueFileError::CorruptHeader(format!(
                "implausible element length {len} for a ring of capacity {cap}"
            )));
        }
        Ok(len)
    }

    /// Number of records currently in the queue.
    pub fn size(&self) -> u32 {
        self.element_count
    }

    /// Whether the queue holds no records.
    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    /// Current total length of the backing file, including the header.
    pub fn file_length(&self) -> u32 {
        self.file_length
    }

    /// Marks the queue closed; subsequent operations fail with `QueueFileError::Closed`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns a copy of the head record's payload without removing it, or `None` if empty.
    pub fn peek(&self) -> Result<Option<Vec<u8>>, QueueFileError> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(None);
        }
        let len_buf = self.read_ring(self.first.pos, 4)?;
        let len = u32::from_be_bytes(len_buf.try_into().unwrap());
        let payload_pos = wrap(self.first.pos + 4, self.file_length);
        let payload = self.read_ring(payload_pos, len as usize)?;
        Ok(Some(payload))
    }

    /// Appends `payload` to the tail of the queue, expanding the backing file first if needed.
    ///
    /// On any I/O failure the queue is left exactly as it was before the call: the ring bytes
    /// touched during the attempt are unreferenced garbage that a later successful `add` will
    /// overwrite.
    pub fn add(&mut self, payload: &[u8]) -> Result<(), QueueFileError> {
        self.ensure_open()?;
        let len = payload.len() as u32;
        self.expand_if_necessary(4 + len)?;

        let new_last_pos = if self.is_empty() {
            HEADER_LEN
        } else {
            wrap(self.last.pos + self.last.total_len(), self.file_length)
        };

        self.write_ring(new_last_pos, &len.to_be_bytes())?;
        let payload_pos = wrap(new_last_pos + 4, self.file_length);
        self.write_ring(payload_pos, payload)?;

        let new_last = ElementIndex { pos: new_last_pos, len };
        let new_first = if self.is_empty() { new_last } else { self.first };
        let new_count = self.element_count + 1;

        self.commit_header(Header {
            file_length: self.file_length,
            element_count: new_count,
            first_pos: new_first.pos,
            last_pos: new_last.pos,
        })?;

        self.first = new_first;
        self.last = new_last;
        self.element_count = new_count;
        log::debug!("add committed: size={new_count} last_pos={}", new_last.pos);
        Ok(())
    }

    /// Removes the head record. Fails with `QueueFileError::EmptyQueue` if the queue is empty.
    pub fn remove(&mut self) -> Result<(), QueueFileError> {
        self.ensure_open()?;
        if self.is_empty() {
            return Err(QueueFileError::EmptyQueue);
        }

        if self.config.zero_on_remove {
            if let Err(e) = self.zero_element(self.first) {
                log::warn!("best-effort zeroing of reclaimed element failed: {e}");
            }
        }

        let (new_first, new_last, new_count) = if self.element_count == 1 {
            (ElementIndex::EMPTY, ElementIndex::EMPTY, 0)
        } else {
            let next_pos = wrap(self.first.pos + self.first.total_len(), self.file_length);
            let len_buf = self.read_ring(next_pos, 4)?;
            let next_len = u32::from_be_bytes(len_buf.try_into().unwrap());
            (
                ElementIndex { pos: next_pos, len: next_len },
                self.last,
                self.element_count - 1,
            )
        };

        self.commit_header(Header {
            file_length: self.file_length,
            element_count: new_count,
            first_pos: new_first.pos,
            last_pos: new_last.pos,
        })?;

        self.first = new_first;
        self.last = new_last;
        self.element_count = new_count;
        log::debug!("remove committed: size={new_count}");
        Ok(())
    }

    /// Discards all records and shrinks the file back to `config.initial_length`.
    pub fn clear(&mut self) -> Result<(), QueueFileError> {
        self.ensure_open()?;
        let new_length = self.config.initial_length;

        self.io.set_len(new_length as u64)?;
        self.io.write_at(0, &Header::empty(new_length).encode())?;
        if self.config.zero_on_remove {
            let zeros = vec![0u8; (new_length - HEADER_LEN) as usize];
            if let Err(e) = self.io.write_at(HEADER_LEN as u64, &zeros) {
                log::warn!("best-effort ring zeroing during clear failed: {e}");
            }
        }
        self.io.sync()?;

        self.file_length = new_length;
        self.element_count = 0;
        self.first = ElementIndex::EMPTY;
        self.last = ElementIndex::EMPTY;
        log::info!("queue cleared: file truncated to {new_length} bytes");
        Ok(())
    }

    fn expand_if_necessary(&mut self, need: u32) -> Result<(), QueueFileError> {
        while self.free_bytes() < need {
            let old_file_length = self.file_length;
            let new_length = old_file_length.checked_mul(2).filter(|&l| l <= self.config.max_file_length).ok_or(
                QueueFileError::TooLarge {
                    max_file_length: self.config.max_file_length,
                },
            )?;

            self.io.set_len(new_length as u64)?;
            let grown_len = (new_length - old_file_length) as usize;
            self.io.write_at(old_file_length as u64, &vec![0u8; grown_len])?;
            self.io.sync()?;

            let mut new_last_pos = self.last.pos;
            if !self.is_empty() {
                // The used region wraps whenever the tail element's end, normalized back into
                // the ring, falls at or before the head: that can happen either because
                // `last.pos` itself precedes `first.pos`, or because `last.pos` sits after
                // `first.pos` but the element's own payload straddles the physical end. Either
                // way the bytes from HEADER_LEN up to that wrapped end must move to the new
                // tail so the used region stays contiguous after growing.
                let end_of_last = wrap(self.last.pos + self.last.total_len(), old_file_length);
                if end_of_last <= self.first.pos {
                    let wrapped_len = end_of_last - HEADER_LEN;
                    if wrapped_len > 0 {
                        let wrapped_bytes = self.io.read_at(HEADER_LEN as u64, wrapped_len as usize)?;
                        self.io.write_at(old_file_length as u64, &wrapped_bytes)?;
                        self.io.sync()?;
                    }
                    if self.last.pos < self.first.pos {
                        new_last_pos = self.last.pos + (old_file_length - HEADER_LEN);
                    }
                }
            }

            self.commit_header(Header {
                file_length: new_length,
                element_count: self.element_count,
                first_pos: self.first.pos,
                last_pos: new_last_pos,
            })?;

            log::warn!("expanded queue file: {old_file_length} -> {new_length} bytes");
            self.file_length = new_length;
            self.last.pos = new_last_pos;
        }
        Ok(())
    }

    fn zero_element(&self, el: ElementIndex) -> Result<(), QueueFileError> {
        let zero_len = 4 + el.len.min(MAX_ZEROED_PAYLOAD);
        self.write_ring(el.pos, &vec![0u8; zero_len as usize])
    }

    fn free_bytes(&self) -> u32 {
        capacity(self.file_length) - self.used_bytes()
    }

    fn used_bytes(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            used_bytes(self.first, self.last, self.file_length)
        }
    }

    fn write_ring(&self, pos: u32, buf: &[u8]) -> Result<(), QueueFileError> {
        if buf.is_empty() {
            return Ok(());
        }
        let (a, b) = ring_spans(pos, buf.len() as u32, self.file_length);
        let first_len = (a.end - a.start) as usize;
        self.io.write_at(a.start as u64, &buf[..first_len])?;
        if let Some(b) = b {
            self.io.write_at(b.start as u64, &buf[first_len..])?;
        }
        Ok(())
    }

    fn read_ring(&self, pos: u32, len: usize) -> Result<Vec<u8>, QueueFileError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let (a, b) = ring_spans(pos, len as u32, self.file_length);
        let mut out = self.io.read_at(a.start as u64, (a.end - a.start) as usize)?;
        if let Some(b) = b {
            let mut rest = self.io.read_at(b.start as u64, (b.end - b.start) as usize)?;
            out.append(&mut rest);
        }
        Ok(out)
    }

    fn commit_header(&self, header: Header) -> Result<(), QueueFileError> {
        self.io.write_at(0, &header.encode())?;
        self.io.sync()?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), QueueFileError> {
        if self.closed {
            Err(QueueFileError::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FaultInjectingFileIo;

    fn open_fresh(dir: &tempfile::TempDir, name: &str) -> QueueFile<StdFileIo> {
        QueueFile::open(&dir.path().join(name)).expect("open")
    }

    #[test]
    fn fresh_queue_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let q = open_fresh(&dir, "q");
        assert!(q.is_empty());
        assert_eq!(q.size(), 0);
        assert_eq!(q.peek().unwrap(), None);
    }

    #[test]
    fn add_peek_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = open_fresh(&dir, "q");
        q.add(b"hello").unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(q.peek().unwrap().unwrap(), b"hello");
        q.remove().unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn zero_length_element_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = open_fresh(&dir, "q");
        q.add(b"").unwrap();
        assert_eq!(q.peek().unwrap().unwrap(), Vec::<u8>::new());
        q.remove().unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn remove_on_empty_queue_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = open_fresh(&dir, "q");
        assert!(matches!(q.remove(), Err(QueueFileError::EmptyQueue)));
    }

    #[test]
    fn operations_after_close_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = open_fresh(&dir, "q");
        q.close();
        assert!(matches!(q.add(b"x"), Err(QueueFileError::Closed)));
        assert!(matches!(q.peek(), Err(QueueFileError::Closed)));
        assert!(matches!(q.remove(), Err(QueueFileError::Closed)));
    }

    #[test]
    fn reopen_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q");
        {
            let mut q = QueueFile::open(&path).unwrap();
            q.add(b"hello").unwrap();
        }
        // Corrupt the header's recorded file length.
        let io = StdFileIo::open(&path).unwrap();
        io.write_at(0, &9999u32.to_be_bytes()).unwrap();
        io.sync().unwrap();
        assert!(matches!(
            QueueFile::open(&path),
            Err(QueueFileError::CorruptHeader(_))
        ));
    }

    #[test]
    fn reopen_recovers_from_physical_length_ahead_of_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q");
        let header_len_at_close = {
            let mut q = QueueFile::open(&path).unwrap();
            q.add(b"hello").unwrap();
            q.file_length()
        };
        // Simulate a crash after expand_if_necessary's truncate+sync grew the file but before
        // the new header committed: the physical file is now longer than the last-committed
        // header describes, with only zero-fill (no relocation yet) past the old end.
        let io = StdFileIo::open(&path).unwrap();
        io.set_len((header_len_at_close * 2) as u64).unwrap();
        io.sync().unwrap();

        let mut q = QueueFile::open(&path).unwrap();
        assert_eq!(q.file_length(), header_len_at_close);
        assert_eq!(q.size(), 1);
        assert_eq!(q.peek().unwrap().unwrap(), b"hello");
        q.remove().unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn expansion_relocates_wrapped_payload_when_last_pos_is_not_less_than_first_pos() {
        // Regression test: block 4's payload straddles the physical end of the file even
        // though `last.pos >= first.pos`, so relocation must trigger on the wrapped *end* of
        // the tail element, not merely on `last.pos < first.pos`.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q");
        let mut q = QueueFile::open(&path).unwrap();

        q.add(&vec![1u8; 1024]).unwrap();
        q.add(&vec![2u8; 1024]).unwrap();
        q.remove().unwrap();
        q.add(&vec![3u8; 1024]).unwrap();
        q.add(&vec![4u8; 1024]).unwrap();

        // Force expansion with a payload large enough to need the remaining free space.
        q.add(&vec![5u8; 1000]).unwrap();

        let mut drained = Vec::new();
        while !q.is_empty() {
            let payload = q.peek().unwrap().unwrap();
            assert!(payload.iter().all(|&b| b == payload[0]), "payload corrupted: {:?}", &payload[..8.min(payload.len())]);
            drained.push((payload[0], payload.len()));
            q.remove().unwrap();
        }
        assert_eq!(drained, vec![(2, 1024), (3, 1024), (4, 1024), (5, 1000)]);
    }

    #[test]
    fn failed_add_leaves_queue_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q");
        let io = std::sync::Arc::new(FaultInjectingFileIo::new(StdFileIo::open(&path).unwrap()));
        let mut q = QueueFile::open_with_io(io.clone(), QueueFileConfig::default()).unwrap();

        q.add(b"keep").unwrap();
        io.set_fail_writes(true);
        assert!(q.add(b"boom").is_err());

        io.set_fail_writes(false);
        assert_eq!(q.size(), 1);
        assert_eq!(q.peek().unwrap().unwrap(), b"keep");
        q.add(b"second").unwrap();
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn failed_remove_leaves_queue_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q");
        let io = std::sync::Arc::new(FaultInjectingFileIo::new(StdFileIo::open(&path).unwrap()));
        let mut q = QueueFile::open_with_io(io.clone(), QueueFileConfig::default()).unwrap();
        q.add(b"a").unwrap();
        q.add(b"b").unwrap();

        io.set_fail_writes(true);
        assert!(q.remove().is_err());

        io.set_fail_writes(false);
        assert_eq!(q.size(), 2);
        assert_eq!(q.peek().unwrap().unwrap(), b"a");
    }
}
