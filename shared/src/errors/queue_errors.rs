use thiserror::Error;

/// Errors produced by the queue file engine.
///
/// Mutating operations follow a pre-commit abort policy: any variant other than
/// `CorruptHeader` (open-time only) and `Closed` leaves the queue exactly as it was before
/// the call, so the caller may safely retry.
#[derive(Error, Debug)]
pub enum QueueFileError {
    /// An argument failed validation before any I/O was attempted.
    #[error("bad argument: {0}")]
    BadArg(String),

    /// The queue was used after `close()`.
    #[error("queue file is closed")]
    Closed,

    /// `remove()` (or `peek()`-then-`remove()`) was called on an empty queue.
    #[error("queue is empty")]
    EmptyQueue,

    /// The on-disk header failed validation at open time.
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// Expansion would need to grow the file past the configured maximum length.
    #[error("required capacity exceeds the maximum file length ({max_file_length} bytes)")]
    TooLarge { max_file_length: u32 },

    /// Any failure surfaced by the underlying `FileIo` implementation.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for QueueFileError {
    fn from(source: std::io::Error) -> Self {
        QueueFileError::Io(source)
    }
}
