mod element;
mod file;
mod header;
mod shared_queue;

pub use file::QueueFile;
pub use shared_queue::SharedQueueFile;

pub(crate) use element::ElementIndex;
pub(crate) use header::Header;
