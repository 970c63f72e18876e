//! On-disk layout constants shared by every component that touches a queue file.

/// Size in bytes of the fixed file header at offset 0.
pub const HEADER_LEN: u32 = 16;

/// Default total file length for a freshly created queue file.
pub const INITIAL_LENGTH: u32 = 4096;

/// Default ceiling on `fileLength`, chosen so that the doubling in `expand_if_necessary` never
/// overflows 32-bit signed integer arithmetic.
pub const DEFAULT_MAX_FILE_LENGTH: u32 = i32::MAX as u32 - HEADER_LEN;
