use shared::constants::HEADER_LEN;

/// The fixed 16-byte file header: four big-endian `u32` words at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub file_length: u32,
    pub element_count: u32,
    pub first_pos: u32,
    pub last_pos: u32,
}

impl Header {
    pub(crate) fn empty(file_length: u32) -> Self {
        Self {
            file_length,
            element_count: 0,
            first_pos: 0,
            last_pos: 0,
        }
    }

    pub(crate) fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(&self.file_length.to_be_bytes());
        buf[4..8].copy_from_slice(&self.element_count.to_be_bytes());
        buf[8..12].copy_from_slice(&self.first_pos.to_be_bytes());
        buf[12..16].copy_from_slice(&self.last_pos.to_be_bytes());
        buf
    }

    pub(crate) fn decode(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_LEN as usize);
        Self {
            file_length: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            element_count: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            first_pos: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
            last_pos: u32::from_be_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}
