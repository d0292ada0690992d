//! CPU-side captured frame.

use std::time::Instant;

/// One captured frame, BGRA8, tightly packed rows.
///
/// Borrowed by the presentation side for a single paint; the sink never
/// retains a frame once a newer one has arrived.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize) * 4);
        Self { data, width, height, timestamp: Instant::now() }
    }
}
