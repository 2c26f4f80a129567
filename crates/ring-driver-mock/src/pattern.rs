//! Synthetic amplitude images for simulated frames.

use bytes::{BufMut, Bytes, BytesMut};

/// Little-endian `u16` amplitude image.
///
/// A diagonal gradient shifted by the frame sequence, so consecutive frames
/// differ and a stuck buffer is visible.
pub fn amplitude_image(width: u32, height: u32, sequence: u64) -> Bytes {
    let w = width as usize;
    let h = height as usize;
    let mut buf = BytesMut::with_capacity(w * h * 2);
    let span = (w + h).max(1);
    for y in 0..h {
        for x in 0..w {
            let pos = (x + y + sequence as usize) % span;
            let value = (pos * usize::from(u16::MAX) / span) as u16;
            buf.put_u16_le(value);
        }
    }
    buf.freeze()
}
