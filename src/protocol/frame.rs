//! RLPx frame construction
//!
//! A frame is a 16-byte header followed by a body padded to a 16-byte
//! boundary.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Error, FRAME_ALIGNMENT, HEADER_MARKER, HEADER_SIZE, MAX_FRAME_SIZE, Result};

/// One frame as handed to the encrypted transport.
///
/// # Wire Format
///
/// ```text
/// header: [frame-size (3, big-endian)] [0xC2 0x80 0x80] [zero padding (10)]
/// body:   [rlp(command id)] [payload (raw or snappy)] [zero padding to 16]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: [u8; HEADER_SIZE],
    body: Bytes,
}

impl Frame {
    /// Build a frame around an already encoded command id and payload.
    pub fn build(encoded_cmd_id_and_payload: &[u8]) -> Result<Self> {
        let frame_size = encoded_cmd_id_and_payload.len();
        if frame_size > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: frame_size,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut header = [0u8; HEADER_SIZE];
        // Checked above, the value fits in 24 bits.
        #[allow(clippy::cast_possible_truncation)]
        let size_bytes = (frame_size as u32).to_be_bytes();
        header[0..3].copy_from_slice(&size_bytes[1..]);
        header[3..6].copy_from_slice(&HEADER_MARKER);

        let mut body = BytesMut::with_capacity(padded_len(frame_size));
        body.put_slice(encoded_cmd_id_and_payload);
        body.resize(padded_len(frame_size), 0);

        Ok(Self {
            header,
            body: body.freeze(),
        })
    }

    /// Get the 16-byte header
    #[must_use]
    pub const fn header(&self) -> &[u8; HEADER_SIZE] {
        &self.header
    }

    /// Get the padded body
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Frame size recorded in the header
    #[must_use]
    pub fn frame_size(&self) -> usize {
        read_frame_size(&self.header)
    }

    /// Body with the padding stripped (command id and payload only)
    #[must_use]
    pub fn payload(&self) -> Bytes {
        self.body.slice(..self.frame_size())
    }

    /// Split into header and body
    #[must_use]
    pub fn into_parts(self) -> ([u8; HEADER_SIZE], Bytes) {
        (self.header, self.body)
    }
}

/// Read the 3-byte frame size from a frame header.
#[must_use]
pub fn read_frame_size(header: &[u8; HEADER_SIZE]) -> usize {
    (usize::from(header[0]) << 16) | (usize::from(header[1]) << 8) | usize::from(header[2])
}

/// Cut a received body to the frame size announced in `header`.
pub fn frame_payload<'a>(header: &[u8; HEADER_SIZE], body: &'a [u8]) -> Result<&'a [u8]> {
    let frame_size = read_frame_size(header);
    body.get(..frame_size).ok_or(Error::TruncatedFrame {
        frame_size,
        body_len: body.len(),
    })
}

/// Length of `len` bytes after zero padding to the frame alignment.
#[must_use]
pub const fn padded_len(len: usize) -> usize {
    len.div_ceil(FRAME_ALIGNMENT) * FRAME_ALIGNMENT
}

/// Pad `data` with zero bytes up to the next 16-byte boundary.
#[must_use]
pub fn pad_to_16_byte_boundary(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    padded.resize(padded_len(data.len()), 0);
    padded
}
