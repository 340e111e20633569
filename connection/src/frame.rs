//! Wire framing for overlay messages.
//!
//! Every frame on the wire is a 4-byte big-endian length header followed by
//! a body of exactly that many bytes.
//!
//! ```text
//! +----------+----------+----------+----------+-------------------+
//! | r|len 30 | len 23-16| len 15-8 | len 7-0  | body (len bytes)  |
//! +----------+----------+----------+----------+-------------------+
//! ```
//!
//! The most significant bit of the first byte (`r`) is reserved. Readers
//! clear it before computing the length and do *not* validate that it was
//! zero, so a header with the bit set decodes to the remaining 31-bit value.
//! Writers always emit it as zero.

use std::fmt;

/// Size of a frame header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest body length accepted on the wire (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 0x100_0000;

/// Mask clearing the reserved bit of the header.
const LENGTH_MASK: u32 = 0x7fff_ffff;

/// Errors produced while framing or unframing a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The body length exceeds [`MAX_MESSAGE_SIZE`].
    TooLarge(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLarge(length) => write!(
                f,
                "Frame length {length} exceeds maximum message size {MAX_MESSAGE_SIZE}"
            ),
        }
    }
}

impl std::error::Error for FrameError {}

/// Decode the body length from a frame header.
///
/// The reserved bit is masked off before the bound check.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if the masked length is greater than
/// [`MAX_MESSAGE_SIZE`].
pub fn decode_length(header: [u8; HEADER_SIZE]) -> Result<usize, FrameError> {
    let length = (u32::from_be_bytes(header) & LENGTH_MASK) as usize;
    if length > MAX_MESSAGE_SIZE {
        return Err(FrameError::TooLarge(length));
    }
    Ok(length)
}

/// Encode the header for a body of `length` bytes.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if `length` is greater than
/// [`MAX_MESSAGE_SIZE`].
pub fn encode_header(length: usize) -> Result<[u8; HEADER_SIZE], FrameError> {
    if length > MAX_MESSAGE_SIZE {
        return Err(FrameError::TooLarge(length));
    }
    Ok((length as u32).to_be_bytes())
}

/// Build a complete frame (header followed by `body`).
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if `body` is longer than
/// [`MAX_MESSAGE_SIZE`].
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let header = encode_header(body.len())?;
    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(body);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        for length in [0usize, 1, 255, 256, 65_536, MAX_MESSAGE_SIZE] {
            let body: Vec<u8> = (0..length).map(|i| (i % 251) as u8).collect();
            let frame = encode_frame(&body).unwrap();
            assert_eq!(frame.len(), HEADER_SIZE + length);

            let mut header = [0u8; HEADER_SIZE];
            header.copy_from_slice(&frame[..HEADER_SIZE]);
            assert_eq!(decode_length(header).unwrap(), length);
            assert_eq!(&frame[HEADER_SIZE..], body.as_slice());
        }
    }

    #[test]
    fn test_reserved_bit_is_masked_not_rejected() {
        // Top bit set over a small length decodes to the 31-bit remainder.
        assert_eq!(decode_length([0x80, 0x00, 0x00, 0x2a]).unwrap(), 42);
        assert_eq!(decode_length([0x80, 0x00, 0x00, 0x00]).unwrap(), 0);
        assert_eq!(
            decode_length([0x81, 0x00, 0x00, 0x00]).unwrap(),
            MAX_MESSAGE_SIZE
        );
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(
            decode_length([0x01, 0x00, 0x00, 0x00]).unwrap(),
            MAX_MESSAGE_SIZE
        );
        assert_eq!(
            decode_length([0x01, 0x00, 0x00, 0x01]),
            Err(FrameError::TooLarge(MAX_MESSAGE_SIZE + 1))
        );
        // Masking leaves the largest 31-bit value, which is still too large.
        assert_eq!(
            decode_length([0xff, 0xff, 0xff, 0xff]),
            Err(FrameError::TooLarge(0x7fff_ffff))
        );
    }

    #[test]
    fn test_encode_rejects_oversized_body() {
        assert_eq!(
            encode_header(MAX_MESSAGE_SIZE + 1),
            Err(FrameError::TooLarge(MAX_MESSAGE_SIZE + 1))
        );
        assert_eq!(encode_header(0x1234).unwrap(), [0x00, 0x00, 0x12, 0x34]);
    }
}
