//! Wire framing: a fixed 12-byte header followed by a payload.
//!
//! `{payload_size, msg_type, tag_offset}`, all little-endian `u32`. `msg_type`
//! is an opaque discriminant the framing layer never interprets; `tag_offset`
//! marks where within the payload a caller-defined routing tag begins, so a
//! receiver can split `payload[..tag_offset]` / `payload[tag_offset..]`
//! without this crate knowing what either half means.

use thiserror::Error;

pub const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_size: u32,
    pub msg_type: u32,
    pub tag_offset: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.msg_type.to_le_bytes());
        buf[8..12].copy_from_slice(&self.tag_offset.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            payload_size: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            msg_type: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            tag_offset: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame payload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u32, max: u32 },
    #[error("tag_offset {tag_offset} exceeds payload_size {payload_size}")]
    BadTagOffset { tag_offset: u32, payload_size: u32 },
}

/// Validates a decoded header's invariants against a caller-supplied bound.
/// Does not touch any buffer; [`crate::recv_buffer::RecvBuffer`] owns the
/// byte-availability side of frame assembly.
pub fn validate(header: &Header, max_payload_size: u32) -> Result<(), FrameError> {
    if header.payload_size > max_payload_size {
        return Err(FrameError::TooLarge { size: header.payload_size, max: max_payload_size });
    }
    if header.tag_offset > header.payload_size {
        return Err(FrameError::BadTagOffset {
            tag_offset: header.tag_offset,
            payload_size: header.payload_size,
        });
    }
    Ok(())
}
