//! Envelope encoding and decoding for the stream transport.
//!
//! Every frame on the byte stream is preceded by a 5-byte header:
//! ```text
//! ┌───────┬──────────┐
//! │ Flags │ Length   │
//! │ 1 byte│ 4 bytes  │
//! │       │ uint32 BE│
//! └───────┴──────────┘
//! ```
//!
//! A multipart message is a run of frames where every frame but the last
//! has the MORE flag set.

use crate::error::{BridgeError, Result};

/// Envelope header size in bytes (fixed, exactly 5).
pub const ENVELOPE_SIZE: usize = 5;

/// Default maximum frame size (1 GB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1_073_741_824;

/// Flag constants for the envelope.
pub mod flags {
    /// More frames of the same message follow.
    pub const MORE: u8 = 0b0000_0001;

    /// Reserved bits mask (bits 1-7).
    pub const RESERVED_MASK: u8 = 0b1111_1110;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Frame length in bytes.
    pub length: u32,
}

impl Envelope {
    pub fn new(more: bool, length: u32) -> Self {
        Self {
            flags: if more { flags::MORE } else { 0 },
            length,
        }
    }

    /// Encode to bytes (Big Endian length).
    pub fn encode(&self) -> [u8; ENVELOPE_SIZE] {
        let mut buf = [0u8; ENVELOPE_SIZE];
        buf[0] = self.flags;
        buf[1..5].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    /// Decode from bytes. Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < ENVELOPE_SIZE {
            return None;
        }
        Some(Self {
            flags: buf[0],
            length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }

    /// Check reserved bits and the size limit.
    pub fn validate(&self, max_frame_size: u32) -> Result<()> {
        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(BridgeError::Framing(
                "Reserved envelope flag bits must be 0".to_string(),
            ));
        }

        if self.length > max_frame_size {
            return Err(BridgeError::Framing(format!(
                "Frame size {} exceeds maximum {}",
                self.length, max_frame_size
            )));
        }

        Ok(())
    }

    /// Whether more frames of the same message follow.
    #[inline]
    pub fn has_more(&self) -> bool {
        flags::has_flag(self.flags, flags::MORE)
    }
}
