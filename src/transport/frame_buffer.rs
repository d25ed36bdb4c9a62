//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so extracted frames are zero-copy `Bytes`.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForEnvelope`: Need at least 5 bytes
//! - `WaitingForPayload`: Envelope parsed, need N more bytes

use bytes::BytesMut;

use super::envelope::{Envelope, DEFAULT_MAX_FRAME_SIZE, ENVELOPE_SIZE};
use super::ReceivedFrame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    WaitingForEnvelope,
    WaitingForPayload { envelope: Envelope },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    state: State,
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max frame: 1GB.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForEnvelope,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if an envelope is invalid or a frame exceeds the
    /// maximum size.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<ReceivedFrame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<ReceivedFrame>> {
        loop {
            match &self.state {
                State::WaitingForEnvelope => {
                    let Some(envelope) = Envelope::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    envelope.validate(self.max_frame_size)?;

                    let _ = self.buffer.split_to(ENVELOPE_SIZE);
                    self.state = State::WaitingForPayload { envelope };
                }

                State::WaitingForPayload { envelope } => {
                    let length = envelope.length as usize;
                    if self.buffer.len() < length {
                        // Reserve once for large frames instead of growing per read.
                        self.buffer.reserve(length - self.buffer.len());
                        return Ok(None);
                    }

                    let more = envelope.has_more();
                    let data = self.buffer.split_to(length).freeze();
                    self.state = State::WaitingForEnvelope;

                    return Ok(Some(ReceivedFrame { data, more }));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForEnvelope;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
