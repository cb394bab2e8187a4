//! Frame buffer for accumulating partial transport reads.
//!
//! The transport layer prefixes every frame with a 24-bit big-endian
//! length. This buffer turns an arbitrary byte-chunk stream back into
//! whole frames using `bytes::BytesMut` for zero-copy extraction:
//! - `WaitingForLength`: need the 3 prefix bytes
//! - `WaitingForFrame`: prefix parsed, need N more frame bytes
//!
//! The extracted chunks are raw frame bytes (header + body); decoding is
//! left to the caller so that undecodable-but-ignorable frames can be
//! dropped instead of failing the connection.

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

use super::types::{DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};

/// State machine for frame extraction.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for the complete 3-byte length prefix.
    WaitingForLength,
    /// Prefix parsed, waiting for the frame bytes.
    WaitingForFrame { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting whole frames.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed frame size.
    max_frame_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default maximum frame size.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns raw frame byte chunks (without the length prefix). Partial
    /// data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error if a length prefix claims more than the maximum
    /// frame size.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let len = (usize::from(self.buffer[0]) << 16)
                    | (usize::from(self.buffer[1]) << 8)
                    | usize::from(self.buffer[2]);

                if len > self.max_frame_size {
                    return Err(Error::Protocol(format!(
                        "frame length {} exceeds maximum {}",
                        len, self.max_frame_size
                    )));
                }

                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::WaitingForFrame { remaining: len };

                // The frame bytes may already be buffered.
                self.try_extract_one()
            }

            State::WaitingForFrame { remaining } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let frame = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForLength;
                Ok(Some(frame))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepend the 24-bit length prefix to an encoded frame.
///
/// The inverse of what [`FrameBuffer::push`] strips off.
pub fn length_prefix(frame_len: usize) -> [u8; LENGTH_PREFIX_SIZE] {
    debug_assert!(frame_len <= super::types::MAX_FRAME_SIZE);
    [
        (frame_len >> 16) as u8,
        (frame_len >> 8) as u8,
        frame_len as u8,
    ]
}
