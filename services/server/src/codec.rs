//! Device-side frame codec.
//!
//! Devices send newline-delimited JSON.  The codec splits a growing byte
//! stream into complete message strings, retaining the trailing partial
//! message for the next read.  Whitespace-only segments are skipped.
//!
//! The retained partial message is capped at [`MAX_FRAME_BYTES`]; a peer
//! that streams more than that without a newline is torn down the same way
//! a malformed frame would be.

use pw_protocol::DeviceFrame;

/// Upper bound on a buffered partial frame.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The retained partial frame exceeded the configured cap.
    FrameTooLarge { buffered: usize, max: usize },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::FrameTooLarge { buffered, max } => {
                write!(f, "partial frame of {} bytes exceeds cap of {}", buffered, max)
            }
        }
    }
}

impl std::error::Error for CodecError {}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Accumulating line splitter for one connection.
pub struct FrameCodec {
    buf: Vec<u8>,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_bytes(MAX_FRAME_BYTES)
    }

    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        FrameCodec {
            buf: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Append `bytes` and return every complete message they unlock.
    ///
    /// Invalid UTF-8 is carried through lossily; it fails JSON decode
    /// downstream, which is the malformed-frame path.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, CodecError> {
        self.buf.extend_from_slice(bytes);

        let mut messages = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let segment: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&segment);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                messages.push(trimmed.to_owned());
            }
        }

        if self.buf.len() > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                buffered: self.buf.len(),
                max: self.max_frame_bytes,
            });
        }
        Ok(messages)
    }

    /// Bytes currently retained for the next push.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one message into a frame.  Failure is fatal to the connection.
pub fn decode_frame(text: &str) -> Result<DeviceFrame, serde_json::Error> {
    serde_json::from_str(text)
}
