//! Errors produced while decoding a stream of JSON frames.
//!
//! - [`DecodeError::Malformed`]: one frame could not be decoded; the decoder has already
//!   skipped past it and the next call continues with the following frame.
//! - [`DecodeError::TooLarge`]: a frame grew past the size limit before it was complete;
//!   it is skipped like a malformed one.
//! - [`DecodeError::UnexpectedEof`]: the stream ended in the middle of a frame.
//! - [`DecodeError::Io`]: reading from the underlying transport failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame exceeds {0} bytes")]
    TooLarge(usize),

    #[error("unexpected EOF")]
    UnexpectedEof,

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Whether decoding may continue on the same stream after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Malformed(_) | DecodeError::TooLarge(_))
    }

    /// Whether this error means the stream was cut off, which is how a daemon restart or
    /// an aborted connection surfaces.
    pub fn is_unexpected_eof(&self) -> bool {
        match self {
            DecodeError::UnexpectedEof => true,
            DecodeError::Io(err) => err.kind() == std::io::ErrorKind::UnexpectedEof,
            DecodeError::Malformed(_) | DecodeError::TooLarge(_) => false,
        }
    }
}
