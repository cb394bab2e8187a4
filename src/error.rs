//! Error types for streamwire.

use thiserror::Error;

/// Main error type for all streamwire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during transport operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer too small to decode the requested structure.
    #[error("frame too small: need {needed} bytes, have {have}")]
    FrameTooSmall { needed: usize, have: usize },

    /// Header carried a frame type code with no known decoder.
    #[error("unknown frame type: 0x{0:02X}")]
    UnknownFrameType(u8),

    /// A length-prefixed field does not fit its prefix range.
    #[error("{field} length {len} exceeds maximum {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Protocol error (invalid frame, wrong stream state, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// SETUP frame requested something this implementation does not support.
    #[error("unsupported setup: {0}")]
    UnsupportedSetup(String),

    /// SETUP frame carried invalid parameters.
    #[error("invalid setup: {0}")]
    InvalidSetup(String),

    /// SETUP frame rejected by the application acceptor.
    #[error("setup rejected: {0}")]
    RejectedSetup(String),

    /// The stream-ID generator ran out of the 31-bit range.
    #[error("stream IDs exhausted for this connection")]
    StreamIdsExhausted,

    /// No frame received from the peer within the maximum lifetime.
    #[error("keepalive timeout: no frame received within {max_lifetime_ms} ms")]
    KeepaliveTimeout { max_lifetime_ms: i64 },

    /// The peer closed the connection with an ERROR frame on stream 0.
    #[error("connection error from peer: [0x{code:08X}] {message}")]
    PeerError { code: u32, message: String },

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write queue full.
    #[error("backpressure timeout")]
    BackpressureTimeout,

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// Result type alias using streamwire's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
