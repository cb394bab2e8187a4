//! Raw pass-through codec.

use bytes::Bytes;

/// Zero-copy codec for payloads that are already bytes.
pub struct RawCodec;

impl RawCodec {
    /// "Encode" raw bytes (copies into an owned buffer).
    #[inline]
    pub fn encode(data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    /// "Decode" raw bytes (identity).
    #[inline]
    pub fn decode(data: &[u8]) -> &[u8] {
        data
    }

    /// Wrap existing bytes without copying.
    #[inline]
    pub fn wrap(data: Bytes) -> Bytes {
        data
    }
}
