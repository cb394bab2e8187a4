//! Payload value type.
//!
//! A [`Payload`] is what flows through every interaction model: an optional
//! metadata byte sequence plus a data byte sequence. Uses `bytes::Bytes`
//! for zero-copy sharing; equality is structural.
//!
//! # Example
//!
//! ```
//! use streamwire::Payload;
//! use bytes::Bytes;
//!
//! let payload = Payload::with_metadata(Bytes::from_static(b"route"), Bytes::from_static(b"body"));
//! assert_eq!(payload.data(), b"body");
//! assert_eq!(payload.metadata(), Some(&b"route"[..]));
//! ```

use bytes::Bytes;

/// An immutable protocol payload: optional metadata plus data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    /// Metadata bytes, if present.
    pub metadata: Option<Bytes>,
    /// Data bytes (may be empty, never absent).
    pub data: Bytes,
}

impl Payload {
    /// Create a payload with data only.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            metadata: None,
            data: data.into(),
        }
    }

    /// Create a payload with metadata and data.
    pub fn with_metadata(metadata: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        Self {
            metadata: Some(metadata.into()),
            data: data.into(),
        }
    }

    /// Create an empty payload (no metadata, zero-length data).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get a reference to the data bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a reference to the metadata bytes, if present.
    #[inline]
    pub fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }

    /// Check whether metadata is present.
    #[inline]
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Total byte length of metadata (if any) plus data.
    #[inline]
    pub fn len(&self) -> usize {
        self.metadata.as_ref().map_or(0, |m| m.len()) + self.data.len()
    }

    /// Check whether the payload carries no bytes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.data.is_empty()
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<&'static str> for Payload {
    fn from(data: &'static str) -> Self {
        Self::new(Bytes::from_static(data.as_bytes()))
    }
}
