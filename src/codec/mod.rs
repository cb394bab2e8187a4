//! Codec module - serialization/deserialization for payload data.
//!
//! The protocol engine treats payload metadata and data as opaque bytes;
//! these codecs are the application-layer convenience for producing them:
//!
//! - [`RawCodec`] - pass-through for raw bytes (zero-copy)
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named` for
//!   cross-language struct-as-map compatibility)
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait
//! objects: codec selection is a compile-time decision, and the raw path
//! stays zero-copy.
//!
//! # Example
//!
//! ```
//! use streamwire::codec::{MsgPackCodec, RawCodec};
//! use streamwire::Payload;
//!
//! let payload = Payload::new(MsgPackCodec::encode(&"hello").unwrap());
//! let decoded: String = MsgPackCodec::decode(payload.data()).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let raw = RawCodec::encode(b"binary data");
//! assert_eq!(RawCodec::decode(&raw), b"binary data");
//! ```

mod msgpack;
mod raw;

pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;
