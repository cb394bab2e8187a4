//! Well-known MIME type table.
//!
//! The protocol registry assigns one-byte identifiers to common MIME
//! types so metadata can reference them compactly. The table is
//! process-wide and immutable: the forward direction is a static sorted
//! array, the reverse direction a map built once on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Well-known MIME types, sorted by identifier.
static WELL_KNOWN_MIME_TYPES: &[(u8, &str)] = &[
    (0x00, "application/avro"),
    (0x01, "application/cbor"),
    (0x02, "application/graphql"),
    (0x03, "application/gzip"),
    (0x04, "application/javascript"),
    (0x05, "application/json"),
    (0x06, "application/octet-stream"),
    (0x07, "application/pdf"),
    (0x08, "application/vnd.apache.thrift.binary"),
    (0x09, "application/vnd.google.protobuf"),
    (0x0A, "application/xml"),
    (0x0B, "application/zip"),
    (0x0C, "audio/aac"),
    (0x0D, "audio/mp3"),
    (0x0E, "audio/mp4"),
    (0x0F, "audio/mpeg3"),
    (0x10, "audio/mpeg"),
    (0x11, "audio/ogg"),
    (0x12, "audio/opus"),
    (0x13, "audio/vorbis"),
    (0x14, "image/bmp"),
    (0x15, "image/gif"),
    (0x16, "image/heic-sequence"),
    (0x17, "image/heic"),
    (0x18, "image/heif-sequence"),
    (0x19, "image/heif"),
    (0x1A, "image/jpeg"),
    (0x1B, "image/png"),
    (0x1C, "image/tiff"),
    (0x1D, "multipart/mixed"),
    (0x1E, "text/css"),
    (0x1F, "text/csv"),
    (0x20, "text/html"),
    (0x21, "text/plain"),
    (0x22, "text/xml"),
    (0x23, "video/H264"),
    (0x24, "video/H265"),
    (0x25, "video/VP8"),
    (0x7A, "message/x.rsocket.mime-type.v0"),
    (0x7B, "message/x.rsocket.accept-mime-types.v0"),
    (0x7C, "message/x.rsocket.authentication.v0"),
    (0x7D, "message/x.rsocket.tracing-zipkin.v0"),
    (0x7E, "message/x.rsocket.routing.v0"),
    (0x7F, "message/x.rsocket.composite-metadata.v0"),
];

fn reverse_table() -> &'static HashMap<&'static str, u8> {
    static REVERSE: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();
    REVERSE.get_or_init(|| {
        WELL_KNOWN_MIME_TYPES
            .iter()
            .map(|&(id, name)| (name, id))
            .collect()
    })
}

/// Look up the canonical string for a well-known MIME identifier.
pub fn well_known_mime_name(id: u8) -> Option<&'static str> {
    WELL_KNOWN_MIME_TYPES
        .binary_search_by_key(&id, |&(id, _)| id)
        .ok()
        .map(|index| WELL_KNOWN_MIME_TYPES[index].1)
}

/// Look up the identifier for a well-known MIME type string.
pub fn well_known_mime_id(name: &str) -> Option<u8> {
    reverse_table().get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_by_id() {
        for pair in WELL_KNOWN_MIME_TYPES.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn test_forward_lookup() {
        assert_eq!(well_known_mime_name(0x05), Some("application/json"));
        assert_eq!(well_known_mime_name(0x06), Some("application/octet-stream"));
        assert_eq!(well_known_mime_name(0x7E), Some("message/x.rsocket.routing.v0"));
        assert_eq!(well_known_mime_name(0x50), None);
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(well_known_mime_id("application/json"), Some(0x05));
        assert_eq!(well_known_mime_id("text/plain"), Some(0x21));
        assert_eq!(well_known_mime_id("application/x-unregistered"), None);
    }

    #[test]
    fn test_bidirectional_consistency() {
        for &(id, name) in WELL_KNOWN_MIME_TYPES {
            assert_eq!(well_known_mime_name(id), Some(name));
            assert_eq!(well_known_mime_id(name), Some(id));
        }
    }
}
