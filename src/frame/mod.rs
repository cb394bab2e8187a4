//! Frame model - wire header, typed bodies, codec, and transport framing.
//!
//! A [`Frame`] is one unit of the protocol: a stream ID, the IGNORE bit,
//! and a type-specific body. The remaining header flags (METADATA,
//! FOLLOWS, COMPLETE, NEXT, RESPOND, ...) are derived from the body on
//! encode and folded back into it on decode, so a `Frame` is always
//! internally consistent and `decode(encode(f)) == f` holds structurally.

mod buffer;
mod codec;
mod header;
mod types;

pub use buffer::{length_prefix, FrameBuffer};
pub use header::FrameHeader;
pub use types::{
    error_code, flags, FrameType, Version, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE,
    LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, MAX_METADATA_LEN, MAX_MIME_LEN, MAX_RESUME_TOKEN_LEN,
    MAX_STREAM_ID, MIN_FRAGMENT_SIZE,
};

use bytes::Bytes;

use crate::payload::Payload;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream identifier (0 = the connection itself).
    pub stream_id: u32,
    /// IGNORE flag: drop rather than error when this frame cannot be handled.
    pub can_ignore: bool,
    /// Type-specific body.
    pub body: FrameBody,
}

/// Type-specific frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Setup(SetupBody),
    Lease(LeaseBody),
    Keepalive(KeepaliveBody),
    RequestResponse(RequestResponseBody),
    RequestFnf(RequestFnfBody),
    RequestStream(RequestStreamBody),
    RequestChannel(RequestChannelBody),
    RequestN(RequestNBody),
    Cancel,
    Payload(PayloadBody),
    Error(ErrorBody),
    MetadataPush(MetadataPushBody),
    Resume(ResumeBody),
    ResumeOk(ResumeOkBody),
    Ext(ExtBody),
}

/// SETUP frame body: connection parameter negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupBody {
    /// More fragments of this SETUP follow.
    pub follows: bool,
    /// Protocol version the client speaks.
    pub version: Version,
    /// Interval between client keepalives, milliseconds (positive).
    pub keepalive_interval_ms: i32,
    /// Silence tolerated before the connection is considered dead, milliseconds (positive).
    pub max_lifetime_ms: i32,
    /// Resume token; presence means the client wants resumption (unsupported here).
    pub resume_token: Option<Bytes>,
    /// Client requests lease semantics (unsupported here).
    pub lease: bool,
    /// MIME type for metadata payloads (US-ASCII).
    pub metadata_mime_type: String,
    /// MIME type for data payloads (US-ASCII).
    pub data_mime_type: String,
    /// Setup payload handed to the server acceptor.
    pub payload: Payload,
}

/// LEASE frame body (decodable only; lease semantics are unsupported).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseBody {
    /// Validity of the lease, milliseconds.
    pub time_to_live_ms: i32,
    /// Number of requests granted.
    pub number_of_requests: i32,
    /// Optional lease metadata (no length prefix; extends to frame end).
    pub metadata: Option<Bytes>,
}

/// KEEPALIVE frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepaliveBody {
    /// Receiver must answer with a KEEPALIVE of its own.
    pub respond: bool,
    /// Resume position (always 0 here; resumption is unsupported).
    pub last_received_position: u64,
    /// Opaque data echoed back by the responder.
    pub data: Bytes,
}

/// REQUEST_RESPONSE frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResponseBody {
    /// More fragments of this request follow.
    pub follows: bool,
    pub payload: Payload,
}

/// REQUEST_FNF frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFnfBody {
    /// More fragments of this request follow.
    pub follows: bool,
    pub payload: Payload,
}

/// REQUEST_STREAM frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStreamBody {
    /// More fragments of this request follow.
    pub follows: bool,
    /// Initial credit (positive).
    pub initial_request_n: u32,
    pub payload: Payload,
}

/// REQUEST_CHANNEL frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestChannelBody {
    /// More fragments of this request follow.
    pub follows: bool,
    /// The requester completes its side with this very frame.
    pub complete: bool,
    /// Initial credit (positive).
    pub initial_request_n: u32,
    pub payload: Payload,
}

/// REQUEST_N frame body: additional credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestNBody {
    /// Credit granted (positive).
    pub request_n: u32,
}

/// PAYLOAD frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadBody {
    /// More fragments of this logical payload follow.
    pub follows: bool,
    /// The sending side completes with this frame.
    pub complete: bool,
    /// The frame carries a next element (unset = fragment continuation).
    pub next: bool,
    pub payload: Payload,
}

/// ERROR frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// Wire error code (see [`error_code`]).
    pub code: u32,
    /// UTF-8 error message.
    pub message: String,
}

/// METADATA_PUSH frame body: connection-scoped metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPushBody {
    pub metadata: Bytes,
}

/// RESUME frame body (decodable only; resumption is unsupported).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeBody {
    pub version: Version,
    pub resume_token: Bytes,
    pub last_received_server_position: u64,
    pub first_available_client_position: u64,
}

/// RESUME_OK frame body (decodable only; resumption is unsupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeOkBody {
    pub last_received_client_position: u64,
}

/// EXT frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtBody {
    /// Extended type discriminator.
    pub extended_type: u32,
    pub payload: Payload,
}

impl Frame {
    /// Create a frame with the IGNORE flag unset.
    pub fn new(stream_id: u32, body: FrameBody) -> Self {
        Self {
            stream_id,
            can_ignore: false,
            body,
        }
    }

    /// Create a frame with the IGNORE flag set.
    pub fn ignorable(stream_id: u32, body: FrameBody) -> Self {
        Self {
            stream_id,
            can_ignore: true,
            body,
        }
    }

    /// Get the frame type of this frame's body.
    pub fn frame_type(&self) -> FrameType {
        match &self.body {
            FrameBody::Setup(_) => FrameType::Setup,
            FrameBody::Lease(_) => FrameType::Lease,
            FrameBody::Keepalive(_) => FrameType::Keepalive,
            FrameBody::RequestResponse(_) => FrameType::RequestResponse,
            FrameBody::RequestFnf(_) => FrameType::RequestFnf,
            FrameBody::RequestStream(_) => FrameType::RequestStream,
            FrameBody::RequestChannel(_) => FrameType::RequestChannel,
            FrameBody::RequestN(_) => FrameType::RequestN,
            FrameBody::Cancel => FrameType::Cancel,
            FrameBody::Payload(_) => FrameType::Payload,
            FrameBody::Error(_) => FrameType::Error,
            FrameBody::MetadataPush(_) => FrameType::MetadataPush,
            FrameBody::Resume(_) => FrameType::Resume,
            FrameBody::ResumeOk(_) => FrameType::ResumeOk,
            FrameBody::Ext(_) => FrameType::Ext,
        }
    }

    /// Check whether more fragments of this logical frame follow.
    pub fn follows(&self) -> bool {
        match &self.body {
            FrameBody::Setup(b) => b.follows,
            FrameBody::RequestResponse(b) => b.follows,
            FrameBody::RequestFnf(b) => b.follows,
            FrameBody::RequestStream(b) => b.follows,
            FrameBody::RequestChannel(b) => b.follows,
            FrameBody::Payload(b) => b.follows,
            _ => false,
        }
    }

    /// Get the payload carried by this frame, if its type has one.
    pub fn payload(&self) -> Option<&Payload> {
        match &self.body {
            FrameBody::Setup(b) => Some(&b.payload),
            FrameBody::RequestResponse(b) => Some(&b.payload),
            FrameBody::RequestFnf(b) => Some(&b.payload),
            FrameBody::RequestStream(b) => Some(&b.payload),
            FrameBody::RequestChannel(b) => Some(&b.payload),
            FrameBody::Payload(b) => Some(&b.payload),
            FrameBody::Ext(b) => Some(&b.payload),
            _ => None,
        }
    }

    // Convenience constructors used by the engines.

    /// Build a REQUEST_FNF frame.
    pub fn request_fnf(stream_id: u32, payload: Payload) -> Self {
        Self::new(
            stream_id,
            FrameBody::RequestFnf(RequestFnfBody {
                follows: false,
                payload,
            }),
        )
    }

    /// Build a REQUEST_RESPONSE frame.
    pub fn request_response(stream_id: u32, payload: Payload) -> Self {
        Self::new(
            stream_id,
            FrameBody::RequestResponse(RequestResponseBody {
                follows: false,
                payload,
            }),
        )
    }

    /// Build a REQUEST_STREAM frame.
    pub fn request_stream(stream_id: u32, initial_request_n: u32, payload: Payload) -> Self {
        Self::new(
            stream_id,
            FrameBody::RequestStream(RequestStreamBody {
                follows: false,
                initial_request_n,
                payload,
            }),
        )
    }

    /// Build a REQUEST_CHANNEL frame.
    pub fn request_channel(
        stream_id: u32,
        initial_request_n: u32,
        complete: bool,
        payload: Payload,
    ) -> Self {
        Self::new(
            stream_id,
            FrameBody::RequestChannel(RequestChannelBody {
                follows: false,
                complete,
                initial_request_n,
                payload,
            }),
        )
    }

    /// Build a PAYLOAD frame carrying a next element.
    pub fn payload_next(stream_id: u32, payload: Payload, complete: bool) -> Self {
        Self::new(
            stream_id,
            FrameBody::Payload(PayloadBody {
                follows: false,
                complete,
                next: true,
                payload,
            }),
        )
    }

    /// Build a PAYLOAD frame signalling completion without an element.
    pub fn payload_complete(stream_id: u32) -> Self {
        Self::new(
            stream_id,
            FrameBody::Payload(PayloadBody {
                follows: false,
                complete: true,
                next: false,
                payload: Payload::empty(),
            }),
        )
    }

    /// Build a CANCEL frame.
    pub fn cancel(stream_id: u32) -> Self {
        Self::new(stream_id, FrameBody::Cancel)
    }

    /// Build a REQUEST_N frame.
    pub fn request_n(stream_id: u32, request_n: u32) -> Self {
        Self::new(stream_id, FrameBody::RequestN(RequestNBody { request_n }))
    }

    /// Build an ERROR frame.
    pub fn error(stream_id: u32, code: u32, message: impl Into<String>) -> Self {
        Self::new(
            stream_id,
            FrameBody::Error(ErrorBody {
                code,
                message: message.into(),
            }),
        )
    }

    /// Build a KEEPALIVE frame.
    pub fn keepalive(respond: bool, data: Bytes) -> Self {
        Self::new(
            0,
            FrameBody::Keepalive(KeepaliveBody {
                respond,
                last_received_position: 0,
                data,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type_accessor() {
        assert_eq!(Frame::cancel(1).frame_type(), FrameType::Cancel);
        assert_eq!(
            Frame::request_n(1, 10).frame_type(),
            FrameType::RequestN
        );
        assert_eq!(
            Frame::request_stream(3, 5, Payload::empty()).frame_type(),
            FrameType::RequestStream
        );
    }

    #[test]
    fn test_follows_accessor() {
        let mut frame = Frame::request_response(1, Payload::from("x"));
        assert!(!frame.follows());
        if let FrameBody::RequestResponse(b) = &mut frame.body {
            b.follows = true;
        }
        assert!(frame.follows());

        assert!(!Frame::cancel(1).follows());
    }

    #[test]
    fn test_payload_accessor() {
        let frame = Frame::payload_next(5, Payload::from("item"), false);
        assert_eq!(frame.payload().unwrap().data(), b"item");
        assert!(Frame::cancel(5).payload().is_none());
    }

    #[test]
    fn test_payload_complete_carries_no_element() {
        let frame = Frame::payload_complete(9);
        match &frame.body {
            FrameBody::Payload(b) => {
                assert!(b.complete);
                assert!(!b.next);
                assert!(!b.follows);
                assert!(b.payload.is_empty());
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_ignorable_constructor() {
        let frame = Frame::ignorable(0, FrameBody::Cancel);
        assert!(frame.can_ignore);
        assert!(!Frame::cancel(0).can_ignore);
    }
}
