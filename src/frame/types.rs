//! Frame type codes, flag bits, error codes, and wire limits.
//!
//! Frame type codes and error codes follow the RSocket 1.0 registry.
//! Flags occupy the low 10 bits of the header's second word; which bits
//! are meaningful depends on the frame type.

use crate::error::{Error, Result};

/// Size of the fixed frame header in bytes (4-byte stream ID + 2-byte type/flags).
pub const FRAME_HEADER_SIZE: usize = 6;

/// Size of the transport length prefix in bytes (24-bit big endian).
pub const LENGTH_PREFIX_SIZE: usize = 3;

/// Maximum frame size representable by the 24-bit transport length prefix.
pub const MAX_FRAME_SIZE: usize = 0xFF_FFFF;

/// Default maximum frame size (the u24 ceiling, ~16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = MAX_FRAME_SIZE;

/// Smallest maximum-frame-size a splitter will accept.
pub const MIN_FRAGMENT_SIZE: usize = 64;

/// Maximum stream ID value (31 bits, top header bit is reserved).
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

/// Maximum metadata length (24-bit length prefix).
pub const MAX_METADATA_LEN: usize = 0xFF_FFFF;

/// Maximum MIME type string length (8-bit length prefix).
pub const MAX_MIME_LEN: usize = 0xFF;

/// Maximum resume token length (16-bit length prefix).
pub const MAX_RESUME_TOKEN_LEN: usize = 0xFFFF;

/// Frame type discriminator (6 bits in the header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Connection setup (client to server, first frame).
    Setup = 0x01,
    /// Lease grant (unsupported, decodable only).
    Lease = 0x02,
    /// Liveness probe / reply.
    Keepalive = 0x03,
    /// Single-response request.
    RequestResponse = 0x04,
    /// Fire-and-forget request.
    RequestFnf = 0x05,
    /// Stream request with initial credit.
    RequestStream = 0x06,
    /// Bidirectional channel request with initial credit.
    RequestChannel = 0x07,
    /// Additional credit grant.
    RequestN = 0x08,
    /// Requester cancellation.
    Cancel = 0x09,
    /// Stream payload (next / complete / fragment continuation).
    Payload = 0x0A,
    /// Stream- or connection-scoped error.
    Error = 0x0B,
    /// Connection-scoped metadata.
    MetadataPush = 0x0C,
    /// Resumption request (unsupported, decodable only).
    Resume = 0x0D,
    /// Resumption acknowledgment (unsupported, decodable only).
    ResumeOk = 0x0E,
    /// Extension frame with an extended type code.
    Ext = 0x3F,
}

impl FrameType {
    /// Decode a 6-bit type code.
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0x01 => Self::Setup,
            0x02 => Self::Lease,
            0x03 => Self::Keepalive,
            0x04 => Self::RequestResponse,
            0x05 => Self::RequestFnf,
            0x06 => Self::RequestStream,
            0x07 => Self::RequestChannel,
            0x08 => Self::RequestN,
            0x09 => Self::Cancel,
            0x0A => Self::Payload,
            0x0B => Self::Error,
            0x0C => Self::MetadataPush,
            0x0D => Self::Resume,
            0x0E => Self::ResumeOk,
            0x3F => Self::Ext,
            other => return Err(Error::UnknownFrameType(other)),
        })
    }

    /// Get the 6-bit wire code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Check whether this type may start a new logical unit of fragments.
    ///
    /// These are the only types that may carry the FOLLOWS flag.
    #[inline]
    pub fn can_fragment(self) -> bool {
        matches!(
            self,
            Self::Setup
                | Self::RequestResponse
                | Self::RequestFnf
                | Self::RequestStream
                | Self::RequestChannel
                | Self::Payload
        )
    }

    /// Check whether this type is one of the four request frames.
    #[inline]
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::RequestResponse | Self::RequestFnf | Self::RequestStream | Self::RequestChannel
        )
    }
}

/// Flag bit constants (10 bits, type-specific except IGNORE and METADATA).
pub mod flags {
    /// Ignore: drop rather than error when the frame cannot be handled.
    pub const IGNORE: u16 = 0b10_0000_0000;
    /// Metadata present.
    pub const METADATA: u16 = 0b01_0000_0000;
    /// More fragments of this logical frame follow (fragmentable types).
    pub const FOLLOWS: u16 = 0b00_1000_0000;
    /// SETUP: client intends to resume (unsupported here).
    pub const RESUME_ENABLE: u16 = 0b00_1000_0000;
    /// SETUP: client requests lease semantics (unsupported here).
    pub const LEASE: u16 = 0b00_0100_0000;
    /// SETUP: more fragments follow (0x80 means resume-enable on SETUP).
    pub const SETUP_FOLLOWS: u16 = 0b00_0010_0000;
    /// KEEPALIVE: receiver must reply with a KEEPALIVE.
    pub const RESPOND: u16 = 0b00_1000_0000;
    /// PAYLOAD / REQUEST_CHANNEL: completion of the sending side.
    pub const COMPLETE: u16 = 0b00_0100_0000;
    /// PAYLOAD: frame carries a next element.
    pub const NEXT: u16 = 0b00_0010_0000;

    /// Mask of the 10 bits available for flags.
    pub const MASK: u16 = 0b11_1111_1111;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u16, flag: u16) -> bool {
        flags & flag != 0
    }
}

/// Wire error codes (ERROR frame body), per the RSocket registry.
pub mod error_code {
    /// SETUP was malformed or carried invalid parameters.
    pub const INVALID_SETUP: u32 = 0x0000_0001;
    /// SETUP requested semantics the responder does not support.
    pub const UNSUPPORTED_SETUP: u32 = 0x0000_0002;
    /// SETUP was valid but the responder rejected it.
    pub const REJECTED_SETUP: u32 = 0x0000_0003;
    /// RESUME was rejected (resumption is unsupported here).
    pub const REJECTED_RESUME: u32 = 0x0000_0004;
    /// Connection-level protocol violation; the connection is torn down.
    pub const CONNECTION_ERROR: u32 = 0x0000_0101;
    /// The connection is being closed deliberately.
    pub const CONNECTION_CLOSE: u32 = 0x0000_0102;
    /// Application-level failure, scoped to one stream.
    pub const APPLICATION_ERROR: u32 = 0x0000_0201;
    /// The responder has no implementation for this request kind.
    pub const REJECTED: u32 = 0x0000_0202;
    /// The responder cancelled the request before completing it.
    pub const CANCELED: u32 = 0x0000_0203;
    /// The request was invalid for the stream's state.
    pub const INVALID: u32 = 0x0000_0204;
    /// No frame received within the negotiated maximum lifetime.
    ///
    /// Code taken from the range the registry reserves for extension use,
    /// so liveness failures are distinguishable from protocol violations.
    pub const KEEPALIVE_TIMEOUT: u32 = 0x0000_0301;
}

/// Protocol version carried by SETUP and RESUME frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Major version (u16 on the wire).
    pub major: u16,
    /// Minor version (u16 on the wire).
    pub minor: u16,
}

impl Version {
    /// The protocol version this engine speaks.
    pub const CURRENT: Version = Version { major: 1, minor: 0 };

    /// Create a version.
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
