//! Frame body encoding and decoding.
//!
//! The header type field selects the body codec. Length-prefixed
//! sub-fields use 8-bit (MIME types), 16-bit (resume tokens), or 24-bit
//! (metadata) big-endian prefixes; encoding a value that does not fit its
//! prefix fails instead of truncating. Every codec pair is inverse:
//! `decode(encode(f)) == f` for every constructible frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::payload::Payload;

use super::header::FrameHeader;
use super::types::{
    flags, FrameType, Version, FRAME_HEADER_SIZE, MAX_METADATA_LEN, MAX_MIME_LEN,
    MAX_RESUME_TOKEN_LEN,
};
use super::{
    ErrorBody, ExtBody, Frame, FrameBody, KeepaliveBody, LeaseBody, MetadataPushBody, PayloadBody,
    RequestChannelBody, RequestFnfBody, RequestNBody, RequestResponseBody, RequestStreamBody,
    ResumeBody, ResumeOkBody, SetupBody,
};

impl Frame {
    /// Encode this frame (header + body) into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Fails when a length-prefixed field exceeds its prefix range.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode this frame into an existing buffer.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let mut frame_flags = self.body_flags()?;
        if self.can_ignore {
            frame_flags |= flags::IGNORE;
        }
        let header = FrameHeader::new(self.stream_id, self.frame_type(), frame_flags);
        buf.put_slice(&header.encode());

        match &self.body {
            FrameBody::Setup(b) => encode_setup(buf, b)?,
            FrameBody::Lease(b) => encode_lease(buf, b),
            FrameBody::Keepalive(b) => encode_keepalive(buf, b),
            FrameBody::RequestResponse(b) => encode_payload_fields(buf, &b.payload)?,
            FrameBody::RequestFnf(b) => encode_payload_fields(buf, &b.payload)?,
            FrameBody::RequestStream(b) => {
                buf.put_u32(b.initial_request_n);
                encode_payload_fields(buf, &b.payload)?;
            }
            FrameBody::RequestChannel(b) => {
                buf.put_u32(b.initial_request_n);
                encode_payload_fields(buf, &b.payload)?;
            }
            FrameBody::RequestN(b) => buf.put_u32(b.request_n),
            FrameBody::Cancel => {}
            FrameBody::Payload(b) => encode_payload_fields(buf, &b.payload)?,
            FrameBody::Error(b) => {
                buf.put_u32(b.code);
                buf.put_slice(b.message.as_bytes());
            }
            FrameBody::MetadataPush(b) => buf.put_slice(&b.metadata),
            FrameBody::Resume(b) => {
                buf.put_u16(b.version.major);
                buf.put_u16(b.version.minor);
                put_resume_token(buf, &b.resume_token)?;
                buf.put_u64(b.last_received_server_position);
                buf.put_u64(b.first_available_client_position);
            }
            FrameBody::ResumeOk(b) => buf.put_u64(b.last_received_client_position),
            FrameBody::Ext(b) => {
                buf.put_u32(b.extended_type);
                encode_payload_fields(buf, &b.payload)?;
            }
        }
        Ok(())
    }

    /// Byte length of the encoded frame (header + body).
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.body_len()
    }

    /// Decode a frame from a whole-frame buffer (no transport length prefix).
    ///
    /// # Errors
    ///
    /// Fails on truncated input, unknown frame type, reserved bits, or
    /// out-of-range body fields.
    pub fn decode(buf: &[u8]) -> Result<Frame> {
        let header = FrameHeader::decode(buf)?;
        let mut body = &buf[FRAME_HEADER_SIZE..];

        let decoded = match header.frame_type {
            FrameType::Setup => FrameBody::Setup(decode_setup(&mut body, &header)?),
            FrameType::Lease => FrameBody::Lease(decode_lease(&mut body, &header)?),
            FrameType::Keepalive => FrameBody::Keepalive(decode_keepalive(&mut body, &header)?),
            FrameType::RequestResponse => FrameBody::RequestResponse(RequestResponseBody {
                follows: header.has_flag(flags::FOLLOWS),
                payload: decode_payload_fields(&mut body, &header)?,
            }),
            FrameType::RequestFnf => FrameBody::RequestFnf(RequestFnfBody {
                follows: header.has_flag(flags::FOLLOWS),
                payload: decode_payload_fields(&mut body, &header)?,
            }),
            FrameType::RequestStream => {
                let initial_request_n = decode_request_n(&mut body)?;
                FrameBody::RequestStream(RequestStreamBody {
                    follows: header.has_flag(flags::FOLLOWS),
                    initial_request_n,
                    payload: decode_payload_fields(&mut body, &header)?,
                })
            }
            FrameType::RequestChannel => {
                let initial_request_n = decode_request_n(&mut body)?;
                FrameBody::RequestChannel(RequestChannelBody {
                    follows: header.has_flag(flags::FOLLOWS),
                    complete: header.has_flag(flags::COMPLETE),
                    initial_request_n,
                    payload: decode_payload_fields(&mut body, &header)?,
                })
            }
            FrameType::RequestN => FrameBody::RequestN(RequestNBody {
                request_n: decode_request_n(&mut body)?,
            }),
            FrameType::Cancel => FrameBody::Cancel,
            FrameType::Payload => FrameBody::Payload(PayloadBody {
                follows: header.has_flag(flags::FOLLOWS),
                complete: header.has_flag(flags::COMPLETE),
                next: header.has_flag(flags::NEXT),
                payload: decode_payload_fields(&mut body, &header)?,
            }),
            FrameType::Error => {
                need(body, 4)?;
                let code = body.get_u32();
                let message = String::from_utf8(body.to_vec())
                    .map_err(|_| Error::Protocol("error message is not UTF-8".to_string()))?;
                FrameBody::Error(ErrorBody { code, message })
            }
            FrameType::MetadataPush => FrameBody::MetadataPush(MetadataPushBody {
                metadata: Bytes::copy_from_slice(body),
            }),
            FrameType::Resume => {
                need(body, 4)?;
                let version = Version::new(body.get_u16(), body.get_u16());
                need(body, 2)?;
                let token_len = body.get_u16() as usize;
                need(body, token_len)?;
                let resume_token = Bytes::copy_from_slice(&body[..token_len]);
                body.advance(token_len);
                need(body, 16)?;
                FrameBody::Resume(ResumeBody {
                    version,
                    resume_token,
                    last_received_server_position: body.get_u64(),
                    first_available_client_position: body.get_u64(),
                })
            }
            FrameType::ResumeOk => {
                need(body, 8)?;
                FrameBody::ResumeOk(ResumeOkBody {
                    last_received_client_position: body.get_u64(),
                })
            }
            FrameType::Ext => {
                need(body, 4)?;
                let extended_type = body.get_u32();
                FrameBody::Ext(ExtBody {
                    extended_type,
                    payload: decode_payload_fields(&mut body, &header)?,
                })
            }
        };

        Ok(Frame {
            stream_id: header.stream_id,
            can_ignore: header.can_ignore(),
            body: decoded,
        })
    }

    /// Flags derived from the body (everything except IGNORE).
    fn body_flags(&self) -> Result<u16> {
        let mut f = 0u16;
        match &self.body {
            FrameBody::Setup(b) => {
                if b.follows {
                    f |= flags::SETUP_FOLLOWS;
                }
                if b.resume_token.is_some() {
                    f |= flags::RESUME_ENABLE;
                }
                if b.lease {
                    f |= flags::LEASE;
                }
                if b.payload.has_metadata() {
                    f |= flags::METADATA;
                }
            }
            FrameBody::Lease(b) => {
                if b.metadata.is_some() {
                    f |= flags::METADATA;
                }
            }
            FrameBody::Keepalive(b) => {
                if b.respond {
                    f |= flags::RESPOND;
                }
            }
            FrameBody::RequestResponse(b) => {
                f |= payload_flags(&b.payload, b.follows);
            }
            FrameBody::RequestFnf(b) => {
                f |= payload_flags(&b.payload, b.follows);
            }
            FrameBody::RequestStream(b) => {
                f |= payload_flags(&b.payload, b.follows);
            }
            FrameBody::RequestChannel(b) => {
                f |= payload_flags(&b.payload, b.follows);
                if b.complete {
                    f |= flags::COMPLETE;
                }
            }
            FrameBody::Payload(b) => {
                f |= payload_flags(&b.payload, b.follows);
                if b.complete {
                    f |= flags::COMPLETE;
                }
                if b.next {
                    f |= flags::NEXT;
                }
            }
            FrameBody::MetadataPush(_) => {
                f |= flags::METADATA;
            }
            FrameBody::Ext(b) => {
                if b.payload.has_metadata() {
                    f |= flags::METADATA;
                }
            }
            FrameBody::RequestN(_)
            | FrameBody::Cancel
            | FrameBody::Error(_)
            | FrameBody::Resume(_)
            | FrameBody::ResumeOk(_) => {}
        }
        Ok(f)
    }

    /// Byte length of the body alone.
    fn body_len(&self) -> usize {
        match &self.body {
            FrameBody::Setup(b) => {
                let mut len = 2 + 2 + 4 + 4; // version + keepalive + lifetime
                if let Some(token) = &b.resume_token {
                    len += 2 + token.len();
                }
                len += 1 + b.metadata_mime_type.len();
                len += 1 + b.data_mime_type.len();
                len + payload_fields_len(&b.payload)
            }
            FrameBody::Lease(b) => 4 + 4 + b.metadata.as_ref().map_or(0, |m| m.len()),
            FrameBody::Keepalive(b) => 8 + b.data.len(),
            FrameBody::RequestResponse(b) => payload_fields_len(&b.payload),
            FrameBody::RequestFnf(b) => payload_fields_len(&b.payload),
            FrameBody::RequestStream(b) => 4 + payload_fields_len(&b.payload),
            FrameBody::RequestChannel(b) => 4 + payload_fields_len(&b.payload),
            FrameBody::RequestN(_) => 4,
            FrameBody::Cancel => 0,
            FrameBody::Payload(b) => payload_fields_len(&b.payload),
            FrameBody::Error(b) => 4 + b.message.len(),
            FrameBody::MetadataPush(b) => b.metadata.len(),
            FrameBody::Resume(b) => 2 + 2 + 2 + b.resume_token.len() + 8 + 8,
            FrameBody::ResumeOk(_) => 8,
            FrameBody::Ext(b) => 4 + payload_fields_len(&b.payload),
        }
    }
}

/// METADATA flag plus FOLLOWS for payload-carrying bodies.
fn payload_flags(payload: &Payload, follows: bool) -> u16 {
    let mut f = 0;
    if payload.has_metadata() {
        f |= flags::METADATA;
    }
    if follows {
        f |= flags::FOLLOWS;
    }
    f
}

/// Length of `[u24 metadata length][metadata]?[data]`.
fn payload_fields_len(payload: &Payload) -> usize {
    let meta = payload
        .metadata
        .as_ref()
        .map_or(0, |m| 3 + m.len());
    meta + payload.data.len()
}

/// Encode metadata (u24 length prefix, when present) followed by data.
fn encode_payload_fields(buf: &mut BytesMut, payload: &Payload) -> Result<()> {
    if let Some(metadata) = &payload.metadata {
        if metadata.len() > MAX_METADATA_LEN {
            return Err(Error::FieldTooLong {
                field: "metadata",
                len: metadata.len(),
                max: MAX_METADATA_LEN,
            });
        }
        buf.put_uint(metadata.len() as u64, 3);
        buf.put_slice(metadata);
    }
    buf.put_slice(&payload.data);
    Ok(())
}

/// Decode metadata (iff the METADATA flag is set) followed by data-to-end.
fn decode_payload_fields(body: &mut &[u8], header: &FrameHeader) -> Result<Payload> {
    let metadata = if header.has_metadata() {
        need(body, 3)?;
        let len = body.get_uint(3) as usize;
        need(body, len)?;
        let metadata = Bytes::copy_from_slice(&body[..len]);
        body.advance(len);
        Some(metadata)
    } else {
        None
    };
    let data = Bytes::copy_from_slice(body);
    *body = &[];
    Ok(Payload { metadata, data })
}

fn encode_setup(buf: &mut BytesMut, b: &SetupBody) -> Result<()> {
    buf.put_u16(b.version.major);
    buf.put_u16(b.version.minor);
    buf.put_i32(b.keepalive_interval_ms);
    buf.put_i32(b.max_lifetime_ms);
    put_resume_token_opt(buf, &b.resume_token)?;
    put_mime(buf, &b.metadata_mime_type)?;
    put_mime(buf, &b.data_mime_type)?;
    encode_payload_fields(buf, &b.payload)
}

fn decode_setup(body: &mut &[u8], header: &FrameHeader) -> Result<SetupBody> {
    need(body, 12)?;
    let version = Version::new(body.get_u16(), body.get_u16());
    let keepalive_interval_ms = body.get_i32();
    let max_lifetime_ms = body.get_i32();

    let resume_token = if header.has_flag(flags::RESUME_ENABLE) {
        need(body, 2)?;
        let len = body.get_u16() as usize;
        need(body, len)?;
        let token = Bytes::copy_from_slice(&body[..len]);
        body.advance(len);
        Some(token)
    } else {
        None
    };

    let metadata_mime_type = get_mime(body)?;
    let data_mime_type = get_mime(body)?;
    let payload = decode_payload_fields(body, header)?;

    Ok(SetupBody {
        follows: header.has_flag(flags::SETUP_FOLLOWS),
        version,
        keepalive_interval_ms,
        max_lifetime_ms,
        resume_token,
        lease: header.has_flag(flags::LEASE),
        metadata_mime_type,
        data_mime_type,
        payload,
    })
}

fn encode_lease(buf: &mut BytesMut, b: &LeaseBody) {
    buf.put_i32(b.time_to_live_ms);
    buf.put_i32(b.number_of_requests);
    if let Some(metadata) = &b.metadata {
        buf.put_slice(metadata);
    }
}

fn decode_lease(body: &mut &[u8], header: &FrameHeader) -> Result<LeaseBody> {
    need(body, 8)?;
    let time_to_live_ms = body.get_i32();
    let number_of_requests = body.get_i32();
    let metadata = if header.has_metadata() {
        Some(Bytes::copy_from_slice(body))
    } else {
        None
    };
    *body = &[];
    Ok(LeaseBody {
        time_to_live_ms,
        number_of_requests,
        metadata,
    })
}

fn encode_keepalive(buf: &mut BytesMut, b: &KeepaliveBody) {
    buf.put_u64(b.last_received_position);
    buf.put_slice(&b.data);
}

fn decode_keepalive(body: &mut &[u8], header: &FrameHeader) -> Result<KeepaliveBody> {
    need(body, 8)?;
    let last_received_position = body.get_u64();
    let data = Bytes::copy_from_slice(body);
    *body = &[];
    Ok(KeepaliveBody {
        respond: header.has_flag(flags::RESPOND),
        last_received_position,
        data,
    })
}

/// Decode a request-n field: 31-bit positive integer.
fn decode_request_n(body: &mut &[u8]) -> Result<u32> {
    need(body, 4)?;
    let n = body.get_u32();
    if n == 0 || n > i32::MAX as u32 {
        return Err(Error::Protocol(format!(
            "request n must be a positive 31-bit value, got {n}"
        )));
    }
    Ok(n)
}

fn put_mime(buf: &mut BytesMut, mime: &str) -> Result<()> {
    if mime.len() > MAX_MIME_LEN {
        return Err(Error::FieldTooLong {
            field: "MIME type",
            len: mime.len(),
            max: MAX_MIME_LEN,
        });
    }
    buf.put_u8(mime.len() as u8);
    buf.put_slice(mime.as_bytes());
    Ok(())
}

fn get_mime(body: &mut &[u8]) -> Result<String> {
    need(body, 1)?;
    let len = body.get_u8() as usize;
    need(body, len)?;
    let mime = std::str::from_utf8(&body[..len])
        .map_err(|_| Error::Protocol("MIME type is not US-ASCII".to_string()))?
        .to_string();
    body.advance(len);
    Ok(mime)
}

fn put_resume_token_opt(buf: &mut BytesMut, token: &Option<Bytes>) -> Result<()> {
    if let Some(token) = token {
        put_resume_token(buf, token)?;
    }
    Ok(())
}

fn put_resume_token(buf: &mut BytesMut, token: &Bytes) -> Result<()> {
    if token.len() > MAX_RESUME_TOKEN_LEN {
        return Err(Error::FieldTooLong {
            field: "resume token",
            len: token.len(),
            max: MAX_RESUME_TOKEN_LEN,
        });
    }
    buf.put_u16(token.len() as u16);
    buf.put_slice(token);
    Ok(())
}

#[inline]
fn need(body: &[u8], n: usize) -> Result<()> {
    if body.len() < n {
        return Err(Error::FrameTooSmall {
            needed: n,
            have: body.len(),
        });
    }
    Ok(())
}
