//! Splitting logical frames into bounded fragments.

use bytes::Bytes;

use crate::frame::{Frame, FrameBody, PayloadBody, FRAME_HEADER_SIZE, MIN_FRAGMENT_SIZE};
use crate::payload::Payload;

/// Byte cost of a metadata chunk's 24-bit length prefix.
const METADATA_PREFIX_SIZE: usize = 3;

/// Split a logical frame into fragments no larger than `max_frame_size`.
///
/// Frames that fit, and frame types that cannot fragment, pass through as
/// a single element. The initial fragment keeps the original frame type
/// and its fixed fields; continuations are PAYLOAD frames with the NEXT
/// flag unset. Every fragment except the last carries FOLLOWS; the
/// original completion flag travels on the last fragment. Metadata is
/// consumed before data, so reassembly never sees metadata after data.
///
/// # Panics
///
/// Panics if `max_frame_size` is below [`MIN_FRAGMENT_SIZE`].
pub fn split_frame(frame: Frame, max_frame_size: usize) -> Vec<Frame> {
    assert!(
        max_frame_size >= MIN_FRAGMENT_SIZE,
        "maximum frame size {max_frame_size} below minimum fragment size {MIN_FRAGMENT_SIZE}"
    );

    if !frame.frame_type().can_fragment() || frame.encoded_len() <= max_frame_size {
        return vec![frame];
    }

    let stream_id = frame.stream_id;
    let can_ignore = frame.can_ignore;

    // Peel the payload off; everything else is the per-fragment overhead.
    let (payload, rebuild) = split_parts(frame.body);
    let mut metadata = payload.metadata;
    let mut data = payload.data;

    // A fragment that carries (part of) the metadata also pays for its
    // length prefix; a cleared Option marks the metadata as fully consumed.
    let mut fragments = Vec::new();

    // Initial fragment: original type, fixed fields included in overhead.
    let initial_overhead = FRAME_HEADER_SIZE + rebuild.fixed_len;
    let chunk = take_chunk(
        &mut metadata,
        &mut data,
        max_frame_size.saturating_sub(initial_overhead),
    );
    let more = metadata.is_some() || !data.is_empty();
    fragments.push(Frame {
        stream_id,
        can_ignore,
        body: rebuild.build(chunk, more),
    });

    // Continuation fragments: PAYLOAD with NEXT unset.
    while metadata.is_some() || !data.is_empty() {
        let budget = max_frame_size - FRAME_HEADER_SIZE;
        let chunk = take_chunk(&mut metadata, &mut data, budget);
        let more = metadata.is_some() || !data.is_empty();
        fragments.push(Frame {
            stream_id,
            can_ignore,
            body: FrameBody::Payload(PayloadBody {
                follows: more,
                complete: !more && rebuild.complete,
                next: false,
                payload: chunk,
            }),
        });
    }

    fragments
}

/// Take up to `budget` payload bytes, metadata first.
fn take_chunk(metadata: &mut Option<Bytes>, data: &mut Bytes, budget: usize) -> Payload {
    let mut remaining = budget;
    let mut chunk_metadata = None;
    if let Some(bytes) = metadata.as_mut() {
        // No room for even the prefix pushes all metadata to the next fragment.
        if remaining > METADATA_PREFIX_SIZE {
            remaining -= METADATA_PREFIX_SIZE;
            let take = remaining.min(bytes.len());
            chunk_metadata = Some(bytes.split_to(take));
            remaining -= take;
            let exhausted = bytes.is_empty();
            if exhausted {
                *metadata = None;
            }
        }
    }

    // Only start on data once the metadata is fully consumed, so a later
    // fragment never has to carry metadata after data has begun.
    let chunk_data = if metadata.is_none() && remaining > 0 {
        data.split_to(remaining.min(data.len()))
    } else {
        Bytes::new()
    };

    Payload {
        metadata: chunk_metadata,
        data: chunk_data,
    }
}

/// How to rebuild the initial fragment's body around a payload chunk.
struct Rebuild {
    /// Encoded length of the body's fixed fields (excluding payload).
    fixed_len: usize,
    /// Completion flag of the original frame (travels on the last fragment).
    complete: bool,
    build_fn: BuildFn,
}

enum BuildFn {
    Setup(Box<crate::frame::SetupBody>),
    RequestResponse,
    RequestFnf,
    RequestStream { initial_request_n: u32 },
    RequestChannel { initial_request_n: u32 },
    Payload,
}

impl Rebuild {
    fn build(&self, payload: Payload, more: bool) -> FrameBody {
        match &self.build_fn {
            BuildFn::Setup(setup) => {
                let mut body = (**setup).clone();
                body.follows = more;
                body.payload = payload;
                FrameBody::Setup(body)
            }
            BuildFn::RequestResponse => FrameBody::RequestResponse(crate::frame::RequestResponseBody {
                follows: more,
                payload,
            }),
            BuildFn::RequestFnf => FrameBody::RequestFnf(crate::frame::RequestFnfBody {
                follows: more,
                payload,
            }),
            BuildFn::RequestStream { initial_request_n } => {
                FrameBody::RequestStream(crate::frame::RequestStreamBody {
                    follows: more,
                    initial_request_n: *initial_request_n,
                    payload,
                })
            }
            BuildFn::RequestChannel { initial_request_n } => {
                FrameBody::RequestChannel(crate::frame::RequestChannelBody {
                    follows: more,
                    complete: !more && self.complete,
                    initial_request_n: *initial_request_n,
                    payload,
                })
            }
            BuildFn::Payload => FrameBody::Payload(PayloadBody {
                follows: more,
                complete: !more && self.complete,
                next: true,
                payload,
            }),
        }
    }
}

/// Separate a fragmentable body into its payload and a rebuilder.
fn split_parts(body: FrameBody) -> (Payload, Rebuild) {
    match body {
        FrameBody::Setup(mut setup) => {
            let payload = std::mem::take(&mut setup.payload);
            let fixed_len = 12
                + setup.resume_token.as_ref().map_or(0, |t| 2 + t.len())
                + 1
                + setup.metadata_mime_type.len()
                + 1
                + setup.data_mime_type.len();
            (
                payload,
                Rebuild {
                    fixed_len,
                    complete: false,
                    build_fn: BuildFn::Setup(Box::new(setup)),
                },
            )
        }
        FrameBody::RequestResponse(b) => (
            b.payload,
            Rebuild {
                fixed_len: 0,
                complete: false,
                build_fn: BuildFn::RequestResponse,
            },
        ),
        FrameBody::RequestFnf(b) => (
            b.payload,
            Rebuild {
                fixed_len: 0,
                complete: false,
                build_fn: BuildFn::RequestFnf,
            },
        ),
        FrameBody::RequestStream(b) => (
            b.payload,
            Rebuild {
                fixed_len: 4,
                complete: false,
                build_fn: BuildFn::RequestStream {
                    initial_request_n: b.initial_request_n,
                },
            },
        ),
        FrameBody::RequestChannel(b) => (
            b.payload,
            Rebuild {
                fixed_len: 4,
                complete: b.complete,
                build_fn: BuildFn::RequestChannel {
                    initial_request_n: b.initial_request_n,
                },
            },
        ),
        FrameBody::Payload(b) => (
            b.payload,
            Rebuild {
                fixed_len: 0,
                complete: b.complete,
                build_fn: BuildFn::Payload,
            },
        ),
        other => unreachable!("split_parts called for non-fragmentable body {other:?}"),
    }
}
