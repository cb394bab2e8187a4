//! Reassembly of fragmented logical frames.

use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::frame::{Frame, FrameBody};
use crate::payload::Payload;

/// Outcome of feeding one wire frame to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    /// A whole logical frame (the input itself, or the reassembly result).
    Complete(Frame),
    /// The fragment was absorbed; more are expected.
    Incomplete,
}

/// Per-stream reassembly state machine.
///
/// States are `no-assembly` (`current == None`) and `assembling`. A frame
/// that can start a new logical unit (SETUP, the four request frames, or
/// a PAYLOAD with NEXT) either passes through, or opens an assembly when
/// it carries FOLLOWS. PAYLOAD frames without NEXT extend the open
/// assembly. Everything else passes through, and is a protocol error
/// while an assembly is open.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    current: Option<Assembly>,
}

#[derive(Debug)]
struct Assembly {
    /// The initial fragment; supplies the frame type and fixed fields.
    initial: Frame,
    metadata: BytesMut,
    /// Whether any fragment so far carried metadata.
    metadata_present: bool,
    data: BytesMut,
    /// Once data bytes have been seen, further metadata is a violation.
    data_started: bool,
    /// Last-seen completion flag.
    complete: bool,
}

impl FragmentAssembler {
    /// Create an assembler in the `no-assembly` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a reassembly is in progress.
    #[inline]
    pub fn is_assembling(&self) -> bool {
        self.current.is_some()
    }

    /// Feed one wire frame; returns the completed logical frame when the
    /// sequence closes.
    ///
    /// # Errors
    ///
    /// Protocol errors on: a new initial frame while assembling, a
    /// continuation with nothing to extend, a non-fragment frame while
    /// assembling, or metadata arriving after data.
    pub fn process(&mut self, frame: Frame) -> Result<Assembled> {
        if starts_logical_unit(&frame) {
            if self.current.is_some() {
                return Err(Error::Protocol(
                    "current set of fragments is not complete".to_string(),
                ));
            }
            if !frame.follows() {
                return Ok(Assembled::Complete(frame));
            }

            let payload = frame.payload().cloned().unwrap_or_default();
            let complete = completion_flag(&frame);
            self.current = Some(Assembly {
                metadata_present: payload.has_metadata(),
                metadata: payload
                    .metadata
                    .as_deref()
                    .map(BytesMut::from)
                    .unwrap_or_default(),
                data_started: !payload.data.is_empty(),
                data: BytesMut::from(&payload.data[..]),
                complete,
                initial: frame,
            });
            return Ok(Assembled::Incomplete);
        }

        if let FrameBody::Payload(body) = &frame.body {
            // NEXT unset: a pure fragment continuation.
            if !body.next {
                let Some(assembly) = self.current.as_mut() else {
                    return Err(Error::Protocol(
                        "no current set of fragments to extend".to_string(),
                    ));
                };

                if let Some(metadata) = &body.payload.metadata {
                    if assembly.data_started {
                        return Err(Error::Protocol(
                            "fragment supplies metadata after data has started".to_string(),
                        ));
                    }
                    assembly.metadata_present = true;
                    assembly.metadata.extend_from_slice(metadata);
                }
                if !body.payload.data.is_empty() {
                    assembly.data_started = true;
                    assembly.data.extend_from_slice(&body.payload.data);
                }
                assembly.complete = body.complete;

                if body.follows {
                    return Ok(Assembled::Incomplete);
                }
                let assembly = self.current.take().expect("assembly checked above");
                return Ok(Assembled::Complete(assembly.finish()));
            }
        }

        // Non-fragment frame types pass through, but never mid-assembly.
        if self.current.is_some() {
            return Err(Error::Protocol(format!(
                "{:?} frame received while fragments are outstanding",
                frame.frame_type()
            )));
        }
        Ok(Assembled::Complete(frame))
    }

    /// Drop any in-progress assembly.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl Assembly {
    /// Rebuild the logical frame from the initial fragment and the
    /// accumulated payload.
    fn finish(self) -> Frame {
        let payload = Payload {
            metadata: self.metadata_present.then(|| self.metadata.freeze()),
            data: self.data.freeze(),
        };
        let complete = self.complete;

        let mut frame = self.initial;
        match &mut frame.body {
            FrameBody::Setup(b) => {
                b.follows = false;
                b.payload = payload;
            }
            FrameBody::RequestResponse(b) => {
                b.follows = false;
                b.payload = payload;
            }
            FrameBody::RequestFnf(b) => {
                b.follows = false;
                b.payload = payload;
            }
            FrameBody::RequestStream(b) => {
                b.follows = false;
                b.payload = payload;
            }
            FrameBody::RequestChannel(b) => {
                b.follows = false;
                b.complete = complete;
                b.payload = payload;
            }
            FrameBody::Payload(b) => {
                b.follows = false;
                b.complete = complete;
                b.payload = payload;
            }
            other => unreachable!("assembly opened for non-fragmentable body {other:?}"),
        }
        frame
    }
}

/// Frame types that may start a new logical unit of fragments.
fn starts_logical_unit(frame: &Frame) -> bool {
    match &frame.body {
        FrameBody::Setup(_)
        | FrameBody::RequestResponse(_)
        | FrameBody::RequestFnf(_)
        | FrameBody::RequestStream(_)
        | FrameBody::RequestChannel(_) => true,
        FrameBody::Payload(b) => b.next,
        _ => false,
    }
}

/// Completion flag of an initial fragment, where its type has one.
fn completion_flag(frame: &Frame) -> bool {
    match &frame.body {
        FrameBody::RequestChannel(b) => b.complete,
        FrameBody::Payload(b) => b.complete,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::frame::{PayloadBody, RequestFnfBody};

    fn continuation(stream_id: u32, payload: Payload, follows: bool, complete: bool) -> Frame {
        Frame::new(
            stream_id,
            FrameBody::Payload(PayloadBody {
                follows,
                complete,
                next: false,
                payload,
            }),
        )
    }

    #[test]
    fn test_unfragmented_frame_passes_through() {
        let mut assembler = FragmentAssembler::new();
        let frame = Frame::request_response(1, Payload::from("whole"));

        let result = assembler.process(frame.clone()).unwrap();
        assert_eq!(result, Assembled::Complete(frame));
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_two_fragment_reassembly() {
        let mut assembler = FragmentAssembler::new();

        let initial = Frame::new(
            1,
            FrameBody::RequestFnf(RequestFnfBody {
                follows: true,
                payload: Payload::new(Bytes::from_static(b"first-")),
            }),
        );
        assert_eq!(
            assembler.process(initial).unwrap(),
            Assembled::Incomplete
        );
        assert!(assembler.is_assembling());

        let result = assembler
            .process(continuation(1, Payload::from("second"), false, false))
            .unwrap();

        let expected = Frame::request_fnf(1, Payload::from("first-second"));
        assert_eq!(result, Assembled::Complete(expected));
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_metadata_concatenation_before_data() {
        let mut assembler = FragmentAssembler::new();

        let initial = Frame::new(
            3,
            FrameBody::Payload(PayloadBody {
                follows: true,
                complete: false,
                next: true,
                payload: Payload::with_metadata(Bytes::from_static(b"me"), Bytes::new()),
            }),
        );
        assembler.process(initial).unwrap();

        assembler
            .process(continuation(
                3,
                Payload::with_metadata(Bytes::from_static(b"ta"), Bytes::from_static(b"da")),
                true,
                false,
            ))
            .unwrap();

        let result = assembler
            .process(continuation(3, Payload::from("ta"), false, true))
            .unwrap();

        let expected = Frame::payload_next(
            3,
            Payload::with_metadata(Bytes::from_static(b"meta"), Bytes::from_static(b"data")),
            true,
        );
        assert_eq!(result, Assembled::Complete(expected));
    }

    #[test]
    fn test_metadata_after_data_rejected() {
        let mut assembler = FragmentAssembler::new();

        let initial = Frame::new(
            5,
            FrameBody::Payload(PayloadBody {
                follows: true,
                complete: false,
                next: true,
                payload: Payload::new(Bytes::from_static(b"data")),
            }),
        );
        assembler.process(initial).unwrap();

        let result = assembler.process(continuation(
            5,
            Payload::with_metadata(Bytes::from_static(b"late"), Bytes::new()),
            false,
            false,
        ));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_new_initial_while_assembling_rejected() {
        let mut assembler = FragmentAssembler::new();

        let initial = Frame::new(
            7,
            FrameBody::RequestFnf(RequestFnfBody {
                follows: true,
                payload: Payload::empty(),
            }),
        );
        assembler.process(initial).unwrap();

        let result = assembler.process(Frame::request_response(7, Payload::empty()));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_continuation_without_assembly_rejected() {
        let mut assembler = FragmentAssembler::new();
        let result = assembler.process(continuation(9, Payload::from("orphan"), false, false));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_other_frame_types_pass_through_when_idle() {
        let mut assembler = FragmentAssembler::new();
        for frame in [
            Frame::cancel(1),
            Frame::request_n(1, 5),
            Frame::error(1, 0x0201, "oops"),
            Frame::keepalive(true, Bytes::new()),
        ] {
            assert_eq!(
                assembler.process(frame.clone()).unwrap(),
                Assembled::Complete(frame)
            );
        }
    }

    #[test]
    fn test_other_frame_types_rejected_mid_assembly() {
        let mut assembler = FragmentAssembler::new();
        let initial = Frame::new(
            11,
            FrameBody::RequestFnf(RequestFnfBody {
                follows: true,
                payload: Payload::empty(),
            }),
        );
        assembler.process(initial).unwrap();

        let result = assembler.process(Frame::cancel(11));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_completion_flag_taken_from_last_fragment() {
        let mut assembler = FragmentAssembler::new();

        let initial = Frame::new(
            13,
            FrameBody::Payload(PayloadBody {
                follows: true,
                complete: false,
                next: true,
                payload: Payload::from("a"),
            }),
        );
        assembler.process(initial).unwrap();

        let result = assembler
            .process(continuation(13, Payload::from("b"), false, true))
            .unwrap();

        match result {
            Assembled::Complete(frame) => match frame.body {
                FrameBody::Payload(b) => {
                    assert!(b.complete);
                    assert!(b.next);
                    assert_eq!(b.payload.data(), b"ab");
                }
                other => panic!("unexpected body {other:?}"),
            },
            Assembled::Incomplete => panic!("expected completion"),
        }
    }

    #[test]
    fn test_clear_resets_state() {
        let mut assembler = FragmentAssembler::new();
        let initial = Frame::new(
            15,
            FrameBody::RequestFnf(RequestFnfBody {
                follows: true,
                payload: Payload::empty(),
            }),
        );
        assembler.process(initial).unwrap();
        assert!(assembler.is_assembling());

        assembler.clear();
        assert!(!assembler.is_assembling());
    }
}
