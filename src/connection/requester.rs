//! Requester stream engine.
//!
//! Owns the requester side of every locally initiated interaction:
//! translates application calls into outbound frames and inbound frames
//! into [`StreamReceiver`] callbacks. Streams are tracked in a table
//! keyed by stream ID; entries hold no back-pointers and are dropped in
//! the same pass that removes them from the table.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::fragment::{Assembled, FragmentAssembler};
use crate::frame::{Frame, FrameBody};
use crate::payload::Payload;
use crate::stream_id::{Role, StreamIdGenerator};
use crate::termination::{terminating_event, Side, TerminationBehavior, TerminationEvent};

use super::interface::{FrameSink, StreamReceiver};

/// One tracked requester-side stream.
struct RequesterStream {
    receiver: Box<dyn StreamReceiver>,
    termination: TerminationBehavior,
    assembler: FragmentAssembler,
}

/// The requester side of a connection.
pub(crate) struct Requester {
    generator: StreamIdGenerator,
    streams: HashMap<u32, RequesterStream>,
    sink: FrameSink,
}

impl Requester {
    pub(crate) fn new(role: Role, sink: FrameSink) -> Self {
        Self {
            generator: StreamIdGenerator::new(role),
            streams: HashMap::new(),
            sink,
        }
    }

    /// Number of currently tracked streams.
    pub(crate) fn active_streams(&self) -> usize {
        self.streams.len()
    }

    fn allocate(&mut self) -> Result<u32> {
        self.generator.next().ok_or(Error::StreamIdsExhausted)
    }

    /// Send a fire-and-forget request; nothing is tracked.
    pub(crate) fn fire_and_forget(&mut self, payload: Payload) -> Result<()> {
        let stream_id = self.allocate()?;
        self.sink.send(Frame::request_fnf(stream_id, payload));
        Ok(())
    }

    /// Start a request-response exchange; returns the stream ID.
    pub(crate) fn request_response(
        &mut self,
        payload: Payload,
        receiver: Box<dyn StreamReceiver>,
    ) -> Result<u32> {
        let stream_id = self.allocate()?;
        self.track(stream_id, receiver, TerminationBehavior::request_response());
        self.sink.send(Frame::request_response(stream_id, payload));
        Ok(stream_id)
    }

    /// Start a request-stream exchange with the given initial credit.
    pub(crate) fn request_stream(
        &mut self,
        payload: Payload,
        initial_request_n: u32,
        receiver: Box<dyn StreamReceiver>,
    ) -> Result<u32> {
        check_request_n(initial_request_n)?;
        let stream_id = self.allocate()?;
        self.track(stream_id, receiver, TerminationBehavior::request_stream());
        self.sink
            .send(Frame::request_stream(stream_id, initial_request_n, payload));
        Ok(stream_id)
    }

    /// Start a request-channel exchange. `complete` marks the requester
    /// side as already finished with this initial frame.
    pub(crate) fn request_channel(
        &mut self,
        payload: Payload,
        initial_request_n: u32,
        complete: bool,
        receiver: Box<dyn StreamReceiver>,
    ) -> Result<u32> {
        check_request_n(initial_request_n)?;
        let stream_id = self.allocate()?;
        self.track(stream_id, receiver, TerminationBehavior::channel());
        self.sink.send(Frame::request_channel(
            stream_id,
            initial_request_n,
            complete,
            payload,
        ));
        if complete {
            self.local_event(stream_id, TerminationEvent::Complete);
        }
        Ok(stream_id)
    }

    fn track(
        &mut self,
        stream_id: u32,
        receiver: Box<dyn StreamReceiver>,
        termination: TerminationBehavior,
    ) {
        self.streams.insert(
            stream_id,
            RequesterStream {
                receiver,
                termination,
                assembler: FragmentAssembler::new(),
            },
        );
    }

    /// Cancel a tracked stream: CANCEL frame, immediate deregistration.
    pub(crate) fn cancel(&mut self, stream_id: u32) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::cancel(stream_id));
            self.local_event(stream_id, TerminationEvent::Cancel);
        }
    }

    /// Grant the responder `n` more credits.
    pub(crate) fn request_n(&mut self, stream_id: u32, n: u32) {
        if self.streams.contains_key(&stream_id) && check_request_n(n).is_ok() {
            self.sink.send(Frame::request_n(stream_id, n));
        }
    }

    /// Send a channel element from the requester side.
    pub(crate) fn send_next(&mut self, stream_id: u32, payload: Payload, complete: bool) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::payload_next(stream_id, payload, complete));
            if complete {
                self.local_event(stream_id, TerminationEvent::Complete);
            }
        }
    }

    /// Complete the requester side of a channel without a final element.
    pub(crate) fn send_complete(&mut self, stream_id: u32) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::payload_complete(stream_id));
            self.local_event(stream_id, TerminationEvent::Complete);
        }
    }

    /// Fail a stream from the requester side.
    pub(crate) fn send_error(&mut self, stream_id: u32, code: u32, message: &str) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::error(stream_id, code, message));
            self.local_event(stream_id, TerminationEvent::Error);
        }
    }

    /// Apply a locally originated terminating event.
    fn local_event(&mut self, stream_id: u32, event: TerminationEvent) {
        let fully_terminated = match self.streams.get_mut(&stream_id) {
            Some(stream) => stream.termination.on_event(Side::Requester, event),
            None => return,
        };
        if fully_terminated {
            self.streams.remove(&stream_id);
        }
    }

    /// Process an inbound frame addressed to a requester-owned stream ID.
    ///
    /// Returns `Ok(Some(frame))` when the stream is untracked (a late
    /// frame for the connection's late-frame collaborator). A protocol
    /// violation on a non-ignorable frame is returned as an error; the
    /// connection escalates it to a connection error.
    pub(crate) fn on_frame(&mut self, frame: Frame) -> Result<Option<Frame>> {
        let stream_id = frame.stream_id;
        let can_ignore = frame.can_ignore;

        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return Ok(Some(frame));
        };

        let assembled = match stream.assembler.process(frame) {
            Ok(Assembled::Complete(frame)) => frame,
            Ok(Assembled::Incomplete) => return Ok(None),
            Err(error) => {
                if can_ignore {
                    tracing::debug!(stream_id, %error, "ignoring undeliverable fragment");
                    return Ok(None);
                }
                return Err(error);
            }
        };

        let event = terminating_event(&assembled);
        deliver(stream, assembled, can_ignore)?;

        let fully_terminated = match event {
            Some(event) => stream.termination.on_event(Side::Responder, event),
            None => false,
        };
        if fully_terminated {
            self.streams.remove(&stream_id);
        }
        Ok(None)
    }

    /// Tear the engine down: cancel every still-active stream.
    pub(crate) fn close(&mut self) {
        for (stream_id, _) in self.streams.drain() {
            self.sink.send(Frame::cancel(stream_id));
        }
    }

    /// Fail every tracked stream (connection-level error).
    pub(crate) fn fail_streams(&mut self, code: u32, message: &str) {
        for (_, mut stream) in self.streams.drain() {
            stream.receiver.on_error(code, message);
        }
    }
}

/// Translate an assembled frame into receiver callbacks.
fn deliver(stream: &mut RequesterStream, frame: Frame, can_ignore: bool) -> Result<()> {
    let frame_type = frame.frame_type();
    match frame.body {
        FrameBody::Payload(body) => {
            if body.next {
                stream.receiver.on_next(body.payload, body.complete);
            } else if body.complete {
                stream.receiver.on_complete();
            }
        }
        FrameBody::Error(body) => stream.receiver.on_error(body.code, &body.message),
        FrameBody::Cancel => stream.receiver.on_cancel(),
        FrameBody::RequestN(body) => stream.receiver.on_request_n(body.request_n),
        FrameBody::Ext(body) => {
            stream
                .receiver
                .on_extension(body.extended_type, body.payload, can_ignore)
        }
        _ => {
            if can_ignore {
                tracing::debug!("ignoring unexpected {frame_type:?} frame on requester stream");
            } else {
                return Err(Error::Protocol(format!(
                    "unexpected {frame_type:?} frame on requester-owned stream"
                )));
            }
        }
    }
    Ok(())
}

fn check_request_n(n: u32) -> Result<()> {
    if n == 0 || n > i32::MAX as u32 {
        return Err(Error::Protocol(format!(
            "request n must be a positive 31-bit value, got {n}"
        )));
    }
    Ok(())
}
