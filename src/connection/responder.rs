//! Responder stream engine.
//!
//! Owns the responder side of every remotely initiated interaction. The
//! first frame of a new stream (reassembled first, if fragmented) is
//! dispatched by kind to the application [`ResponderHandler`]; the
//! handler receives a [`StreamSender`] output adapter and returns the
//! stream object that subsequent frames are forwarded to directly,
//! bypassing handler dispatch.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::fragment::{Assembled, FragmentAssembler};
use crate::frame::{Frame, FrameBody};
use crate::payload::Payload;
use crate::termination::{terminating_event, Side, TerminationBehavior, TerminationEvent};

use super::interface::{
    CommandSink, FrameSink, HandlerResult, ResponderHandler, StreamReceiver, StreamSender,
};

/// One tracked responder-side stream.
struct ResponderStream {
    receiver: Box<dyn StreamReceiver>,
    termination: TerminationBehavior,
    assembler: FragmentAssembler,
}

/// The responder side of a connection.
pub(crate) struct Responder {
    handler: Box<dyn ResponderHandler>,
    streams: HashMap<u32, ResponderStream>,
    /// Fragmented initial requests still being reassembled, pre-dispatch.
    assembling: HashMap<u32, FragmentAssembler>,
    sink: FrameSink,
    commands: CommandSink,
}

impl Responder {
    pub(crate) fn new(
        handler: Box<dyn ResponderHandler>,
        sink: FrameSink,
        commands: CommandSink,
    ) -> Self {
        Self {
            handler,
            streams: HashMap::new(),
            assembling: HashMap::new(),
            sink,
            commands,
        }
    }

    /// Number of currently tracked streams.
    pub(crate) fn active_streams(&self) -> usize {
        self.streams.len()
    }

    /// Process an inbound frame addressed to a responder-owned stream ID.
    ///
    /// Returns `Ok(Some(frame))` for late frames: a non-request frame for
    /// a stream this engine is not (or no longer) tracking.
    pub(crate) fn on_frame(&mut self, frame: Frame) -> Result<Option<Frame>> {
        let stream_id = frame.stream_id;
        let can_ignore = frame.can_ignore;

        // Active stream: forward directly, bypassing handler dispatch.
        if self.streams.contains_key(&stream_id) {
            return self.forward(stream_id, frame, can_ignore);
        }

        // Mid-assembly of a fragmented initial request.
        if let Some(assembler) = self.assembling.get_mut(&stream_id) {
            match assembler.process(frame) {
                Ok(Assembled::Incomplete) => return Ok(None),
                Ok(Assembled::Complete(request)) => {
                    self.assembling.remove(&stream_id);
                    self.dispatch(request);
                    return Ok(None);
                }
                Err(error) => {
                    if can_ignore {
                        tracing::debug!(stream_id, %error, "ignoring undeliverable fragment");
                        return Ok(None);
                    }
                    return Err(error);
                }
            }
        }

        // Unseen stream: only a request frame may open it.
        if !frame.frame_type().is_request() {
            return Ok(Some(frame));
        }

        if frame.follows() {
            let mut assembler = FragmentAssembler::new();
            match assembler.process(frame) {
                Ok(Assembled::Incomplete) => {
                    self.assembling.insert(stream_id, assembler);
                }
                Ok(Assembled::Complete(request)) => self.dispatch(request),
                Err(error) => return Err(error),
            }
        } else {
            self.dispatch(frame);
        }
        Ok(None)
    }

    /// Forward a frame to an already-active stream.
    fn forward(&mut self, stream_id: u32, frame: Frame, can_ignore: bool) -> Result<Option<Frame>> {
        let stream = self.streams.get_mut(&stream_id).expect("checked by caller");

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
            Some(event) => stream.termination.on_event(Side::Requester, event),
            None => false,
        };
        if fully_terminated {
            self.streams.remove(&stream_id);
        }
        Ok(None)
    }

    /// Dispatch an assembled initial request to the application handler.
    fn dispatch(&mut self, request: Frame) {
        let stream_id = request.stream_id;
        match request.body {
            FrameBody::RequestFnf(body) => {
                // No response path; nothing is registered.
                self.handler.fire_and_forget(body.payload);
            }
            FrameBody::RequestResponse(body) => {
                let output = StreamSender::new(stream_id, self.commands.clone());
                let result = self.handler.request_response(body.payload, output);
                self.register(stream_id, result, TerminationBehavior::request_response(), None);
            }
            FrameBody::RequestStream(body) => {
                let output = StreamSender::new(stream_id, self.commands.clone());
                let result =
                    self.handler
                        .request_stream(body.payload, body.initial_request_n, output);
                self.register(stream_id, result, TerminationBehavior::request_stream(), None);
            }
            FrameBody::RequestChannel(body) => {
                let output = StreamSender::new(stream_id, self.commands.clone());
                let result = self.handler.request_channel(
                    body.payload,
                    body.initial_request_n,
                    body.complete,
                    output,
                );
                let initial_event = body.complete.then_some(TerminationEvent::Complete);
                self.register(
                    stream_id,
                    result,
                    TerminationBehavior::channel(),
                    initial_event,
                );
            }
            other => unreachable!("dispatch called for non-request body {other:?}"),
        }
    }

    /// Register the handler's stream object, or surface its refusal.
    fn register(
        &mut self,
        stream_id: u32,
        result: HandlerResult,
        mut termination: TerminationBehavior,
        initial_event: Option<TerminationEvent>,
    ) {
        match result {
            Ok(receiver) => {
                // A channel whose requester completed with the initial
                // frame starts half-terminated.
                if let Some(event) = initial_event {
                    if termination.on_event(Side::Requester, event) {
                        return;
                    }
                }
                self.streams.insert(
                    stream_id,
                    ResponderStream {
                        receiver,
                        termination,
                        assembler: FragmentAssembler::new(),
                    },
                );
            }
            Err(refusal) => {
                tracing::debug!(stream_id, ?refusal, "handler refused request");
                self.sink
                    .send(Frame::error(stream_id, refusal.code(), refusal.message()));
            }
        }
    }

    /// Emit a payload element from the responder side.
    pub(crate) fn send_next(&mut self, stream_id: u32, payload: Payload, complete: bool) {
        if self.streams.contains_key(&stream_id) {
            self.sink
                .send(Frame::payload_next(stream_id, payload, complete));
            if complete {
                self.local_event(stream_id, TerminationEvent::Complete);
            }
        }
    }

    /// Complete the responder side without a final element.
    pub(crate) fn send_complete(&mut self, stream_id: u32) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::payload_complete(stream_id));
            self.local_event(stream_id, TerminationEvent::Complete);
        }
    }

    /// Fail the stream (application error).
    pub(crate) fn send_error(&mut self, stream_id: u32, code: u32, message: &str) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::error(stream_id, code, message));
            self.local_event(stream_id, TerminationEvent::Error);
        }
    }

    /// Cancel the requester's side (channel upstream cancellation).
    pub(crate) fn cancel(&mut self, stream_id: u32) {
        if self.streams.contains_key(&stream_id) {
            self.sink.send(Frame::cancel(stream_id));
            self.local_event(stream_id, TerminationEvent::Cancel);
        }
    }

    /// Grant the requester `n` more credits (channel upstream flow control).
    pub(crate) fn request_n(&mut self, stream_id: u32, n: u32) {
        if self.streams.contains_key(&stream_id) && n > 0 && n <= i32::MAX as u32 {
            self.sink.send(Frame::request_n(stream_id, n));
        }
    }

    /// Connection-scoped metadata arrived.
    pub(crate) fn metadata_push(&mut self, metadata: Bytes) {
        self.handler.metadata_push(metadata);
    }

    /// Apply a locally originated terminating event.
    fn local_event(&mut self, stream_id: u32, event: TerminationEvent) {
        let fully_terminated = match self.streams.get_mut(&stream_id) {
            Some(stream) => stream.termination.on_event(Side::Responder, event),
            None => return,
        };
        if fully_terminated {
            self.streams.remove(&stream_id);
        }
    }

    /// Tear the engine down: cancel every still-active stream.
    pub(crate) fn close(&mut self) {
        for (stream_id, _) in self.streams.drain() {
            self.sink.send(Frame::cancel(stream_id));
        }
        self.assembling.clear();
    }

    /// Fail every tracked stream (connection-level error).
    pub(crate) fn fail_streams(&mut self, code: u32, message: &str) {
        for (_, mut stream) in self.streams.drain() {
            stream.receiver.on_error(code, message);
        }
        self.assembling.clear();
    }
}

/// Translate an assembled frame into stream-object callbacks.
fn deliver(stream: &mut ResponderStream, frame: Frame, can_ignore: bool) -> Result<()> {
    let frame_type = frame.frame_type();
    match frame.body {
        FrameBody::Payload(body) => {
            if body.next {
                stream.receiver.on_next(body.payload, body.complete);
            } else if body.complete {
                stream.receiver.on_complete();
            }
        }
        FrameBody::Cancel => stream.receiver.on_cancel(),
        FrameBody::Error(body) => stream.receiver.on_error(body.code, &body.message),
        FrameBody::RequestN(body) => stream.receiver.on_request_n(body.request_n),
        FrameBody::Ext(body) => {
            stream
                .receiver
                .on_extension(body.extended_type, body.payload, can_ignore)
        }
        _ => {
            if can_ignore {
                tracing::debug!("ignoring unexpected {frame_type:?} frame on responder stream");
            } else {
                return Err(Error::Protocol(format!(
                    "unexpected {frame_type:?} frame on responder-owned stream"
                )));
            }
        }
    }
    Ok(())
}
