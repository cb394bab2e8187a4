//! Connection core: demultiplexing, lifecycle, and command application.
//!
//! A [`Connection`] owns both stream engines, the SETUP state machine,
//! and the keepalive schedule. All of its methods run on the connection's
//! single execution context (the driver task); application calls arrive
//! as [`Command`]s through the [`CommandSink`], which is the only
//! cross-thread synchronization point. Outbound frames leave through one
//! [`FrameSink`], preserving per-connection ordering.

mod interface;
mod keepalive;
mod requester;
mod responder;
mod setup;

pub use interface::{
    Command, CommandSink, FrameSink, HandlerError, HandlerResult, ResponderHandler,
    StreamReceiver, StreamSender,
};
pub use keepalive::{KeepaliveAction, KeepaliveSchedule};
pub use setup::{validate_setup, ServerSetupOptions, SetupAcceptor, SetupRejection};

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::fragment::{Assembled, FragmentAssembler};
use crate::frame::{error_code, Frame, FrameBody, SetupBody, Version};
use crate::payload::Payload;
use crate::stream_id::{Owner, Role};

use requester::Requester;
use responder::Responder;

/// Callback for frames addressed to unknown or already-terminated
/// streams. Never fatal; the default logs at debug level and drops.
pub type LateFrameHandler = Box<dyn FnMut(&Frame) + Send>;

/// Parameters the client sends in its SETUP frame.
#[derive(Debug, Clone)]
pub struct ClientSetup {
    /// Interval between client keepalives.
    pub keepalive_interval: Duration,
    /// Silence tolerated before the connection is considered dead.
    pub max_lifetime: Duration,
    /// MIME type for metadata payloads.
    pub metadata_mime_type: String,
    /// MIME type for data payloads.
    pub data_mime_type: String,
    /// Payload handed to the server acceptor.
    pub payload: Payload,
}

impl Default for ClientSetup {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(20),
            max_lifetime: Duration::from_secs(90),
            metadata_mime_type: "application/octet-stream".to_string(),
            data_mime_type: "application/octet-stream".to_string(),
            payload: Payload::empty(),
        }
    }
}

impl ClientSetup {
    fn to_frame(&self) -> Frame {
        Frame::new(
            0,
            FrameBody::Setup(SetupBody {
                follows: false,
                version: Version::CURRENT,
                keepalive_interval_ms: self.keepalive_interval.as_millis() as i32,
                max_lifetime_ms: self.max_lifetime.as_millis() as i32,
                resume_token: None,
                lease: false,
                metadata_mime_type: self.metadata_mime_type.clone(),
                data_mime_type: self.data_mime_type.clone(),
                payload: self.payload.clone(),
            }),
        )
    }
}

/// Connection lifecycle state.
enum ConnectionState {
    /// Server side, before a valid SETUP: frames are buffered in arrival
    /// order and replayed once the handshake is accepted.
    AwaitingSetup {
        buffered: Vec<Frame>,
        assembler: FragmentAssembler,
        options: ServerSetupOptions,
    },
    Active,
    Closed,
}

/// The protocol engine for one connection.
pub struct Connection {
    role: Role,
    state: ConnectionState,
    requester: Requester,
    responder: Responder,
    sink: FrameSink,
    keepalive: Option<KeepaliveSchedule>,
    late_frames: LateFrameHandler,
}

impl Connection {
    /// Create the client side: emits SETUP immediately and schedules
    /// keepalives.
    pub fn client(
        setup: ClientSetup,
        handler: Box<dyn ResponderHandler>,
        sink: FrameSink,
        commands: CommandSink,
        now: Instant,
    ) -> Self {
        sink.send(setup.to_frame());
        let keepalive = KeepaliveSchedule::new(setup.keepalive_interval, setup.max_lifetime, now);
        Self {
            role: Role::Client,
            state: ConnectionState::Active,
            requester: Requester::new(Role::Client, sink.clone()),
            responder: Responder::new(handler, sink.clone(), commands),
            sink,
            keepalive: Some(keepalive),
            late_frames: default_late_frame_handler(),
        }
    }

    /// Create the server side: stays in the setup handshake until a valid
    /// SETUP arrives.
    pub fn server(
        options: ServerSetupOptions,
        handler: Box<dyn ResponderHandler>,
        sink: FrameSink,
        commands: CommandSink,
    ) -> Self {
        Self {
            role: Role::Server,
            state: ConnectionState::AwaitingSetup {
                buffered: Vec::new(),
                assembler: FragmentAssembler::new(),
                options,
            },
            requester: Requester::new(Role::Server, sink.clone()),
            responder: Responder::new(handler, sink.clone(), commands),
            sink,
            keepalive: None,
            late_frames: default_late_frame_handler(),
        }
    }

    /// Replace the late-frame collaborator.
    pub fn set_late_frame_handler(&mut self, handler: LateFrameHandler) {
        self.late_frames = handler;
    }

    /// Whether the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    /// Whether the setup handshake has completed.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ConnectionState::Active)
    }

    /// Number of tracked streams across both engines.
    pub fn active_streams(&self) -> usize {
        self.requester.active_streams() + self.responder.active_streams()
    }

    /// Process one inbound frame.
    ///
    /// An error return is fatal: the ERROR frame (if any) has already
    /// been emitted and the connection marked closed; the driver must
    /// stop pumping.
    pub fn on_frame(&mut self, frame: Frame, now: Instant) -> Result<()> {
        if self.is_closed() {
            tracing::debug!("dropping frame received after close");
            return Ok(());
        }

        if let Some(keepalive) = self.keepalive.as_mut() {
            keepalive.note_frame_received(now);
        }

        if let ConnectionState::AwaitingSetup { .. } = self.state {
            return self.on_presetup_frame(frame, now);
        }

        match Role::classify(self.role, frame.stream_id) {
            Owner::Connection => self.on_connection_frame(frame),
            Owner::Requester => match self.requester.on_frame(frame) {
                Ok(None) => Ok(()),
                Ok(Some(late)) => {
                    (self.late_frames)(&late);
                    Ok(())
                }
                Err(error) => self.connection_error(error_code::CONNECTION_ERROR, error),
            },
            Owner::Responder => match self.responder.on_frame(frame) {
                Ok(None) => Ok(()),
                Ok(Some(late)) => {
                    (self.late_frames)(&late);
                    Ok(())
                }
                Err(error) => self.connection_error(error_code::CONNECTION_ERROR, error),
            },
        }
    }

    /// Handle a frame while the setup handshake is still open.
    fn on_presetup_frame(&mut self, frame: Frame, now: Instant) -> Result<()> {
        let ConnectionState::AwaitingSetup {
            buffered,
            assembler,
            options,
        } = &mut self.state
        else {
            unreachable!("checked by caller");
        };

        // The peer may fail the connection before setup completes.
        if frame.stream_id == 0 {
            if let FrameBody::Error(body) = &frame.body {
                let error = Error::PeerError {
                    code: body.code,
                    message: body.message.clone(),
                };
                self.state = ConnectionState::Closed;
                return Err(error);
            }
        }

        // SETUP (and its fragment continuations) feed the assembler;
        // everything else waits for the handshake to finish.
        let feeds_handshake = frame.stream_id == 0
            && (matches!(frame.body, FrameBody::Setup(_))
                || (assembler.is_assembling() && matches!(frame.body, FrameBody::Payload(_))));
        if !feeds_handshake {
            buffered.push(frame);
            return Ok(());
        }

        let setup = match assembler.process(frame) {
            Ok(Assembled::Incomplete) => return Ok(()),
            Ok(Assembled::Complete(frame)) => match frame.body {
                FrameBody::Setup(setup) => setup,
                _ => unreachable!("handshake assembler only sees SETUP sequences"),
            },
            Err(error) => {
                return self.connection_error(error_code::INVALID_SETUP, error);
            }
        };

        if let Err(rejection) = validate_setup(&setup, options) {
            tracing::warn!(code = rejection.code, %rejection.message, "rejecting SETUP");
            self.sink
                .send(Frame::error(0, rejection.code, rejection.message.clone()));
            self.state = ConnectionState::Closed;
            return Err(Error::RejectedSetup(rejection.message));
        }

        tracing::debug!(
            version = %setup.version,
            data_mime = %setup.data_mime_type,
            "SETUP accepted"
        );

        // Install the active demux, then replay the buffer in order.
        let buffered = std::mem::take(buffered);
        self.state = ConnectionState::Active;
        for frame in buffered {
            self.on_frame(frame, now)?;
        }
        Ok(())
    }

    /// Handle a frame addressed to stream 0 on an active connection.
    fn on_connection_frame(&mut self, frame: Frame) -> Result<()> {
        let can_ignore = frame.can_ignore;
        let frame_type = frame.frame_type();
        match frame.body {
            FrameBody::Keepalive(body) => {
                if body.respond {
                    self.sink.send(Frame::keepalive(false, body.data));
                }
                Ok(())
            }
            FrameBody::Error(body) => {
                let error = Error::PeerError {
                    code: body.code,
                    message: body.message.clone(),
                };
                tracing::warn!(code = body.code, message = %body.message, "peer closed connection");
                self.fail_streams(body.code, &body.message);
                self.state = ConnectionState::Closed;
                Err(error)
            }
            FrameBody::MetadataPush(body) => {
                self.responder.metadata_push(body.metadata);
                Ok(())
            }
            FrameBody::Setup(_) => self.violation(can_ignore, "unexpected second SETUP"),
            FrameBody::Lease(_) => self.violation(can_ignore, "lease is not supported"),
            FrameBody::Resume(_) | FrameBody::ResumeOk(_) => {
                if can_ignore {
                    tracing::debug!("ignoring resume frame");
                    return Ok(());
                }
                self.connection_error(
                    error_code::REJECTED_RESUME,
                    Error::Protocol("resumption is not supported".to_string()),
                )
            }
            FrameBody::Ext(body) => {
                if can_ignore {
                    tracing::debug!(
                        extended_type = body.extended_type,
                        "ignoring connection-level extension frame"
                    );
                    return Ok(());
                }
                self.violation(
                    false,
                    format!("unsupported extension type {}", body.extended_type),
                )
            }
            _ => self.violation(can_ignore, format!("{frame_type:?} frame on stream 0")),
        }
    }

    /// Apply a marshalled application command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::FireAndForget { payload, reply } => {
                let _ = reply.send(self.requester.fire_and_forget(payload));
            }
            Command::RequestResponse {
                payload,
                receiver,
                reply,
            } => {
                let _ = reply.send(self.requester.request_response(payload, receiver));
            }
            Command::RequestStream {
                payload,
                initial_request_n,
                receiver,
                reply,
            } => {
                let _ = reply.send(self.requester.request_stream(
                    payload,
                    initial_request_n,
                    receiver,
                ));
            }
            Command::RequestChannel {
                payload,
                initial_request_n,
                complete,
                receiver,
                reply,
            } => {
                let _ = reply.send(self.requester.request_channel(
                    payload,
                    initial_request_n,
                    complete,
                    receiver,
                ));
            }
            Command::SendNext {
                stream_id,
                payload,
                complete,
            } => match Role::classify(self.role, stream_id) {
                Owner::Requester => self.requester.send_next(stream_id, payload, complete),
                Owner::Responder => self.responder.send_next(stream_id, payload, complete),
                Owner::Connection => {}
            },
            Command::SendComplete { stream_id } => match Role::classify(self.role, stream_id) {
                Owner::Requester => self.requester.send_complete(stream_id),
                Owner::Responder => self.responder.send_complete(stream_id),
                Owner::Connection => {}
            },
            Command::SendError {
                stream_id,
                code,
                message,
            } => match Role::classify(self.role, stream_id) {
                Owner::Requester => self.requester.send_error(stream_id, code, &message),
                Owner::Responder => self.responder.send_error(stream_id, code, &message),
                Owner::Connection => {}
            },
            Command::SendCancel { stream_id } => match Role::classify(self.role, stream_id) {
                Owner::Requester => self.requester.cancel(stream_id),
                Owner::Responder => self.responder.cancel(stream_id),
                Owner::Connection => {}
            },
            Command::SendRequestN { stream_id, n } => {
                match Role::classify(self.role, stream_id) {
                    Owner::Requester => self.requester.request_n(stream_id, n),
                    Owner::Responder => self.responder.request_n(stream_id, n),
                    Owner::Connection => {}
                }
            }
            Command::Close => self.close(),
        }
    }

    /// Run a keepalive tick (client side).
    ///
    /// An error return means the peer timed out; the ERROR frame has been
    /// emitted and the connection is closed.
    pub fn on_keepalive_tick(&mut self, now: Instant) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let Some(keepalive) = self.keepalive.as_ref() else {
            return Ok(());
        };

        match keepalive.on_tick(now) {
            KeepaliveAction::SendKeepalive => {
                self.sink.send(Frame::keepalive(true, Bytes::new()));
                Ok(())
            }
            KeepaliveAction::Timeout => {
                let max_lifetime_ms = keepalive.max_lifetime().as_millis() as i64;
                let message = format!(
                    "keepalive timeout: no frame received within {max_lifetime_ms} ms"
                );
                tracing::warn!(%message, "tearing down connection");
                self.sink
                    .send(Frame::error(0, error_code::KEEPALIVE_TIMEOUT, &message));
                self.fail_streams(error_code::KEEPALIVE_TIMEOUT, &message);
                self.state = ConnectionState::Closed;
                Err(Error::KeepaliveTimeout { max_lifetime_ms })
            }
        }
    }

    /// Tear the connection down deliberately: cancel every active stream
    /// and tell the peer the connection is closing.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.requester.close();
        self.responder.close();
        self.sink.send(Frame::error(
            0,
            error_code::CONNECTION_CLOSE,
            "connection closed",
        ));
        self.state = ConnectionState::Closed;
    }

    /// Report an inbound frame the transport layer could not decode.
    ///
    /// The ignorable-frame policy is the caller's: frames whose header
    /// carries IGNORE should be dropped instead of reported here.
    pub fn on_malformed_frame(&mut self, error: Error) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.connection_error(error_code::CONNECTION_ERROR, error)
    }

    /// A protocol violation: fatal unless the offending frame is ignorable.
    fn violation(&mut self, can_ignore: bool, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if can_ignore {
            tracing::debug!(%message, "ignoring protocol violation (IGNORE flag set)");
            return Ok(());
        }
        self.connection_error(error_code::CONNECTION_ERROR, Error::Protocol(message))
    }

    /// Emit ERROR on stream 0, fail every stream, close, and propagate.
    fn connection_error(&mut self, code: u32, error: Error) -> Result<()> {
        let message = error.to_string();
        tracing::warn!(code, %message, "connection error");
        self.sink.send(Frame::error(0, code, &message));
        self.fail_streams(code, &message);
        self.state = ConnectionState::Closed;
        Err(error)
    }

    fn fail_streams(&mut self, code: u32, message: &str) {
        self.requester.fail_streams(code, message);
        self.responder.fail_streams(code, message);
    }
}

fn default_late_frame_handler() -> LateFrameHandler {
    Box::new(|frame| {
        tracing::debug!(
            stream_id = frame.stream_id,
            frame_type = ?frame.frame_type(),
            "dropping late frame"
        );
    })
}
