//! Boundary types between the engine and its collaborators.
//!
//! Three seams, per the protocol core's contract:
//! - [`FrameSink`]: the single outbound path to the transport; splits
//!   oversized frames and preserves per-connection ordering.
//! - [`StreamReceiver`] / [`ResponderHandler`]: the application-facing
//!   event interfaces for each interaction model.
//! - [`CommandSink`] / [`Command`]: marshals application calls onto the
//!   connection's execution context (the only cross-thread
//!   synchronization point) before any shared state is touched.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::fragment::split_frame;
use crate::frame::{error_code, Frame};
use crate::payload::Payload;

/// Outbound frame sink shared by both stream engines.
///
/// Frames whose encoded size exceeds the connection's maximum frame size
/// are split into fragments before they are enqueued, so the writer task
/// only ever sees wire-sized frames, in per-connection order.
#[derive(Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<Frame>,
    max_frame_size: usize,
}

impl FrameSink {
    /// Create a sink and the receiver the writer side drains.
    pub fn channel(max_frame_size: usize) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, max_frame_size }, rx)
    }

    /// Enqueue a logical frame, splitting it if oversized.
    ///
    /// A closed receiver means the connection is shutting down; the frame
    /// is dropped silently, matching the fire-and-forget send contract.
    pub fn send(&self, frame: Frame) {
        for fragment in split_frame(frame, self.max_frame_size) {
            if self.tx.send(fragment).is_err() {
                tracing::debug!("outbound sink closed; dropping frame");
                return;
            }
        }
    }

    /// The maximum frame size this sink splits to.
    #[inline]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

/// Application-facing events for one stream, delivered by the engines.
///
/// `on_next`, `on_complete`, and `on_error` are the primary signals; the
/// remaining members have no-op defaults because not every interaction
/// model produces them.
pub trait StreamReceiver: Send {
    /// A payload element arrived; `is_completion` folds a final element
    /// and completion into one call.
    fn on_next(&mut self, payload: Payload, is_completion: bool);

    /// The peer completed its side without a final element.
    fn on_complete(&mut self);

    /// The peer failed the stream.
    fn on_error(&mut self, code: u32, message: &str);

    /// The peer cancelled the stream.
    fn on_cancel(&mut self) {}

    /// The peer granted `n` more credits.
    fn on_request_n(&mut self, n: u32) {
        let _ = n;
    }

    /// An extension frame arrived for this stream.
    fn on_extension(&mut self, extended_type: u32, payload: Payload, can_ignore: bool) {
        let _ = (extended_type, payload, can_ignore);
    }
}

/// Why a responder handler refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// No implementation for this request kind.
    Rejected(String),
    /// The handler itself failed.
    Application(String),
}

impl HandlerError {
    /// The wire error code this failure maps to.
    pub(crate) fn code(&self) -> u32 {
        match self {
            Self::Rejected(_) => error_code::REJECTED,
            Self::Application(_) => error_code::APPLICATION_ERROR,
        }
    }

    pub(crate) fn message(&self) -> &str {
        match self {
            Self::Rejected(message) | Self::Application(message) => message,
        }
    }
}

/// Result of dispatching a request to the application handler: the stream
/// object that will receive the requester's subsequent events.
pub type HandlerResult = std::result::Result<Box<dyn StreamReceiver>, HandlerError>;

/// Application handler for remotely initiated interactions.
///
/// Every method except `fire_and_forget` receives a [`StreamSender`] for
/// producing outbound events and returns the [`StreamReceiver`] that gets
/// the requester's follow-up events (cancel, request-n, and for channels
/// the inbound elements). The defaults reject, so a partial handler
/// surfaces `ERROR[REJECTED]` for the kinds it does not implement.
pub trait ResponderHandler: Send {
    /// A fire-and-forget request; there is no response path.
    fn fire_and_forget(&mut self, payload: Payload) {
        let _ = payload;
    }

    /// A request-response request.
    fn request_response(&mut self, payload: Payload, output: StreamSender) -> HandlerResult {
        let _ = (payload, output);
        Err(HandlerError::Rejected(
            "request-response is not supported".to_string(),
        ))
    }

    /// A request-stream request carrying the initial credit.
    fn request_stream(
        &mut self,
        payload: Payload,
        initial_request_n: u32,
        output: StreamSender,
    ) -> HandlerResult {
        let _ = (payload, initial_request_n, output);
        Err(HandlerError::Rejected(
            "request-stream is not supported".to_string(),
        ))
    }

    /// A request-channel request; `is_completed` marks a requester that
    /// already finished its side with the initial frame.
    fn request_channel(
        &mut self,
        payload: Payload,
        initial_request_n: u32,
        is_completed: bool,
        output: StreamSender,
    ) -> HandlerResult {
        let _ = (payload, initial_request_n, is_completed, output);
        Err(HandlerError::Rejected(
            "request-channel is not supported".to_string(),
        ))
    }

    /// Connection-scoped metadata arrived (METADATA_PUSH).
    fn metadata_push(&mut self, metadata: Bytes) {
        let _ = metadata;
    }
}

/// Commands marshalled onto the connection's execution context.
///
/// Stream-scoped commands are routed to the owning engine by the parity
/// of their stream ID. Request commands report the allocated stream ID
/// (or the failure) through their `reply` channel.
pub enum Command {
    FireAndForget {
        payload: Payload,
        reply: oneshot::Sender<Result<()>>,
    },
    RequestResponse {
        payload: Payload,
        receiver: Box<dyn StreamReceiver>,
        reply: oneshot::Sender<Result<u32>>,
    },
    RequestStream {
        payload: Payload,
        initial_request_n: u32,
        receiver: Box<dyn StreamReceiver>,
        reply: oneshot::Sender<Result<u32>>,
    },
    RequestChannel {
        payload: Payload,
        initial_request_n: u32,
        complete: bool,
        receiver: Box<dyn StreamReceiver>,
        reply: oneshot::Sender<Result<u32>>,
    },
    SendNext {
        stream_id: u32,
        payload: Payload,
        complete: bool,
    },
    SendComplete {
        stream_id: u32,
    },
    SendError {
        stream_id: u32,
        code: u32,
        message: String,
    },
    SendCancel {
        stream_id: u32,
    },
    SendRequestN {
        stream_id: u32,
        n: u32,
    },
    Close,
}

/// Clone-able handle feeding [`Command`]s to the connection task.
#[derive(Clone)]
pub struct CommandSink {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSink {
    /// Create a sink and the receiver the connection task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a command for the connection task.
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::ConnectionClosed)
    }
}

/// Output adapter handed to responder handlers (and channel requesters):
/// converts application-level events into outbound frames tagged with
/// this stream's ID, marshalled through the connection context.
#[derive(Clone)]
pub struct StreamSender {
    stream_id: u32,
    commands: CommandSink,
}

impl StreamSender {
    pub(crate) fn new(stream_id: u32, commands: CommandSink) -> Self {
        Self {
            stream_id,
            commands,
        }
    }

    /// The stream this sender is bound to.
    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Emit a payload element; `is_completion` also completes this side.
    pub fn send_next(&self, payload: Payload, is_completion: bool) -> Result<()> {
        self.commands.send(Command::SendNext {
            stream_id: self.stream_id,
            payload,
            complete: is_completion,
        })
    }

    /// Complete this side without a final element.
    pub fn send_complete(&self) -> Result<()> {
        self.commands.send(Command::SendComplete {
            stream_id: self.stream_id,
        })
    }

    /// Fail the stream with an application error.
    pub fn send_error(&self, message: impl Into<String>) -> Result<()> {
        self.commands.send(Command::SendError {
            stream_id: self.stream_id,
            code: error_code::APPLICATION_ERROR,
            message: message.into(),
        })
    }

    /// Cancel the peer's side of the stream.
    pub fn send_cancel(&self) -> Result<()> {
        self.commands.send(Command::SendCancel {
            stream_id: self.stream_id,
        })
    }

    /// Grant the peer `n` more credits.
    pub fn request_n(&self, n: u32) -> Result<()> {
        self.commands.send(Command::SendRequestN {
            stream_id: self.stream_id,
            n,
        })
    }
}
