//! Tokio driver: pumps a [`Connection`] over any byte-stream transport.
//!
//! The engine itself is transport-agnostic; this module supplies the
//! task plumbing around it for any `AsyncRead + AsyncWrite` pair:
//!
//! - a read task feeding whole frames through a [`FrameBuffer`],
//! - the connection task, which owns all protocol state and serializes
//!   inbound frames, application commands, and keepalive ticks,
//! - the writer task (see [`crate::writer`]) batching outbound frames.
//!
//! Application calls go through [`RequesterHandle`] and the per-stream
//! handles, which marshal commands onto the connection task.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::connection::{
    ClientSetup, Command, CommandSink, Connection, FrameSink, ResponderHandler, ServerSetupOptions,
    StreamReceiver,
};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameBuffer, FrameHeader, DEFAULT_MAX_FRAME_SIZE};
use crate::payload::Payload;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig};

/// Current instant from tokio's clock, so paused-time tests advance the
/// keepalive schedule consistently with the interval timer.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Client connection options.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// SETUP parameters.
    pub setup: ClientSetup,
    /// Maximum outbound frame size; larger logical frames are fragmented.
    pub max_frame_size: Option<usize>,
    /// Writer task tuning.
    pub writer: WriterConfig,
}

/// Server connection options.
#[derive(Default)]
pub struct ServerOptions {
    /// SETUP validation policy.
    pub setup: ServerSetupOptions,
    /// Maximum outbound frame size; larger logical frames are fragmented.
    pub max_frame_size: Option<usize>,
    /// Writer task tuning.
    pub writer: WriterConfig,
}

/// Drive the client side of a connection over `transport`.
///
/// Must be called within a tokio runtime; the connection tasks are
/// spawned immediately and the SETUP frame is the first thing written.
pub fn connect<T, H>(transport: T, options: ClientOptions, handler: H) -> ConnectionHandle
where
    T: AsyncRead + AsyncWrite + Send + 'static,
    H: ResponderHandler + 'static,
{
    let max_frame_size = options.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE);
    let keepalive_interval = options.setup.keepalive_interval;

    let (sink, out_rx) = FrameSink::channel(max_frame_size);
    let (commands, cmd_rx) = CommandSink::channel();
    let connection = Connection::client(
        options.setup,
        Box::new(handler),
        sink,
        commands.clone(),
        now(),
    );

    spawn_tasks(
        transport,
        connection,
        out_rx,
        cmd_rx,
        commands,
        max_frame_size,
        keepalive_interval,
        options.writer,
    )
}

/// Drive the server side of a connection over `transport`.
///
/// The connection stays in the setup handshake until the client's SETUP
/// is validated; frames arriving before that are buffered and replayed.
pub fn serve<T, H>(transport: T, options: ServerOptions, handler: H) -> ConnectionHandle
where
    T: AsyncRead + AsyncWrite + Send + 'static,
    H: ResponderHandler + 'static,
{
    let max_frame_size = options.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE);

    let (sink, out_rx) = FrameSink::channel(max_frame_size);
    let (commands, cmd_rx) = CommandSink::channel();
    let connection = Connection::server(options.setup, Box::new(handler), sink, commands.clone());

    // The server never originates keepalives; tick rarely so the select
    // arm stays cheap.
    spawn_tasks(
        transport,
        connection,
        out_rx,
        cmd_rx,
        commands,
        max_frame_size,
        Duration::from_secs(3600),
        options.writer,
    )
}

#[allow(clippy::too_many_arguments)]
fn spawn_tasks<T>(
    transport: T,
    mut connection: Connection,
    mut out_rx: mpsc::UnboundedReceiver<Frame>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    commands: CommandSink,
    max_frame_size: usize,
    keepalive_interval: Duration,
    writer_config: WriterConfig,
) -> ConnectionHandle
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(transport);
    let (writer, writer_task) = spawn_writer_task(write_half, writer_config);

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<Result<Bytes>>(64);
    tokio::spawn(read_loop(read_half, inbound_tx, max_frame_size));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(keepalive_interval);
        // The first tick fires immediately; skip it so tick N means
        // N * interval elapsed.
        ticker.tick().await;
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                inbound = inbound_rx.recv() => match inbound {
                    Some(Ok(raw)) => {
                        if on_inbound(&mut connection, &raw).is_err() {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        let _ = connection.on_malformed_frame(error);
                        break;
                    }
                    // Transport closed by the peer.
                    None => break,
                },
                command = cmd_rx.recv() => match command {
                    Some(command) => connection.apply(command),
                    None => break,
                },
                outbound = out_rx.recv() => match outbound {
                    Some(frame) => {
                        if pump_outbound(&writer, frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if connection.on_keepalive_tick(now()).is_err() {
                        break;
                    }
                }
            }
            if connection.is_closed() {
                break;
            }
        }

        // Flush whatever the teardown produced (ERROR / CANCEL frames).
        while let Ok(frame) = out_rx.try_recv() {
            if pump_outbound(&writer, frame).await.is_err() {
                break;
            }
        }
        drop(writer);
        let _ = writer_task.await;
        let _ = shutdown_tx.send(());
    });

    ConnectionHandle {
        requester: RequesterHandle {
            commands: commands.clone(),
        },
        commands,
        shutdown_rx,
    }
}

/// Decode one inbound frame, honoring the IGNORE policy for frames that
/// fail to decode, and feed it to the connection.
fn on_inbound(connection: &mut Connection, raw: &[u8]) -> Result<()> {
    match Frame::decode(raw) {
        Ok(frame) => connection.on_frame(frame, now()),
        Err(error) => {
            let ignorable = FrameHeader::decode(raw)
                .map(|header| header.can_ignore())
                .unwrap_or(false);
            if ignorable {
                tracing::debug!(%error, "dropping undecodable ignorable frame");
                Ok(())
            } else {
                connection.on_malformed_frame(error)
            }
        }
    }
}

async fn pump_outbound(writer: &crate::writer::WriterHandle, frame: Frame) -> Result<()> {
    match OutboundFrame::encode(&frame) {
        Ok(outbound) => writer.send(outbound).await,
        Err(error) => {
            // An unencodable frame is a local bug, not a connection fault.
            tracing::error!(%error, "dropping unencodable outbound frame");
            Ok(())
        }
    }
}

/// Read task: accumulate transport bytes into whole frames.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Result<Bytes>>, max_frame_size: usize)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buffer = FrameBuffer::with_max_frame_size(max_frame_size);
    let mut buf = vec![0u8; 16 * 1024];

    loop {
        let n = match reader.read(&mut buf).await {
            // Peer closed the transport.
            Ok(0) => return,
            Ok(n) => n,
            Err(error) => {
                tracing::debug!(%error, "transport read failed");
                return;
            }
        };

        match buffer.push(&buf[..n]) {
            Ok(frames) => {
                for frame in frames {
                    if tx.send(Ok(frame)).await.is_err() {
                        return;
                    }
                }
            }
            Err(error) => {
                let _ = tx.send(Err(error)).await;
                return;
            }
        }
    }
}

/// A running connection: the requester API plus lifecycle control.
pub struct ConnectionHandle {
    requester: RequesterHandle,
    commands: CommandSink,
    shutdown_rx: oneshot::Receiver<()>,
}

impl ConnectionHandle {
    /// The requester-side API of this connection.
    pub fn requester(&self) -> RequesterHandle {
        self.requester.clone()
    }

    /// Tear the connection down: cancels active streams and notifies the
    /// peer.
    pub fn close(&self) -> Result<()> {
        self.commands.send(Command::Close)
    }

    /// Wait until the connection task has fully shut down.
    pub async fn wait_for_shutdown(self) {
        let _ = self.shutdown_rx.await;
    }
}

/// Requester-side API: one method per interaction model.
#[derive(Clone)]
pub struct RequesterHandle {
    commands: CommandSink,
}

impl RequesterHandle {
    /// Send a fire-and-forget request. No stream object is retained.
    pub async fn fire_and_forget(&self, payload: Payload) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::FireAndForget { payload, reply })?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Start a request-response exchange; events arrive on `receiver`.
    pub async fn request_response(
        &self,
        payload: Payload,
        receiver: Box<dyn StreamReceiver>,
    ) -> Result<RequestHandle> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::RequestResponse {
            payload,
            receiver,
            reply,
        })?;
        let stream_id = rx.await.map_err(|_| Error::ConnectionClosed)??;
        Ok(RequestHandle {
            stream_id,
            commands: self.commands.clone(),
        })
    }

    /// Start a request-stream exchange with the given initial credit.
    pub async fn request_stream(
        &self,
        payload: Payload,
        initial_request_n: u32,
        receiver: Box<dyn StreamReceiver>,
    ) -> Result<StreamHandle> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::RequestStream {
            payload,
            initial_request_n,
            receiver,
            reply,
        })?;
        let stream_id = rx.await.map_err(|_| Error::ConnectionClosed)??;
        Ok(StreamHandle {
            stream_id,
            commands: self.commands.clone(),
        })
    }

    /// Start a request-channel exchange. `completed` marks the requester
    /// side as finished with the initial payload alone.
    pub async fn request_channel(
        &self,
        payload: Payload,
        initial_request_n: u32,
        completed: bool,
        receiver: Box<dyn StreamReceiver>,
    ) -> Result<ChannelHandle> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::RequestChannel {
            payload,
            initial_request_n,
            complete: completed,
            receiver,
            reply,
        })?;
        let stream_id = rx.await.map_err(|_| Error::ConnectionClosed)??;
        Ok(ChannelHandle {
            stream_id,
            commands: self.commands.clone(),
        })
    }
}

/// Handle for a request-response exchange: cancellation only.
pub struct RequestHandle {
    stream_id: u32,
    commands: CommandSink,
}

impl RequestHandle {
    /// The stream ID of this exchange.
    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Cancel the request.
    pub fn cancel(&self) -> Result<()> {
        self.commands.send(Command::SendCancel {
            stream_id: self.stream_id,
        })
    }
}

/// Handle for a request-stream exchange: cancellation plus credit.
pub struct StreamHandle {
    stream_id: u32,
    commands: CommandSink,
}

impl StreamHandle {
    /// The stream ID of this exchange.
    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Cancel the stream.
    pub fn cancel(&self) -> Result<()> {
        self.commands.send(Command::SendCancel {
            stream_id: self.stream_id,
        })
    }

    /// Grant the responder `n` more credits.
    pub fn request_n(&self, n: u32) -> Result<()> {
        self.commands.send(Command::SendRequestN {
            stream_id: self.stream_id,
            n,
        })
    }
}

/// Handle for a request-channel exchange: full duplex.
pub struct ChannelHandle {
    stream_id: u32,
    commands: CommandSink,
}

impl ChannelHandle {
    /// The stream ID of this exchange.
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

    /// Complete the requester side without a final element.
    pub fn send_complete(&self) -> Result<()> {
        self.commands.send(Command::SendComplete {
            stream_id: self.stream_id,
        })
    }

    /// Fail the channel from the requester side.
    pub fn send_error(&self, message: impl Into<String>) -> Result<()> {
        self.commands.send(Command::SendError {
            stream_id: self.stream_id,
            code: crate::frame::error_code::APPLICATION_ERROR,
            message: message.into(),
        })
    }

    /// Cancel the channel.
    pub fn cancel(&self) -> Result<()> {
        self.commands.send(Command::SendCancel {
            stream_id: self.stream_id,
        })
    }

    /// Grant the responder `n` more credits.
    pub fn request_n(&self, n: u32) -> Result<()> {
        self.commands.send(Command::SendRequestN {
            stream_id: self.stream_id,
            n,
        })
    }
}
