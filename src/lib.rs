//! # streamwire
//!
//! An RSocket protocol engine: binary framing, stream multiplexing, and
//! application-level flow control over a single transport connection.
//!
//! ## Architecture
//!
//! - **Frame layer** ([`frame`]): the binary codec, transport framing,
//!   and typed frame bodies.
//! - **Fragmentation** ([`fragment`]): splitting oversized logical
//!   frames and reassembling wire fragments.
//! - **Connection core** ([`connection`]): stream-ID demultiplexing, the
//!   requester and responder engines, setup handshake, and keepalive.
//! - **Transport driver** ([`transport`]): a tokio task pump over any
//!   `AsyncRead + AsyncWrite` byte stream.
//!
//! The protocol core is synchronous and push-driven; every connection's
//! state is owned by a single task, and application calls marshal onto it
//! through channels.
//!
//! ## Example
//!
//! ```ignore
//! use streamwire::transport::{connect, ClientOptions};
//! use streamwire::{ClientSetup, Payload};
//!
//! #[tokio::main]
//! async fn main() -> streamwire::Result<()> {
//!     let socket = tokio::net::TcpStream::connect("127.0.0.1:7878").await?;
//!     let connection = connect(socket, ClientOptions::default(), MyHandler)?;
//!
//!     let response = connection
//!         .requester()
//!         .request_response(Payload::from("Hello World"), Box::new(MyReceiver))
//!         .await?;
//!     connection.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod fragment;
pub mod frame;
pub mod mime;
pub mod transport;
pub mod writer;

mod error;
mod payload;
mod stream_id;
mod termination;

pub use connection::{
    ClientSetup, Command, CommandSink, Connection, FrameSink, HandlerError, HandlerResult,
    LateFrameHandler, ResponderHandler, ServerSetupOptions, SetupAcceptor, StreamReceiver,
    StreamSender,
};
pub use error::{Error, Result};
pub use payload::Payload;
pub use stream_id::{Owner, Role, StreamIdGenerator};
pub use termination::{terminating_event, Side, TerminationBehavior, TerminationEvent};
