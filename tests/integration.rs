//! Integration tests: two protocol engines wired back-to-back, and the
//! tokio driver over an in-memory duplex transport.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use streamwire::fragment::{split_frame, Assembled, FragmentAssembler};
use streamwire::frame::{error_code, Frame, FrameBody, FrameBuffer, PayloadBody};
use streamwire::transport::{connect, serve, ClientOptions, ServerOptions};
use streamwire::{
    ClientSetup, Command, CommandSink, Connection, FrameSink, HandlerResult, Payload,
    ResponderHandler, ServerSetupOptions, StreamReceiver, StreamSender,
};

type Events = Arc<Mutex<Vec<String>>>;

/// Receiver recording every event as a string.
struct Recorder {
    events: Events,
}

fn recorder() -> (Recorder, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    (
        Recorder {
            events: events.clone(),
        },
        events,
    )
}

impl StreamReceiver for Recorder {
    fn on_next(&mut self, payload: Payload, is_completion: bool) {
        self.events.lock().unwrap().push(format!(
            "next({},{})",
            String::from_utf8_lossy(payload.data()),
            is_completion
        ));
    }
    fn on_complete(&mut self) {
        self.events.lock().unwrap().push("complete".to_string());
    }
    fn on_error(&mut self, code: u32, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("error({code:#06x},{message})"));
    }
    fn on_cancel(&mut self) {
        self.events.lock().unwrap().push("cancel".to_string());
    }
    fn on_request_n(&mut self, n: u32) {
        self.events.lock().unwrap().push(format!("request_n({n})"));
    }
}

struct NoopReceiver;
impl StreamReceiver for NoopReceiver {
    fn on_next(&mut self, _payload: Payload, _is_completion: bool) {}
    fn on_complete(&mut self) {}
    fn on_error(&mut self, _code: u32, _message: &str) {}
}

struct NoopResponder;
impl ResponderHandler for NoopResponder {}

/// Echoes request-response payloads back with completion.
struct EchoResponder;
impl ResponderHandler for EchoResponder {
    fn request_response(&mut self, payload: Payload, output: StreamSender) -> HandlerResult {
        let _ = output.send_next(payload, true);
        Ok(Box::new(NoopReceiver))
    }
}

/// Records fire-and-forget payloads.
struct FnfRecorder {
    payloads: Arc<Mutex<Vec<Payload>>>,
}

impl ResponderHandler for FnfRecorder {
    fn fire_and_forget(&mut self, payload: Payload) {
        self.payloads.lock().unwrap().push(payload);
    }
}

/// Accepts channels, capturing the output sender and recording inbound
/// events.
struct ChannelResponder {
    sender: Arc<Mutex<Option<StreamSender>>>,
    events: Events,
}

impl ResponderHandler for ChannelResponder {
    fn request_channel(
        &mut self,
        _payload: Payload,
        _initial_request_n: u32,
        _is_completed: bool,
        output: StreamSender,
    ) -> HandlerResult {
        *self.sender.lock().unwrap() = Some(output);
        Ok(Box::new(Recorder {
            events: self.events.clone(),
        }))
    }
}

/// One side of a manually pumped connection pair.
struct Endpoint {
    connection: Connection,
    out_rx: mpsc::UnboundedReceiver<Frame>,
    commands: CommandSink,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

fn client_endpoint(handler: impl ResponderHandler + 'static, setup: ClientSetup) -> Endpoint {
    client_endpoint_sized(handler, setup, streamwire::frame::DEFAULT_MAX_FRAME_SIZE)
}

fn client_endpoint_sized(
    handler: impl ResponderHandler + 'static,
    setup: ClientSetup,
    max_frame_size: usize,
) -> Endpoint {
    let (sink, out_rx) = FrameSink::channel(max_frame_size);
    let (commands, cmd_rx) = CommandSink::channel();
    let connection = Connection::client(
        setup,
        Box::new(handler),
        sink,
        commands.clone(),
        Instant::now(),
    );
    Endpoint {
        connection,
        out_rx,
        commands,
        cmd_rx,
    }
}

fn server_endpoint(handler: impl ResponderHandler + 'static) -> Endpoint {
    let (sink, out_rx) = FrameSink::channel(streamwire::frame::DEFAULT_MAX_FRAME_SIZE);
    let (commands, cmd_rx) = CommandSink::channel();
    let connection = Connection::server(
        ServerSetupOptions::default(),
        Box::new(handler),
        sink,
        commands.clone(),
    );
    Endpoint {
        connection,
        out_rx,
        commands,
        cmd_rx,
    }
}

/// Pump commands and frames between the two endpoints until quiescent.
fn pump(client: &mut Endpoint, server: &mut Endpoint) {
    let now = Instant::now();
    loop {
        let mut progressed = false;
        while let Ok(command) = client.cmd_rx.try_recv() {
            client.connection.apply(command);
            progressed = true;
        }
        while let Ok(command) = server.cmd_rx.try_recv() {
            server.connection.apply(command);
            progressed = true;
        }
        while let Ok(frame) = client.out_rx.try_recv() {
            let _ = server.connection.on_frame(frame, now);
            progressed = true;
        }
        while let Ok(frame) = server.out_rx.try_recv() {
            let _ = client.connection.on_frame(frame, now);
            progressed = true;
        }
        if !progressed {
            return;
        }
    }
}

#[test]
fn test_request_response_echo() {
    let mut client = client_endpoint(NoopResponder, ClientSetup::default());
    let mut server = server_endpoint(EchoResponder);

    let (receiver, events) = recorder();
    let (reply, mut reply_rx) = tokio::sync::oneshot::channel();
    client
        .commands
        .send(Command::RequestResponse {
            payload: Payload::from("Hello World"),
            receiver: Box::new(receiver),
            reply,
        })
        .unwrap();

    pump(&mut client, &mut server);

    assert_eq!(reply_rx.try_recv().unwrap().unwrap(), 1);
    assert_eq!(
        events.lock().unwrap().as_slice(),
        ["next(Hello World,true)"],
        "exactly one onNext with completion"
    );
    assert_eq!(client.connection.active_streams(), 0, "client deregistered");
    assert_eq!(server.connection.active_streams(), 0, "server deregistered");
}

#[test]
fn test_fragmented_fire_and_forget_arrives_bit_identical() {
    let payloads = Arc::new(Mutex::new(Vec::new()));
    let mut client = client_endpoint_sized(NoopResponder, ClientSetup::default(), 500);
    let mut server = server_endpoint(FnfRecorder {
        payloads: payloads.clone(),
    });

    let data: Vec<u8> = (0..1600u32).map(|i| (i % 251) as u8).collect();
    let (reply, mut reply_rx) = tokio::sync::oneshot::channel();
    client
        .commands
        .send(Command::FireAndForget {
            payload: Payload::new(data.clone()),
            reply,
        })
        .unwrap();

    // Apply the command, then verify the sink actually fragmented.
    while let Ok(command) = client.cmd_rx.try_recv() {
        client.connection.apply(command);
    }
    let mut outbound = Vec::new();
    while let Ok(frame) = client.out_rx.try_recv() {
        assert!(frame.encoded_len() <= 500);
        outbound.push(frame);
    }
    // SETUP plus more than one request fragment.
    assert!(outbound.len() > 2, "payload must be fragmented");

    let now = Instant::now();
    for frame in outbound {
        server.connection.on_frame(frame, now).unwrap();
    }

    reply_rx.try_recv().unwrap().unwrap();
    let received = payloads.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data(), &data[..], "payload must be bit-identical");
    assert_eq!(server.connection.active_streams(), 0);
}

#[test]
fn test_channel_mutual_completion_requester_first() {
    let sender = Arc::new(Mutex::new(None));
    let server_events: Events = Arc::new(Mutex::new(Vec::new()));
    let mut client = client_endpoint(NoopResponder, ClientSetup::default());
    let mut server = server_endpoint(ChannelResponder {
        sender: sender.clone(),
        events: server_events.clone(),
    });

    let (receiver, client_events) = recorder();
    let (reply, mut reply_rx) = tokio::sync::oneshot::channel();
    client
        .commands
        .send(Command::RequestChannel {
            payload: Payload::from("open"),
            initial_request_n: 16,
            complete: false,
            receiver: Box::new(receiver),
            reply,
        })
        .unwrap();
    pump(&mut client, &mut server);
    let stream_id = reply_rx.try_recv().unwrap().unwrap();

    // Requester completes first; both sides stay tracked until the
    // responder completes too.
    client
        .commands
        .send(Command::SendComplete { stream_id })
        .unwrap();
    pump(&mut client, &mut server);
    assert_eq!(client.connection.active_streams(), 1);
    assert_eq!(server.connection.active_streams(), 1);
    assert_eq!(server_events.lock().unwrap().as_slice(), ["complete"]);

    let server_sender = sender.lock().unwrap().clone().unwrap();
    server_sender.send_complete().unwrap();
    pump(&mut client, &mut server);

    assert_eq!(client_events.lock().unwrap().as_slice(), ["complete"]);
    assert_eq!(client.connection.active_streams(), 0);
    assert_eq!(server.connection.active_streams(), 0);
}

#[test]
fn test_channel_mutual_completion_responder_first() {
    let sender = Arc::new(Mutex::new(None));
    let server_events: Events = Arc::new(Mutex::new(Vec::new()));
    let mut client = client_endpoint(NoopResponder, ClientSetup::default());
    let mut server = server_endpoint(ChannelResponder {
        sender: sender.clone(),
        events: server_events.clone(),
    });

    let (receiver, client_events) = recorder();
    let (reply, mut reply_rx) = tokio::sync::oneshot::channel();
    client
        .commands
        .send(Command::RequestChannel {
            payload: Payload::from("open"),
            initial_request_n: 16,
            complete: false,
            receiver: Box::new(receiver),
            reply,
        })
        .unwrap();
    pump(&mut client, &mut server);
    let stream_id = reply_rx.try_recv().unwrap().unwrap();

    // Responder completes first.
    let server_sender = sender.lock().unwrap().clone().unwrap();
    server_sender.send_complete().unwrap();
    pump(&mut client, &mut server);
    assert_eq!(client_events.lock().unwrap().as_slice(), ["complete"]);
    assert_eq!(client.connection.active_streams(), 1);
    assert_eq!(server.connection.active_streams(), 1);

    client
        .commands
        .send(Command::SendComplete { stream_id })
        .unwrap();
    pump(&mut client, &mut server);

    assert_eq!(server_events.lock().unwrap().as_slice(), ["complete"]);
    assert_eq!(client.connection.active_streams(), 0);
    assert_eq!(server.connection.active_streams(), 0);
}

#[test]
fn test_channel_elements_flow_both_ways() {
    let sender = Arc::new(Mutex::new(None));
    let server_events: Events = Arc::new(Mutex::new(Vec::new()));
    let mut client = client_endpoint(NoopResponder, ClientSetup::default());
    let mut server = server_endpoint(ChannelResponder {
        sender: sender.clone(),
        events: server_events.clone(),
    });

    let (receiver, client_events) = recorder();
    let (reply, _reply_rx) = tokio::sync::oneshot::channel();
    client
        .commands
        .send(Command::RequestChannel {
            payload: Payload::from("open"),
            initial_request_n: 16,
            complete: false,
            receiver: Box::new(receiver),
            reply,
        })
        .unwrap();
    pump(&mut client, &mut server);

    client
        .commands
        .send(Command::SendNext {
            stream_id: 1,
            payload: Payload::from("up"),
            complete: false,
        })
        .unwrap();
    let server_sender = sender.lock().unwrap().clone().unwrap();
    server_sender.send_next(Payload::from("down"), false).unwrap();
    server_sender.request_n(4).unwrap();
    pump(&mut client, &mut server);

    assert_eq!(
        server_events.lock().unwrap().as_slice(),
        ["next(up,false)"]
    );
    assert_eq!(
        client_events.lock().unwrap().as_slice(),
        ["next(down,false)", "request_n(4)"]
    );
}

#[test]
fn test_keepalive_timeout_on_fourth_tick() {
    let mut client = client_endpoint(
        NoopResponder,
        ClientSetup {
            keepalive_interval: Duration::from_millis(1000),
            max_lifetime: Duration::from_millis(4000),
            ..ClientSetup::default()
        },
    );
    let start = Instant::now();

    // Drain the SETUP frame.
    let setup = client.out_rx.try_recv().unwrap();
    assert!(matches!(setup.body, FrameBody::Setup(_)));

    for tick in 1u32..=3 {
        client
            .connection
            .on_keepalive_tick(start + tick * Duration::from_millis(1000))
            .unwrap();
        match client.out_rx.try_recv().unwrap().body {
            FrameBody::Keepalive(body) => assert!(body.respond),
            other => panic!("expected KEEPALIVE, got {other:?}"),
        }
    }

    let result = client
        .connection
        .on_keepalive_tick(start + Duration::from_millis(4000));
    assert!(result.is_err(), "4th tick must time out");
    assert!(client.connection.is_closed());

    match client.out_rx.try_recv().unwrap().body {
        FrameBody::Error(body) => {
            assert_eq!(body.code, error_code::KEEPALIVE_TIMEOUT);
            assert!(body.message.contains("keepalive timeout"));
        }
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[test]
fn test_presetup_frames_replay_in_order() {
    let payloads = Arc::new(Mutex::new(Vec::new()));
    let mut server = server_endpoint(FnfRecorder {
        payloads: payloads.clone(),
    });
    let now = Instant::now();

    // Requests race ahead of SETUP.
    server
        .connection
        .on_frame(Frame::request_fnf(1, Payload::from("first")), now)
        .unwrap();
    server
        .connection
        .on_frame(Frame::request_fnf(3, Payload::from("second")), now)
        .unwrap();
    assert!(payloads.lock().unwrap().is_empty(), "nothing before SETUP");

    let mut client = client_endpoint(NoopResponder, ClientSetup::default());
    let setup = client.out_rx.try_recv().unwrap();
    server.connection.on_frame(setup, now).unwrap();

    let received = payloads.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].data(), b"first");
    assert_eq!(received[1].data(), b"second");
}

#[test]
fn test_setup_rejected_by_acceptor() {
    let (sink, mut out_rx) = FrameSink::channel(streamwire::frame::DEFAULT_MAX_FRAME_SIZE);
    let (commands, _cmd_rx) = CommandSink::channel();
    let mut server = Connection::server(
        ServerSetupOptions {
            acceptor: Some(Box::new(|_setup| Err("not on the allowlist".to_string()))),
            ..ServerSetupOptions::default()
        },
        Box::new(NoopResponder),
        sink,
        commands,
    );

    let mut client = client_endpoint(NoopResponder, ClientSetup::default());
    let setup = client.out_rx.try_recv().unwrap();

    let result = server.on_frame(setup, Instant::now());
    assert!(result.is_err());
    assert!(server.is_closed());

    match out_rx.try_recv().unwrap().body {
        FrameBody::Error(body) => {
            assert_eq!(body.code, error_code::REJECTED_SETUP);
            assert_eq!(body.message, "not on the allowlist");
        }
        other => panic!("expected ERROR, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Driver tests over an in-memory duplex transport.
// ---------------------------------------------------------------------------

/// Receiver forwarding events into a tokio channel for awaiting.
struct ForwardReceiver {
    tx: mpsc::UnboundedSender<String>,
}

impl StreamReceiver for ForwardReceiver {
    fn on_next(&mut self, payload: Payload, is_completion: bool) {
        let _ = self.tx.send(format!(
            "next({},{})",
            String::from_utf8_lossy(payload.data()),
            is_completion
        ));
    }
    fn on_complete(&mut self) {
        let _ = self.tx.send("complete".to_string());
    }
    fn on_error(&mut self, code: u32, message: &str) {
        let _ = self.tx.send(format!("error({code:#06x},{message})"));
    }
}

/// Handler forwarding fire-and-forget payloads into a tokio channel.
struct FnfForwarder {
    tx: mpsc::UnboundedSender<Payload>,
}

impl ResponderHandler for FnfForwarder {
    fn fire_and_forget(&mut self, payload: Payload) {
        let _ = self.tx.send(payload);
    }
}

/// Handler answering request-stream with a bounded run of items.
struct CountdownResponder;

impl ResponderHandler for CountdownResponder {
    fn request_stream(
        &mut self,
        _payload: Payload,
        initial_request_n: u32,
        output: StreamSender,
    ) -> HandlerResult {
        for i in 0..initial_request_n.min(3) {
            let _ = output.send_next(Payload::new(format!("item-{i}").into_bytes()), false);
        }
        let _ = output.send_complete();
        Ok(Box::new(NoopReceiver))
    }
}

#[tokio::test]
async fn test_driver_request_response_echo() {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let _server = serve(server_io, ServerOptions::default(), EchoResponder);
    let client = connect(client_io, ClientOptions::default(), NoopResponder);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = client
        .requester()
        .request_response(Payload::from("Hello World"), Box::new(ForwardReceiver { tx }))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("response within 5s")
        .unwrap();
    assert_eq!(event, "next(Hello World,true)");
}

#[tokio::test]
async fn test_driver_fragmented_fire_and_forget() {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _server = serve(server_io, ServerOptions::default(), FnfForwarder { tx });

    let client = connect(
        client_io,
        ClientOptions {
            max_frame_size: Some(500),
            ..ClientOptions::default()
        },
        NoopResponder,
    );

    let data: Vec<u8> = (0..2000u32).map(|i| (i % 247) as u8).collect();
    client
        .requester()
        .fire_and_forget(Payload::new(data.clone()))
        .await
        .unwrap();

    let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("payload within 5s")
        .unwrap();
    assert_eq!(payload.data(), &data[..]);
}

#[tokio::test]
async fn test_driver_request_stream_items_then_complete() {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let _server = serve(server_io, ServerOptions::default(), CountdownResponder);
    let client = connect(client_io, ClientOptions::default(), NoopResponder);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = client
        .requester()
        .request_stream(Payload::from("go"), 8, Box::new(ForwardReceiver { tx }))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        let done = event == "complete";
        events.push(event);
        if done {
            break;
        }
    }
    assert_eq!(
        events,
        ["next(item-0,false)", "next(item-1,false)", "next(item-2,false)", "complete"]
    );
}

#[tokio::test]
async fn test_driver_setup_rejection_shuts_the_client_down() {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let _server = serve(
        server_io,
        ServerOptions {
            setup: ServerSetupOptions {
                acceptor: Some(Box::new(|_setup| Err("no".to_string()))),
                ..ServerSetupOptions::default()
            },
            ..ServerOptions::default()
        },
        NoopResponder,
    );
    let client = connect(client_io, ClientOptions::default(), NoopResponder);

    tokio::time::timeout(Duration::from_secs(5), client.wait_for_shutdown())
        .await
        .expect("client must shut down after REJECTED_SETUP");
}

#[tokio::test(start_paused = true)]
async fn test_driver_keepalive_timeout_emits_error_frame() {
    // The peer never answers: hold the other end open and read what the
    // client wrote.
    let (client_io, mut silent_peer) = tokio::io::duplex(256 * 1024);

    let client = connect(
        client_io,
        ClientOptions {
            setup: ClientSetup {
                keepalive_interval: Duration::from_millis(1000),
                max_lifetime: Duration::from_millis(4000),
                ..ClientSetup::default()
            },
            ..ClientOptions::default()
        },
        NoopResponder,
    );

    client.wait_for_shutdown().await;

    // Everything the client wrote is buffered in the duplex.
    let mut buffer = FrameBuffer::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = silent_peer.read(&mut buf).await.unwrap();
        assert!(n > 0, "transport closed before the ERROR frame appeared");
        for raw in buffer.push(&buf[..n]).unwrap() {
            frames.push(Frame::decode(&raw).unwrap());
        }
        if matches!(frames.last().map(|f| &f.body), Some(FrameBody::Error(_))) {
            break;
        }
    }

    assert!(matches!(frames[0].body, FrameBody::Setup(_)));
    let keepalives = frames
        .iter()
        .filter(|f| matches!(f.body, FrameBody::Keepalive(_)))
        .count();
    assert_eq!(keepalives, 3, "three keepalives before the timeout");
    match &frames.last().unwrap().body {
        FrameBody::Error(body) => {
            assert_eq!(body.code, error_code::KEEPALIVE_TIMEOUT);
            assert!(body.message.contains("keepalive timeout"));
        }
        other => panic!("expected ERROR, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Property tests: codec round-trip and the fragmentation inverse law.
// ---------------------------------------------------------------------------

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn reassemble(fragments: Vec<Frame>) -> Frame {
        let mut assembler = FragmentAssembler::new();
        let mut result = None;
        for fragment in fragments {
            match assembler.process(fragment).unwrap() {
                Assembled::Complete(frame) => result = Some(frame),
                Assembled::Incomplete => {}
            }
        }
        result.expect("fragment sequence must complete")
    }

    proptest! {
        #[test]
        fn codec_roundtrip_payload_frames(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            metadata in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..512)),
            follows: bool,
            complete: bool,
            next: bool,
            stream_id in 1u32..=0x7FFF_FFFF,
        ) {
            let frame = Frame {
                stream_id,
                can_ignore: false,
                body: FrameBody::Payload(PayloadBody {
                    follows,
                    complete,
                    next,
                    payload: Payload {
                        metadata: metadata.map(Bytes::from),
                        data: Bytes::from(data),
                    },
                }),
            };
            let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, frame);
        }

        #[test]
        fn codec_roundtrip_request_frames(
            data in proptest::collection::vec(any::<u8>(), 0..1024),
            metadata in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..256)),
            initial_request_n in 1u32..=0x7FFF_FFFF,
            complete: bool,
        ) {
            let payload = Payload {
                metadata: metadata.map(Bytes::from),
                data: Bytes::from(data),
            };
            for frame in [
                Frame::request_response(5, payload.clone()),
                Frame::request_fnf(5, payload.clone()),
                Frame::request_stream(5, initial_request_n, payload.clone()),
                Frame::request_channel(5, initial_request_n, complete, payload.clone()),
            ] {
                let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
                prop_assert_eq!(decoded, frame);
            }
        }

        #[test]
        fn fragmentation_inverse_law(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            metadata in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..1024)),
            max_frame_size in 64usize..=1024,
            complete: bool,
        ) {
            let payload = Payload {
                metadata: metadata.map(Bytes::from),
                data: Bytes::from(data),
            };
            let frame = Frame::payload_next(9, payload, complete);
            let fragments = split_frame(frame.clone(), max_frame_size);
            for fragment in &fragments {
                prop_assert!(fragment.encoded_len() <= max_frame_size);
            }
            prop_assert_eq!(reassemble(fragments), frame);
        }

        #[test]
        fn fragmentation_inverse_law_for_requests(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            max_frame_size in 64usize..=512,
        ) {
            let payload = Payload::new(Bytes::from(data));
            for frame in [
                Frame::request_response(3, payload.clone()),
                Frame::request_fnf(3, payload.clone()),
                Frame::request_stream(3, 7, payload.clone()),
                Frame::request_channel(3, 7, true, payload.clone()),
            ] {
                prop_assert_eq!(reassemble(split_frame(frame.clone(), max_frame_size)), frame);
            }
        }
    }
}
