//! Integration tests for connections over loopback TCP.

use overlay_connection::{
    AuthenticatedMessage, ChannelRegistry, Connection, ConnectionConfiguration, ConnectionContext,
    ConnectionState, DropNotice, DropReason, Envelope, EnvelopeCodec, Message, Meter, MeterCounts,
    Peer, PeerRole,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

type Messages = mpsc::UnboundedReceiver<(Connection, Envelope)>;

struct Node {
    context: ConnectionContext,
    counts: Arc<MeterCounts>,
    drops: mpsc::UnboundedReceiver<DropNotice>,
}

impl Node {
    fn new() -> Self {
        let (registry, drops) = ChannelRegistry::new();
        let counts = Arc::new(MeterCounts::new());
        let context = ConnectionContext::new(ConnectionConfiguration::default(), Arc::new(registry))
            .with_instrumentation(counts.clone());
        Self {
            context,
            counts,
            drops,
        }
    }

    async fn next_drop(&mut self) -> DropNotice {
        timeout(WAIT, self.drops.recv())
            .await
            .expect("Timeout waiting for drop notice")
            .expect("Registry channel closed")
    }
}

/// Connect two nodes over loopback and return both ends.
async fn connected_pair(
    dialer: &Node,
    listener: &Node,
) -> ((Connection, Messages), (Connection, Messages)) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    let (dialed, accepted) = tokio::join!(
        Connection::initiate(Peer::from(addr), &dialer.context, EnvelopeCodec, outbound_tx),
        async {
            let (stream, _) = tcp.accept().await.unwrap();
            Connection::accept(stream, &listener.context, EnvelopeCodec, inbound_tx)
        }
    );

    (
        (dialed.unwrap(), outbound_rx),
        (accepted.unwrap(), inbound_rx),
    )
}

async fn next_message(messages: &mut Messages) -> (Connection, Envelope) {
    timeout(WAIT, messages.recv())
        .await
        .expect("Timeout waiting for message")
        .expect("Message channel closed")
}

#[tokio::test]
async fn test_messages_flow_both_ways() {
    let dialer = Node::new();
    let listener = Node::new();
    let ((outbound, mut outbound_rx), (inbound, mut inbound_rx)) =
        connected_pair(&dialer, &listener).await;

    assert_eq!(outbound.role(), PeerRole::Initiator);
    assert_eq!(inbound.role(), PeerRole::Acceptor);

    let hello = Envelope::Plain(Message::new(0, b"hello".to_vec()));
    outbound.send(&EnvelopeCodec, &hello).unwrap();
    let (from, message) = next_message(&mut inbound_rx).await;
    assert_eq!(from.id(), inbound.id());
    assert_eq!(message, hello);

    let reply = Envelope::Plain(Message::new(1, b"hello back".to_vec()));
    inbound.send(&EnvelopeCodec, &reply).unwrap();
    let (_, message) = next_message(&mut outbound_rx).await;
    assert_eq!(message, reply);

    assert_eq!(listener.counts.get(Meter::MessageRead), 1);
    assert_eq!(dialer.counts.get(Meter::MessageRead), 1);
}

#[tokio::test]
async fn test_many_frames_arrive_in_order() {
    let dialer = Node::new();
    let listener = Node::new();
    let ((outbound, _outbound_rx), (_inbound, mut inbound_rx)) =
        connected_pair(&dialer, &listener).await;

    for kind in 0..100u32 {
        let payload = vec![kind as u8; kind as usize * 37];
        outbound
            .send(&EnvelopeCodec, &Envelope::Plain(Message::new(kind, payload)))
            .unwrap();
    }

    for kind in 0..100u32 {
        let (_, message) = next_message(&mut inbound_rx).await;
        match message {
            Envelope::Plain(message) => {
                assert_eq!(message.kind, kind);
                assert_eq!(message.payload.len(), kind as usize * 37);
            }
            other => panic!("Expected plain message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_authenticated_messages_after_handshake() {
    let dialer = Node::new();
    let listener = Node::new();
    let ((outbound, _outbound_rx), (inbound, mut inbound_rx)) =
        connected_pair(&dialer, &listener).await;

    inbound.set_authenticated();
    let authenticated = Envelope::Authenticated(AuthenticatedMessage {
        sequence: 42,
        message: Message::new(7, b"secret".to_vec()),
        mac: [0xab; 32],
    });
    outbound.send(&EnvelopeCodec, &authenticated).unwrap();

    let (_, message) = next_message(&mut inbound_rx).await;
    assert_eq!(message, authenticated);
}

#[tokio::test]
async fn test_drop_notifies_both_registries() {
    let mut dialer = Node::new();
    let mut listener = Node::new();
    let ((outbound, _outbound_rx), (inbound, _inbound_rx)) =
        connected_pair(&dialer, &listener).await;

    outbound.drop_connection();
    outbound.drop_connection();

    let notice = dialer.next_drop().await;
    assert_eq!(notice.id, outbound.id());
    assert_eq!(notice.reason, DropReason::Requested);
    assert_eq!(outbound.state(), ConnectionState::Closing);

    // The other side reads end of stream while waiting for a header.
    let notice = listener.next_drop().await;
    assert_eq!(notice.id, inbound.id());
    assert_eq!(notice.role, PeerRole::Acceptor);
    assert_eq!(notice.reason, DropReason::ReadFailed(io::ErrorKind::UnexpectedEof));
    assert_eq!(listener.counts.get(Meter::ErrorRead), 1);

    // No second notice for the dialer.
    assert!(timeout(Duration::from_millis(100), dialer.drops.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_idle_connection_times_out() {
    let (registry, mut drops) = ChannelRegistry::new();
    let configuration =
        ConnectionConfiguration::default().with_idle_timeout(Duration::from_millis(100));
    let context = ConnectionContext::new(configuration, Arc::new(registry));
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let (tx, _rx) = mpsc::unbounded_channel::<(Connection, Envelope)>();
    let connection = Connection::initiate(Peer::from(addr), &context, EnvelopeCodec, tx)
        .await
        .unwrap();
    let (_stream, _) = tcp.accept().await.unwrap();

    let notice = timeout(WAIT, drops.recv()).await.unwrap().unwrap();
    assert_eq!(notice.id, connection.id());
    assert_eq!(notice.reason, DropReason::ReadTimeout);
}
