//! Overlay peer connection.
//!
//! This module turns a duplex byte stream into a sequence of length-framed
//! messages and back. Each connection runs as its own tokio task which owns
//! the socket, the inbound buffers, the outbound queue and the idle timer;
//! every pipeline step for that connection executes inside that task, one
//! at a time. Different connections make progress independently.
//!
//! The [`Connection`] type is a cheap, cloneable handle to that task.
//!
//! # Examples
//!
//! Dialing a peer and sending a message.
//!
//! ```no_run
//! use overlay_connection::{
//!     ChannelRegistry, Connection, ConnectionConfiguration, ConnectionContext, Envelope,
//!     EnvelopeCodec, Message, Peer,
//! };
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (registry, _drops) = ChannelRegistry::new();
//! let context = ConnectionContext::new(ConnectionConfiguration::default(), Arc::new(registry));
//! let (messages_tx, mut messages_rx) = mpsc::unbounded_channel::<(Connection, Envelope)>();
//!
//! let peer = Peer::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 11625);
//! let connection = Connection::initiate(peer, &context, EnvelopeCodec, messages_tx).await?;
//!
//! let hello = Envelope::Plain(Message::new(0, b"hello".to_vec()));
//! connection.send(&EnvelopeCodec, &hello)?;
//!
//! if let Some((from, message)) = messages_rx.recv().await {
//!     println!("{from}: {message:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod configuration;
mod context;
mod dispatch;
mod error;
mod idle;
mod inbound;
mod io;
mod outbound;
mod state;
mod tcp;

pub use configuration::{
    ConnectionConfiguration, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
};
pub use context::ConnectionContext;
pub use dispatch::MessageHandler;
pub use error::{ConnectionError, DropReason};
pub use state::ConnectionState;

use crate::codec::FrameCodec;
use crate::frame;
use crate::peer::{Peer, PeerRole};
use state::SharedState;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Identifies a connection within its [`ConnectionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Requests from handles to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Queue a pre-encoded frame.
    Submit(Vec<u8>),
    /// Wake the task to tear down a connection already marked closing.
    Drop,
}

/// Immutable identity plus the state readable from any handle.
#[derive(Debug)]
struct Shared {
    id: ConnectionId,
    role: PeerRole,
    peer: Peer,
    state: SharedState,
}

/// Handle to a live (or dropped) peer connection.
///
/// Handles are reference counted: every clone, including the one the
/// connection task keeps for dispatching, refers to the same connection.
/// Operations on the handle never block; they are queued to the
/// connection's task and executed there in order.
///
/// # Trait Implementations
///
/// - **Display**: connection id, peer address, role and lifecycle state.
/// - **Clone**: cheap, shares the connection.
#[derive(Debug, Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Connection {
    fn new(
        id: ConnectionId,
        role: PeerRole,
        peer: Peer,
    ) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            id,
            role,
            peer,
            state: SharedState::new(),
        });
        (Self { shared, commands }, commands_rx)
    }

    /// Dial `peer` over TCP.
    ///
    /// Once the socket is connected the inbound pipeline and the idle
    /// monitor are armed. Connect failures are returned to the caller and
    /// never retried.
    ///
    /// # Errors
    ///
    /// * [`ConnectionError::Io`] - The connect failed.
    /// * [`ConnectionError::ConnectTimeout`] - No answer within the configured timeout.
    pub async fn initiate<C, H>(
        peer: Peer,
        context: &ConnectionContext,
        codec: C,
        handler: H,
    ) -> Result<Self, ConnectionError>
    where
        C: FrameCodec,
        H: MessageHandler<C::Message>,
    {
        tcp::initiate(peer, context, codec, handler).await
    }

    /// Adopt a TCP stream returned by a listener.
    ///
    /// The remote address is recorded and the inbound pipeline starts
    /// immediately. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Io`] if the stream's remote address cannot be read
    /// or socket options cannot be applied.
    pub fn accept<C, H>(
        stream: TcpStream,
        context: &ConnectionContext,
        codec: C,
        handler: H,
    ) -> Result<Self, ConnectionError>
    where
        C: FrameCodec,
        H: MessageHandler<C::Message>,
    {
        tcp::accept(stream, context, codec, handler)
    }

    /// Run a connection over an arbitrary established transport.
    ///
    /// This is the path TCP connections take too; use it for in-memory
    /// pipes, wrapped streams, or tests. Must be called from within a tokio
    /// runtime.
    pub fn spawn<R, W, C, H>(
        role: PeerRole,
        peer: Peer,
        reader: R,
        writer: W,
        context: &ConnectionContext,
        codec: C,
        handler: H,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        C: FrameCodec,
        H: MessageHandler<C::Message>,
    {
        io::spawn(role, peer, reader, writer, context, codec, handler)
    }

    /// Identifier allocated by the [`ConnectionContext`].
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// The remote peer.
    pub fn peer(&self) -> &Peer {
        &self.shared.peer
    }

    /// Whether we dialed the peer or it dialed us.
    pub fn role(&self) -> PeerRole {
        self.shared.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    /// Whether the handshake layer has marked this connection authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.shared.state.is_authenticated()
    }

    /// Mark the connection authenticated.
    ///
    /// Frames read after this call are decoded as authenticated envelopes.
    /// When called from a [`MessageHandler`], that includes the very next
    /// frame.
    pub fn set_authenticated(&self) {
        self.shared.state.set_authenticated();
    }

    /// Queue a fully encoded frame (header included) for writing.
    ///
    /// Frames are written in the order they are submitted, one at a time.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Closed`] if the connection has been dropped.
    pub fn submit(&self, frame: Vec<u8>) -> Result<(), ConnectionError> {
        if !self.shared.state.is_active() {
            return Err(ConnectionError::Closed);
        }
        self.commands
            .send(Command::Submit(frame))
            .map_err(|_| ConnectionError::Closed)
    }

    /// Encode `message` with `codec`, frame it and queue it for writing.
    ///
    /// # Errors
    ///
    /// * [`ConnectionError::Frame`] - The encoded body is over the size limit.
    /// * [`ConnectionError::Closed`] - The connection has been dropped.
    pub fn send<C: FrameCodec>(&self, codec: &C, message: &C::Message) -> Result<(), ConnectionError> {
        let frame = frame::encode_frame(&codec.encode(message))?;
        self.submit(frame)
    }

    /// Drop the connection.
    ///
    /// The connection is closing as soon as this returns: no further
    /// frames are read or dispatched. Idempotent: only the first drop, from
    /// any source, notifies the registry and closes the socket.
    pub fn drop_connection(&self) {
        if self.shared.state.begin_closing() {
            // A send error means the task already finished tearing down.
            let _ = self.commands.send(Command::Drop);
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connection {} to {} ({}, {})",
            self.shared.id,
            self.shared.peer,
            self.shared.role,
            self.state()
        )
    }
}
