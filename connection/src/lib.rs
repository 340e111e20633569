//! Framed peer-to-peer connections for overlay nodes.
//!
//! Each [`Connection`] carries length-prefixed frames over a stream socket,
//! writes queued frames strictly in order, decodes inbound frames with a
//! pluggable [`FrameCodec`], drops itself when either direction goes idle,
//! and tells its [`ConnectionRegistry`] exactly once when it goes away.

pub mod codec;
mod connection;
pub mod frame;
pub mod metrics;
mod peer;
mod registry;

pub use codec::{AuthenticatedMessage, DecodeError, Envelope, EnvelopeCodec, FrameCodec, Message};
pub use connection::{
    Connection, ConnectionConfiguration, ConnectionContext, ConnectionError, ConnectionId,
    ConnectionState, DropReason, MessageHandler, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
};
pub use frame::{FrameError, MAX_MESSAGE_SIZE};
pub use crate::metrics::{Instrumentation, Meter, MeterCounts};
#[cfg(feature = "metrics")]
pub use crate::metrics::MetricsInstrumentation;
pub use peer::{Peer, PeerRole};
pub use registry::{ChannelRegistry, ConnectionRegistry, DropNotice};
