//! Connection registry collaborator.
//!
//! The registry owns the set of live connections of a node. This layer only
//! tells it when a connection is going away; what it does with that is its
//! own business.

use crate::connection::{Connection, ConnectionId, DropReason};
use crate::peer::{Peer, PeerRole};
use log::debug;
use tokio::sync::mpsc;

/// Notified exactly once per connection, when it starts closing.
pub trait ConnectionRegistry: Send + Sync {
    /// Called from the connection's task. Must not block.
    fn notify_dropped(&self, connection: &Connection, reason: &DropReason);
}

/// A drop notification forwarded by [`ChannelRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropNotice {
    pub id: ConnectionId,
    pub peer: Peer,
    pub role: PeerRole,
    pub reason: DropReason,
}

/// Registry that forwards drop notices over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    tx: mpsc::UnboundedSender<DropNotice>,
}

impl ChannelRegistry {
    /// Create a registry and the receiver its notices arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DropNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ConnectionRegistry for ChannelRegistry {
    fn notify_dropped(&self, connection: &Connection, reason: &DropReason) {
        let notice = DropNotice {
            id: connection.id(),
            peer: connection.peer().clone(),
            role: connection.role(),
            reason: reason.clone(),
        };
        if self.tx.send(notice).is_err() {
            debug!("Drop notice for {connection} discarded, registry receiver gone");
        }
    }
}
