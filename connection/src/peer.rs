//! Remote peer identity and connection roles.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// We dialed the remote peer.
    Initiator,
    /// The remote peer dialed us.
    Acceptor,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRole::Initiator => write!(f, "we called remote"),
            PeerRole::Acceptor => write!(f, "remote called us"),
        }
    }
}

/// Represents a remote peer on the overlay network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// The peer's network address.
    pub address: IpAddr,
    /// The peer's port. For an outbound connection this is the port we
    /// dialed; for an inbound connection it is the remote socket's port.
    pub port: u16,
}

impl Peer {
    /// Create a peer reachable at `address`:`port`.
    pub fn new(address: IpAddr, port: u16) -> Self {
        Peer { address, port }
    }

    /// The socket address to dial for this peer.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for Peer {
    fn from(addr: SocketAddr) -> Self {
        Peer::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}
