//! TCP-specific connections.

use super::{Connection, ConnectionConfiguration, ConnectionContext, ConnectionError, MessageHandler};
use crate::codec::FrameCodec;
use crate::peer::{Peer, PeerRole};
use log::debug;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Helper function to establish TCP connection with timeout and nodelay.
async fn establish_tcp_connection(
    socket_addr: SocketAddr,
    configuration: &ConnectionConfiguration,
) -> Result<TcpStream, ConnectionError> {
    match tokio::time::timeout(
        configuration.connection_timeout,
        TcpStream::connect(socket_addr),
    )
    .await
    {
        Ok(Ok(stream)) => {
            configure_stream(&stream, configuration)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(ConnectionError::Io(e)),
        Err(_) => Err(ConnectionError::ConnectTimeout),
    }
}

fn configure_stream(
    stream: &TcpStream,
    configuration: &ConnectionConfiguration,
) -> Result<(), ConnectionError> {
    // Most overlay frames are small, don't let them sit in Nagle's buffer.
    stream.set_nodelay(configuration.nodelay)?;
    Ok(())
}

/// Dial a peer and start its connection task.
pub(crate) async fn initiate<C, H>(
    peer: Peer,
    context: &ConnectionContext,
    codec: C,
    handler: H,
) -> Result<Connection, ConnectionError>
where
    C: FrameCodec,
    H: MessageHandler<C::Message>,
{
    let socket_addr = peer.socket_addr();
    debug!("Connecting to {socket_addr}");
    let stream = establish_tcp_connection(socket_addr, context.configuration())
        .await
        .map_err(|e| {
            debug!("Connect to {socket_addr} failed: {e}");
            e
        })?;

    let (reader, writer) = stream.into_split();
    Ok(Connection::spawn(
        PeerRole::Initiator,
        peer,
        reader,
        writer,
        context,
        codec,
        handler,
    ))
}

/// Start the connection task for a stream accepted by a listener.
pub(crate) fn accept<C, H>(
    stream: TcpStream,
    context: &ConnectionContext,
    codec: C,
    handler: H,
) -> Result<Connection, ConnectionError>
where
    C: FrameCodec,
    H: MessageHandler<C::Message>,
{
    let peer = Peer::from(stream.peer_addr()?);
    configure_stream(&stream, context.configuration())?;

    let (reader, writer) = stream.into_split();
    Ok(Connection::spawn(
        PeerRole::Acceptor,
        peer,
        reader,
        writer,
        context,
        codec,
        handler,
    ))
}
