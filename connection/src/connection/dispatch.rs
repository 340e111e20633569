//! Upward dispatch of decoded messages.

use super::Connection;
use log::debug;
use tokio::sync::mpsc;

/// Receives every successfully decoded message of a connection.
///
/// Called synchronously from the connection's task, in frame order, before
/// the next header is read. Anything the handler does to the connection
/// (e.g. [`Connection::set_authenticated`]) is visible to the next frame.
pub trait MessageHandler<M>: Send + 'static {
    fn on_message(&mut self, connection: &Connection, message: M);
}

impl<M: Send + 'static> MessageHandler<M> for mpsc::UnboundedSender<(Connection, M)> {
    fn on_message(&mut self, connection: &Connection, message: M) {
        if self.send((connection.clone(), message)).is_err() {
            debug!("Message from {connection} discarded, receiver gone");
        }
    }
}
