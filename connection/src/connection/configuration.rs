//! Connection configuration types and constants.

use std::fmt;
use std::time::Duration;

/// Default idle timeout. Also the period of the idle check.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for outbound connection establishment.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by the connections of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfiguration {
    /// Maximum silence, in either direction, before a connection is dropped.
    pub idle_timeout: Duration,
    /// Timeout for the outbound TCP connect.
    pub connection_timeout: Duration,
    /// Whether to set `TCP_NODELAY` on TCP sockets.
    pub nodelay: bool,
}

impl ConnectionConfiguration {
    /// Creates a configuration with the default timeouts.
    pub fn new() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            nodelay: true,
        }
    }

    /// Set the idle timeout.
    ///
    /// The idle monitor wakes once per `timeout` and drops the connection if
    /// no read, or no write, has completed for longer than `timeout`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use overlay_connection::ConnectionConfiguration;
    ///
    /// let config = ConnectionConfiguration::new().with_idle_timeout(Duration::from_secs(60));
    /// assert_eq!(config.idle_timeout, Duration::from_secs(60));
    /// ```
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the timeout for connection establishment.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for ConnectionConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionConfiguration {{ idle_timeout: {:?}, connection_timeout: {:?}, nodelay: {} }}",
            self.idle_timeout, self.connection_timeout, self.nodelay
        )
    }
}
