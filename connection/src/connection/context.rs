//! Collaborators shared by every connection of a node.

use super::configuration::ConnectionConfiguration;
use super::ConnectionId;
use crate::metrics::{Instrumentation, MeterCounts};
use crate::registry::ConnectionRegistry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Configuration and injected collaborators handed to each new connection.
///
/// Cloning is cheap; clones share the registry, the instrumentation sink
/// and the connection id sequence.
#[derive(Clone)]
pub struct ConnectionContext {
    configuration: ConnectionConfiguration,
    registry: Arc<dyn ConnectionRegistry>,
    instrumentation: Arc<dyn Instrumentation>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionContext {
    /// Create a context reporting drops to `registry`.
    ///
    /// Meters go to a private [`MeterCounts`] until
    /// [`with_instrumentation`](Self::with_instrumentation) replaces it.
    pub fn new(configuration: ConnectionConfiguration, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self {
            configuration,
            registry,
            instrumentation: Arc::new(MeterCounts::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replace the instrumentation sink.
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn configuration(&self) -> &ConnectionConfiguration {
        &self.configuration
    }

    pub(crate) fn registry(&self) -> Arc<dyn ConnectionRegistry> {
        self.registry.clone()
    }

    pub(crate) fn instrumentation(&self) -> Arc<dyn Instrumentation> {
        self.instrumentation.clone()
    }

    pub(crate) fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("configuration", &self.configuration)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
