//! Connection lifecycle state.
//!
//! A connection is [`Active`](ConnectionState::Active) from creation until
//! the first drop request, after which it is
//! [`Closing`](ConnectionState::Closing) for good. The transition is
//! idempotent: only the first request takes effect.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading and writing frames.
    Active,
    /// Torn down, or tearing down. Terminal.
    Closing,
}

impl ConnectionState {
    /// Update the state on a drop request.
    fn on_drop(&self) -> Self {
        ConnectionState::Closing
    }

    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Active => 0,
            ConnectionState::Closing => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Active,
            _ => ConnectionState::Closing,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Active => write!(f, "active"),
            ConnectionState::Closing => write!(f, "closing"),
        }
    }
}

/// State shared between a connection's task and its handles.
///
/// Only the task moves the lifecycle state; handles read it.
#[derive(Debug)]
pub(crate) struct SharedState {
    state: AtomicU8,
    authenticated: AtomicBool,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Active.to_u8()),
            authenticated: AtomicBool::new(false),
        }
    }

    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.load() == ConnectionState::Active
    }

    /// Move to [`ConnectionState::Closing`].
    ///
    /// Returns `true` only for the call that performed the transition.
    pub(crate) fn begin_closing(&self) -> bool {
        let active = ConnectionState::Active;
        self.state
            .compare_exchange(
                active.to_u8(),
                active.on_drop().to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub(crate) fn set_authenticated(&self) {
        self.authenticated.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_is_terminal() {
        assert_eq!(ConnectionState::Active.on_drop(), ConnectionState::Closing);
        assert_eq!(ConnectionState::Closing.on_drop(), ConnectionState::Closing);
    }

    #[test]
    fn test_begin_closing_only_once() {
        let shared = SharedState::new();
        assert!(shared.is_active());
        assert!(shared.begin_closing());
        assert!(!shared.begin_closing());
        assert_eq!(shared.load(), ConnectionState::Closing);
    }

    #[test]
    fn test_authenticated_flag() {
        let shared = SharedState::new();
        assert!(!shared.is_authenticated());
        shared.set_authenticated();
        assert!(shared.is_authenticated());
    }
}
