//! Error types for connection handling.

use crate::frame::FrameError;
use std::error::Error;
use std::fmt;
use std::io;

/// Errors returned to callers of the connection API.
#[derive(Debug)]
pub enum ConnectionError {
    /// An I/O error occurred while establishing the connection.
    Io(io::Error),
    /// The outbound connect did not complete within the configured timeout.
    ConnectTimeout,
    /// The connection has been dropped and accepts no more frames.
    Closed,
    /// A message could not be framed.
    Frame(FrameError),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Io(err) => write!(f, "Connection error: {err}"),
            ConnectionError::ConnectTimeout => write!(f, "Connection attempt timed out"),
            ConnectionError::Closed => write!(f, "Connection is closed"),
            ConnectionError::Frame(err) => write!(f, "Framing failed: {err}"),
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConnectionError::Io(err) => Some(err),
            ConnectionError::Frame(err) => Some(err),
            ConnectionError::ConnectTimeout => None,
            ConnectionError::Closed => None,
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        ConnectionError::Io(err)
    }
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        ConnectionError::Frame(err)
    }
}

/// Why a connection was dropped.
///
/// Every failure in the transport converges on a drop; this is the
/// classification handed to the registry with the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// A collaborator asked for the connection to be dropped.
    Requested,
    /// Reading a header or body failed.
    ReadFailed(io::ErrorKind),
    /// Writing a frame failed.
    WriteFailed(io::ErrorKind),
    /// A frame header announced a body over the size limit.
    FrameTooLarge(usize),
    /// The codec rejected a frame body.
    CorruptPayload,
    /// Nothing was read for longer than the idle timeout.
    ReadTimeout,
    /// Nothing was written for longer than the idle timeout.
    WriteTimeout,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Requested => write!(f, "drop requested"),
            DropReason::ReadFailed(kind) => write!(f, "read failed ({kind:?})"),
            DropReason::WriteFailed(kind) => write!(f, "write failed ({kind:?})"),
            DropReason::FrameTooLarge(length) => write!(f, "frame too large ({length} bytes)"),
            DropReason::CorruptPayload => write!(f, "corrupt payload"),
            DropReason::ReadTimeout => write!(f, "read timeout"),
            DropReason::WriteTimeout => write!(f, "write timeout"),
        }
    }
}
