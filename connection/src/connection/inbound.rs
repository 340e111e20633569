//! Inbound pipeline: reads one frame at a time off the socket.
//!
//! Each call to [`InboundPipeline::read`] completes exactly one step of the
//! `header -> body -> header ...` progression, so the connection task gets
//! control back between the header and the body of a frame.

use crate::frame::{self, FrameError, HEADER_SIZE};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// State machine for [`InboundPipeline::read`].
///
/// Progress is stored here rather than on the future's stack, so the read
/// can be dropped by a `tokio::select!` and resumed later without losing
/// bytes already received.
#[derive(Debug)]
enum ReceiveState {
    /// Reading the 4-byte length header.
    ReadingHeader {
        header: [u8; HEADER_SIZE],
        bytes_read: usize,
    },
    /// Reading a body sized exactly to the decoded length.
    ReadingBody { body: Vec<u8>, bytes_read: usize },
}

impl ReceiveState {
    fn reading_header() -> Self {
        ReceiveState::ReadingHeader {
            header: [0u8; HEADER_SIZE],
            bytes_read: 0,
        }
    }

    fn reading_body(length: usize) -> Self {
        ReceiveState::ReadingBody {
            body: vec![0u8; length],
            bytes_read: 0,
        }
    }
}

/// One completed step of the inbound pipeline.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InboundProgress {
    /// A header was read and announced a body of `length` bytes.
    Header { length: usize },
    /// A complete body was read.
    Body(Vec<u8>),
}

/// Reasons the inbound pipeline stops.
#[derive(Debug)]
pub(crate) enum InboundError {
    /// The socket failed or reached end of stream.
    Io(io::Error),
    /// The header announced an unacceptable length.
    Frame(FrameError),
}

impl From<io::Error> for InboundError {
    fn from(err: io::Error) -> Self {
        InboundError::Io(err)
    }
}

impl From<FrameError> for InboundError {
    fn from(err: FrameError) -> Self {
        InboundError::Frame(err)
    }
}

#[derive(Debug)]
pub(crate) struct InboundPipeline {
    receive_state: ReceiveState,
}

impl InboundPipeline {
    pub(crate) fn new() -> Self {
        Self {
            receive_state: ReceiveState::reading_header(),
        }
    }

    /// Whether a header has been read and its body is outstanding.
    pub(crate) fn is_reading_body(&self) -> bool {
        matches!(self.receive_state, ReceiveState::ReadingBody { .. })
    }

    /// Complete the next pipeline step.
    ///
    /// This function is cancellation safe.
    pub(crate) async fn read<R>(&mut self, reader: &mut R) -> Result<InboundProgress, InboundError>
    where
        R: AsyncRead + Unpin,
    {
        match &mut self.receive_state {
            ReceiveState::ReadingHeader { header, bytes_read } => {
                while *bytes_read < HEADER_SIZE {
                    let n = reader.read(&mut header[*bytes_read..]).await?;
                    if n == 0 {
                        return Err(InboundError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed while reading header",
                        )));
                    }
                    *bytes_read += n;
                }

                let length = frame::decode_length(*header)?;
                self.receive_state = ReceiveState::reading_body(length);
                Ok(InboundProgress::Header { length })
            }
            ReceiveState::ReadingBody { body, bytes_read } => {
                while *bytes_read < body.len() {
                    let n = reader.read(&mut body[*bytes_read..]).await?;
                    if n == 0 {
                        return Err(InboundError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed while reading body",
                        )));
                    }
                    *bytes_read += n;
                }

                let body = std::mem::take(body);
                self.receive_state = ReceiveState::reading_header();
                Ok(InboundProgress::Body(body))
            }
        }
    }
}
