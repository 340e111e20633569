//! Outbound pipeline: a FIFO of pre-encoded frames written one at a time.

use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Queue of frames waiting to go out, in wire order.
///
/// The head frame stays in the queue until its write has fully completed,
/// so a write that is interrupted by the connection task's select loop
/// resumes from `written` rather than starting over.
#[derive(Debug, Default)]
pub(crate) struct OutboundPipeline {
    queue: VecDeque<Vec<u8>>,
    /// Bytes of the head frame already accepted by the writer.
    written: usize,
}

impl OutboundPipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Returns `true` if the queue was empty before the
    /// call, i.e. this frame starts a new drain.
    pub(crate) fn submit(&mut self, frame: Vec<u8>) -> bool {
        let was_empty = self.queue.is_empty();
        self.queue.push_back(frame);
        was_empty
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Write the head frame to `writer` and flush.
    ///
    /// Resolves with the size of the head frame once all of it has been
    /// written. The head is *not* removed; call
    /// [`complete_head`](Self::complete_head) afterwards.
    ///
    /// This function is cancellation safe.
    pub(crate) async fn write_head<W>(&mut self, writer: &mut W) -> io::Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let head = match self.queue.front() {
            Some(head) => head,
            None => return Ok(0),
        };

        while self.written < head.len() {
            let n = writer.write(&head[self.written..]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed while writing frame",
                ));
            }
            self.written += n;
        }
        writer.flush().await?;

        Ok(head.len())
    }

    /// Remove the head frame after its write completed.
    pub(crate) fn complete_head(&mut self) -> Option<Vec<u8>> {
        self.written = 0;
        self.queue.pop_front()
    }

    /// Discard everything still queued.
    pub(crate) fn clear(&mut self) -> usize {
        let discarded = self.queue.len();
        self.queue.clear();
        self.written = 0;
        discarded
    }
}
