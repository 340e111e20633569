//! The per-connection task.
//!
//! One task owns the reader, the writer, both pipelines and the idle timer
//! of a connection. It multiplexes them with `tokio::select!`, so every step
//! runs to completion before the next one starts and nothing it owns needs a
//! lock.

use super::context::ConnectionContext;
use super::dispatch::MessageHandler;
use super::error::DropReason;
use super::idle::{IdleMonitor, IdleVerdict};
use super::inbound::{InboundError, InboundPipeline, InboundProgress};
use super::outbound::OutboundPipeline;
use super::{Command, Connection};
use crate::codec::FrameCodec;
use crate::frame::{FrameError, HEADER_SIZE};
use crate::metrics::{Instrumentation, Meter};
use crate::peer::{Peer, PeerRole};
use crate::registry::ConnectionRegistry;
use log::{debug, error, info, trace, warn};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use std::time::Duration;
use tokio::time::Instant;

/// Create a connection over an established transport and start its task.
pub(crate) fn spawn<R, W, C, H>(
    role: PeerRole,
    peer: Peer,
    reader: R,
    writer: W,
    context: &ConnectionContext,
    codec: C,
    handler: H,
) -> Connection
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: FrameCodec,
    H: MessageHandler<C::Message>,
{
    let task = ConnectionTask::new(role, peer, reader, writer, context, codec, handler);
    let connection = task.connection.clone();
    tokio::spawn(task.run());
    connection
}

pub(crate) struct ConnectionTask<R, W, C, H> {
    /// The task's own handle, passed to the handler and the registry.
    connection: Connection,
    commands: mpsc::UnboundedReceiver<Command>,
    reader: R,
    writer: W,
    inbound: InboundPipeline,
    outbound: OutboundPipeline,
    idle: IdleMonitor,
    codec: C,
    handler: H,
    registry: Arc<dyn ConnectionRegistry>,
    instrumentation: Arc<dyn Instrumentation>,
    last_read: Instant,
    last_write: Instant,
    /// Bound on the best-effort writer shutdown.
    close_timeout: Duration,
    /// Set once teardown has run.
    torn_down: bool,
}

impl<R, W, C, H> ConnectionTask<R, W, C, H>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: FrameCodec,
    H: MessageHandler<C::Message>,
{
    pub(crate) fn new(
        role: PeerRole,
        peer: Peer,
        reader: R,
        writer: W,
        context: &ConnectionContext,
        codec: C,
        handler: H,
    ) -> Self {
        let (connection, commands) = Connection::new(context.next_id(), role, peer);
        let now = Instant::now();

        Self {
            connection,
            commands,
            reader,
            writer,
            inbound: InboundPipeline::new(),
            outbound: OutboundPipeline::new(),
            idle: IdleMonitor::new(context.configuration().idle_timeout),
            codec,
            handler,
            registry: context.registry(),
            instrumentation: context.instrumentation(),
            last_read: now,
            last_write: now,
            close_timeout: context.configuration().connection_timeout,
            torn_down: false,
        }
    }

    /// Drive the connection until it is dropped.
    pub(crate) async fn run(mut self) {
        self.connected();

        while self.connection.shared.state.is_active() {
            tokio::select! {
                biased;

                Some(command) = self.commands.recv() => {
                    self.on_command(command).await;
                }
                () = self.idle.expired(), if self.idle.is_armed() => {
                    self.on_idle_timer().await;
                }
                result = self.inbound.read(&mut self.reader) => {
                    self.on_inbound(result).await;
                }
                result = self.outbound.write_head(&mut self.writer), if self.outbound.has_pending() => {
                    match result {
                        Ok(_) => self.on_write_complete(),
                        Err(err) => self.on_write_failure(err).await,
                    }
                }
            }
        }

        // A drop through a handle only moves the state, teardown happens here.
        self.drop_connection(DropReason::Requested).await;
        trace!("Task for {} finished", self.connection);
    }

    /// Shared completion path for both roles: the inbound pipeline starts
    /// with the first loop iteration and the idle monitor is armed here.
    fn connected(&mut self) {
        info!(
            "Connection {} to {} established ({})",
            self.connection.id(),
            self.connection.peer(),
            self.connection.role()
        );
        self.idle.arm();
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit(frame) => {
                if self.outbound.submit(frame) {
                    trace!("Outbound queue for {} starts draining", self.connection);
                } else {
                    trace!(
                        "Frame for {} queued behind {} others",
                        self.connection,
                        self.outbound.len() - 1
                    );
                }
            }
            Command::Drop => self.drop_connection(DropReason::Requested).await,
        }
    }

    async fn on_inbound(&mut self, result: Result<InboundProgress, InboundError>) {
        match result {
            Ok(InboundProgress::Header { length }) => {
                self.instrumentation.mark(Meter::ByteRead, HEADER_SIZE as u64);
                self.last_read = Instant::now();
                trace!("Header from {} announces {length} bytes", self.connection);
            }
            Ok(InboundProgress::Body(body)) => self.on_body(body).await,
            Err(InboundError::Frame(FrameError::TooLarge(length))) => {
                self.instrumentation.mark(Meter::ErrorRead, 1);
                error!(
                    "Frame from {} announces {length} bytes, over the limit",
                    self.connection
                );
                self.drop_connection(DropReason::FrameTooLarge(length)).await;
            }
            Err(InboundError::Io(err)) => self.on_read_failure(err).await,
        }
    }

    async fn on_body(&mut self, body: Vec<u8>) {
        self.instrumentation.mark(Meter::ByteRead, body.len() as u64);
        self.instrumentation.mark(Meter::MessageRead, 1);
        self.last_read = Instant::now();

        let authenticated = self.connection.is_authenticated();
        match self.codec.decode(&body, authenticated) {
            Ok(message) if self.connection.shared.state.is_active() => {
                self.handler.on_message(&self.connection, message)
            }
            Ok(_) => trace!("Discarding message from closing {}", self.connection),
            Err(err) => {
                self.instrumentation.mark(Meter::ErrorRead, 1);
                error!(
                    "Corrupt {} payload from {}: {err}",
                    if authenticated { "authenticated" } else { "plain" },
                    self.connection
                );
                self.drop_connection(DropReason::CorruptPayload).await;
            }
        }
    }

    async fn on_read_failure(&mut self, err: io::Error) {
        if !self.connection.shared.state.is_active() {
            debug!("Read on {} ended after close: {err}", self.connection);
            return;
        }

        self.instrumentation.mark(Meter::ErrorRead, 1);
        if self.inbound.is_reading_body() {
            error!("Error reading body from {}: {err}", self.connection);
        } else {
            debug!("Error reading header from {}: {err}", self.connection);
        }
        self.drop_connection(DropReason::ReadFailed(err.kind())).await;
    }

    fn on_write_complete(&mut self) {
        if let Some(frame) = self.outbound.complete_head() {
            self.instrumentation.mark(Meter::MessageWrite, 1);
            self.instrumentation.mark(Meter::ByteWrite, frame.len() as u64);
            self.last_write = Instant::now();
        }
    }

    async fn on_write_failure(&mut self, err: io::Error) {
        if !self.connection.shared.state.is_active() {
            debug!("Write on {} ended after close: {err}", self.connection);
            return;
        }

        self.instrumentation.mark(Meter::ErrorWrite, 1);
        error!("Error writing to {}: {err}", self.connection);
        self.drop_connection(DropReason::WriteFailed(err.kind())).await;
    }

    async fn on_idle_timer(&mut self) {
        match self.idle.check(Instant::now(), self.last_read, self.last_write) {
            IdleVerdict::ReadTimeout => {
                self.instrumentation.mark(Meter::TimeoutRead, 1);
                warn!("Nothing read from {} within the idle timeout", self.connection);
                self.drop_connection(DropReason::ReadTimeout).await;
            }
            IdleVerdict::WriteTimeout => {
                self.instrumentation.mark(Meter::TimeoutWrite, 1);
                warn!("Nothing written to {} within the idle timeout", self.connection);
                self.drop_connection(DropReason::WriteTimeout).await;
            }
            IdleVerdict::Alive => self.idle.arm(),
        }
    }

    /// Tear the connection down. Only the first call has any effect.
    ///
    /// The state may already be closing if a handle requested the drop.
    pub(crate) async fn drop_connection(&mut self, reason: DropReason) {
        self.connection.shared.state.begin_closing();
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        debug!("Dropping {}: {reason}", self.connection);
        self.idle.cancel();
        self.registry.notify_dropped(&self.connection, &reason);

        let discarded = self.outbound.clear();
        if discarded > 0 {
            debug!("Discarded {discarded} unsent frames for {}", self.connection);
        }

        match tokio::time::timeout(self.close_timeout, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("Error closing {}: {err}", self.connection),
            Err(_) => debug!("Timed out closing {}", self.connection),
        }
    }
}
