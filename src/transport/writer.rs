//! # Send Pipeline
//!
//! All outbound frames go through one unbounded queue drained by one writer task,
//! so the bytes of two packets can never interleave on the socket.
//!
//! ```text
//! PacketSender::send(packet)
//!   -> registry id (static or dynamic)
//!   -> body into a pooled scratch buffer
//!   -> varint(len) | varint(id) | body
//!   -> queue ----> FrameWriter (write_all + flush) ----> socket [-> cipher]
//! ```
//!
//! `send` never waits on the network; it returns a [`SendHandle`] that resolves once
//! the frame has been written, or fails. A write error fails that frame's handle and
//! stops the writer; it never retries or skips ahead. Frames still queued when the
//! writer stops fail with the error that ended the connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::SharedSecret;
use crate::protocol::packets::Packet;
use crate::protocol::registry::PacketRegistry;
use crate::protocol::state::DisconnectReason;
use crate::transport::cipher::CipherStream;
use crate::utils::buffer_pool::BufferPool;
use crate::utils::metrics::Metrics;

/// Boxed write half the writer drains into.
pub type BoxedSink = Box<dyn AsyncWrite + Send + Unpin>;

/// One fully framed packet plus its completion signal.
#[derive(Debug)]
pub struct SendQueueEntry {
    pub frame: Bytes,
    completion: oneshot::Sender<Result<()>>,
}

impl SendQueueEntry {
    fn complete(self, result: Result<()>) {
        // The caller may have dropped its handle; that is fine.
        let _ = self.completion.send(result);
    }
}

#[derive(Debug)]
pub(crate) enum WriterCommand {
    Frame(SendQueueEntry),
    /// Wrap the sink in the cipher. Frames queued before this go out in the clear.
    EnableCipher(SharedSecret),
}

/// Resolves when the frame has been written to the socket.
///
/// A writer that stops before reaching the frame resolves it with the error derived
/// from the [`DisconnectReason`]: [`ProtocolError::ConnectionClosed`] for a local
/// close, [`ProtocolError::Disconnected`] for a server disconnect, an I/O error
/// otherwise.
#[derive(Debug)]
#[must_use = "dropping the handle does not cancel the send, but the outcome is lost"]
pub struct SendHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl Future for SendHandle {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_) => Poll::Ready(Err(ProtocolError::ConnectionClosed)),
        }
    }
}

/// Cloneable producer side of the send queue.
#[derive(Clone)]
pub struct PacketSender {
    queue: mpsc::UnboundedSender<WriterCommand>,
    registry: &'static PacketRegistry,
    pool: BufferPool,
    closed: CancellationToken,
}

impl PacketSender {
    /// Serializes, frames and enqueues `packet`.
    ///
    /// Fails immediately with [`ProtocolError::ConnectionClosed`] once the connection
    /// is torn down.
    pub fn send(&self, packet: impl Into<Packet>) -> Result<SendHandle> {
        let packet = packet.into();
        self.ensure_open()?;
        let id = self.registry.id_for(&packet)?;

        let mut scratch = self.pool.acquire();
        packet.encode_body(&mut scratch);
        trace!(kind = packet.kind().name(), id, len = scratch.len(), "enqueue packet");
        self.send_raw(id, &scratch)
    }

    /// Frames and enqueues an already encoded body under `id`.
    pub fn send_raw(&self, id: i32, body: &[u8]) -> Result<SendHandle> {
        self.ensure_open()?;
        let mut framed = BytesMut::new();
        Frame::encode_parts(id, body, &mut framed);
        self.enqueue(framed.freeze())
    }

    fn enqueue(&self, frame: Bytes) -> Result<SendHandle> {
        let (completion, rx) = oneshot::channel();
        self.queue
            .send(WriterCommand::Frame(SendQueueEntry { frame, completion }))
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        Ok(SendHandle { rx })
    }

    /// Switches the writer to the cipher after every frame queued so far.
    pub(crate) fn enable_cipher(&self, secret: SharedSecret) -> Result<()> {
        self.ensure_open()?;
        self.queue
            .send(WriterCommand::EnableCipher(secret))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.queue.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(ProtocolError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for PacketSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketSender")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Consumer side: the only code that writes to the socket.
pub struct FrameWriter {
    commands: mpsc::UnboundedReceiver<WriterCommand>,
    sink: BoxedSink,
    shutdown: CancellationToken,
    closed: watch::Receiver<Option<DisconnectReason>>,
    metrics: Arc<Metrics>,
}

/// Creates a connected sender/writer pair over `sink`.
///
/// `shutdown` both stops the writer and makes the sender refuse new packets.
/// `closed` carries the reason the connection ended; it must be set before
/// `shutdown` fires.
pub fn send_pipeline(
    sink: BoxedSink,
    registry: &'static PacketRegistry,
    pool: BufferPool,
    shutdown: CancellationToken,
    closed: watch::Receiver<Option<DisconnectReason>>,
    metrics: Arc<Metrics>,
) -> (PacketSender, FrameWriter) {
    let (queue, commands) = mpsc::unbounded_channel();
    let sender = PacketSender {
        queue,
        registry,
        pool,
        closed: shutdown.clone(),
    };
    let writer = FrameWriter {
        commands,
        sink,
        shutdown,
        closed,
        metrics,
    };
    (sender, writer)
}

impl FrameWriter {
    /// Drains the queue until shutdown, the last sender is dropped, or a write fails.
    ///
    /// Queued frames that were never reached fail with the reason the connection
    /// ended, or with this writer's own error.
    pub async fn run(mut self) -> Result<()> {
        let outcome = self.drain().await;
        self.commands.close();
        let cause = match &outcome {
            Err(e) => DisconnectReason::Error(e.to_string()),
            Ok(()) => self
                .closed
                .borrow()
                .clone()
                .unwrap_or(DisconnectReason::Local),
        };
        self.fail_unsent(&cause);
        if let Err(e) = self.sink.shutdown().await {
            debug!(error = %e, "sink shutdown failed");
        }
        outcome
    }

    fn fail_unsent(&mut self, cause: &DisconnectReason) {
        let mut failed = 0usize;
        while let Ok(command) = self.commands.try_recv() {
            if let WriterCommand::Frame(entry) = command {
                entry.complete(Err(cause.to_error()));
                failed += 1;
            }
        }
        if failed > 0 {
            debug!(failed, ?cause, "unsent frames failed");
        }
    }

    async fn drain(&mut self) -> Result<()> {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(()),
                command = self.commands.recv() => command,
            };

            match command {
                None => return Ok(()),
                Some(WriterCommand::Frame(entry)) => {
                    match write_frame(&mut self.sink, &entry.frame).await {
                        Ok(()) => {
                            self.metrics.frame_sent(entry.frame.len() as u64);
                            entry.complete(Ok(()));
                        }
                        Err(e) => {
                            warn!(error = %e, "frame write failed");
                            self.metrics.connection_error();
                            entry.complete(Err(io::Error::new(e.kind(), e.to_string()).into()));
                            return Err(e.into());
                        }
                    }
                }
                Some(WriterCommand::EnableCipher(secret)) => {
                    self.sink.flush().await?;
                    let plain = std::mem::replace(&mut self.sink, Box::new(tokio::io::sink()));
                    self.sink = Box::new(CipherStream::new(plain, secret.as_bytes())?);
                    debug!("writer switched to encrypted stream");
                }
            }
        }
    }
}

async fn write_frame(sink: &mut BoxedSink, frame: &[u8]) -> io::Result<()> {
    sink.write_all(frame).await?;
    sink.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MAX_FRAME_SIZE;
    use crate::core::frame::read_frame;
    use crate::protocol::packets::{ClientChat, KeepAlive, LoginSuccess};
    use tokio::io::AsyncReadExt;

    type Closed = watch::Sender<Option<DisconnectReason>>;

    fn pipeline(sink: BoxedSink) -> (PacketSender, FrameWriter, CancellationToken, Closed) {
        let shutdown = CancellationToken::new();
        let (closed, closed_rx) = watch::channel(None);
        let (sender, writer) = send_pipeline(
            sink,
            PacketRegistry::standard(),
            BufferPool::new(2),
            shutdown.clone(),
            closed_rx,
            Arc::new(Metrics::new()),
        );
        (sender, writer, shutdown, closed)
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (sender, writer, shutdown, _closed) = pipeline(Box::new(client));
        let task = tokio::spawn(writer.run());

        let first = sender.send(KeepAlive { id: 7 }).unwrap();
        let second = sender.send(ClientChat::new("hi")).unwrap();
        first.await.unwrap();
        second.await.unwrap();

        let a = read_frame(&mut server, MAX_FRAME_SIZE).await.unwrap();
        let b = read_frame(&mut server, MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(a, Frame::new(0x00, vec![7]));
        assert_eq!(b, Frame::new(0x01, vec![2, b'h', b'i']));

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn send_after_shutdown_fails_fast() {
        let (client, _server) = tokio::io::duplex(64);
        let (sender, writer, shutdown, _closed) = pipeline(Box::new(client));
        shutdown.cancel();
        writer.run().await.unwrap();

        assert!(matches!(
            sender.send(KeepAlive { id: 1 }),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn unreached_frames_resolve_closed() {
        let (client, _server) = tokio::io::duplex(64);
        let (sender, writer, shutdown, _closed) = pipeline(Box::new(client));
        let handle = sender.send(KeepAlive { id: 1 }).unwrap();
        shutdown.cancel();
        writer.run().await.unwrap();

        assert!(matches!(handle.await, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn unreached_frames_carry_the_server_reason() {
        let (client, _server) = tokio::io::duplex(64);
        let (sender, writer, shutdown, closed) = pipeline(Box::new(client));
        let first = sender.send(KeepAlive { id: 1 }).unwrap();
        let second = sender.send(ClientChat::new("still queued")).unwrap();

        closed.send_replace(Some(DisconnectReason::Remote("restart".into())));
        shutdown.cancel();
        writer.run().await.unwrap();

        for handle in [first, second] {
            assert!(matches!(
                handle.await,
                Err(ProtocolError::Disconnected(reason)) if reason == "restart"
            ));
        }
    }

    #[tokio::test]
    async fn inbound_only_packets_are_refused() {
        let (client, _server) = tokio::io::duplex(64);
        let (sender, _writer, _shutdown, _closed) = pipeline(Box::new(client));
        assert!(matches!(
            sender.send(LoginSuccess::default()),
            Err(ProtocolError::UnsupportedDirection { .. })
        ));
    }

    #[tokio::test]
    async fn cipher_applies_only_after_switch() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (sender, writer, shutdown, _closed) = pipeline(Box::new(client));
        let task = tokio::spawn(writer.run());

        let secret = SharedSecret::from_bytes(&[5u8; 16]).unwrap();
        sender.send(KeepAlive { id: 1 }).unwrap().await.unwrap();
        sender.enable_cipher(secret.clone()).unwrap();
        sender.send(KeepAlive { id: 2 }).unwrap().await.unwrap();

        let mut plain = [0u8; 3];
        server.read_exact(&mut plain).await.unwrap();
        assert_eq!(plain, [0x02, 0x00, 0x01]);

        let mut decrypting = CipherStream::new(&mut server, secret.as_bytes()).unwrap();
        let frame = read_frame(&mut decrypting, MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(frame, Frame::new(0x00, vec![2]));

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn write_failure_fails_the_frame() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let (sender, writer, _shutdown, _closed) = pipeline(Box::new(client));
        let handle = sender.send(KeepAlive { id: 3 }).unwrap();

        assert!(writer.run().await.is_err());
        assert!(matches!(handle.await, Err(ProtocolError::Io(_))));
    }
}
