//! # Client Connection
//!
//! Drives one connection through handshake, login and play.
//!
//! ```text
//! connect ──> Handshake ──> Login ──(EncryptionRequest?)──> Play ──> Disconnect
//!                                                            │
//!                            receive loop: frames -> Dispatcher -> SessionHandler
//!                            sync loop:    every tick -> PlayerMovement
//!                            writer:       send queue -> socket [-> cipher]
//! ```
//!
//! Login runs inline in [`Client::connect`]; reads during login go straight to the
//! socket so nothing past the login reply is buffered before the cipher switch.
//! Once play begins, three tasks share the connection and any of them can end it.
//! Teardown happens exactly once, whoever gets there first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::core::frame::{read_frame, CompressionInfo, FrameCodec};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::{Dispatch, Dispatcher};
use crate::protocol::handshake::{answer_encryption_request, SharedSecret};
use crate::protocol::packets::{Handshake, LoginStart, LoginSuccess, Packet, PlayerMovement};
use crate::protocol::registry::PacketRegistry;
use crate::protocol::session::{PlayerSession, SessionHandler, SessionSnapshot};
use crate::protocol::state::{ConnectionState, Direction, StateCell};
use crate::transport::cipher::CipherStream;
use crate::transport::writer::{send_pipeline, PacketSender, SendHandle};
use crate::utils::buffer_pool::{BufferPool, DEFAULT_IDLE_TIMEOUT};
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::timeout::with_timeout_error;

pub use crate::protocol::state::DisconnectReason;

type BoxedSource = Box<dyn AsyncRead + Send + Unpin>;

/// State shared by the client handle and its tasks.
struct Shared {
    state: StateCell,
    shutdown: CancellationToken,
    torn_down: AtomicBool,
    closed: watch::Sender<Option<DisconnectReason>>,
    metrics: Arc<Metrics>,
}

impl Shared {
    fn new(metrics: Arc<Metrics>) -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            state: StateCell::new(ConnectionState::Handshake),
            shutdown: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            closed,
            metrics,
        }
    }

    /// Ends the connection. Only the first call has any effect.
    fn teardown(&self, reason: DisconnectReason) -> bool {
        if self
            .torn_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let previous = self.state.advance(ConnectionState::Disconnect);
        match &reason {
            DisconnectReason::Local => info!(?previous, "connection closed locally"),
            DisconnectReason::Remote(message) => {
                info!(?previous, reason = %message, "connection closed by server")
            }
            DisconnectReason::Error(message) => {
                warn!(?previous, error = %message, "connection failed")
            }
        }

        // The writer reads the reason once it sees the cancellation.
        self.closed.send_replace(Some(reason));
        self.shutdown.cancel();
        self.metrics.connection_closed();
        self.metrics.log_metrics();
        true
    }

    /// Connection facts for a packet with `packet_id`, as of now.
    fn snapshot(&self, base: &SessionSnapshot, packet_id: i32) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.get(),
            packet_id,
            ..*base
        }
    }
}

/// What login settled on.
struct LoginOutcome {
    success: LoginSuccess,
    secret: Option<SharedSecret>,
}

/// A connected client in the play state.
///
/// Dropping the client tears the connection down.
pub struct Client {
    shared: Arc<Shared>,
    sender: PacketSender,
    username: String,
    uuid: Uuid,
    encrypted: bool,
    compression: CompressionInfo,
}

impl Client {
    /// Connects over TCP and logs in as `config.username`.
    pub async fn connect(config: ClientConfig, handler: Arc<dyn SessionHandler>) -> Result<Client> {
        validate(&config)?;
        let address = config.address();
        let stream = with_timeout_error(
            async { TcpStream::connect(&address).await.map_err(ProtocolError::from) },
            config.connect_timeout,
        )
        .await
        .map_err(|e| {
            warn!(%address, error = %e, "connect failed");
            e
        })?;
        stream.set_nodelay(true)?;
        debug!(%address, "tcp connected");
        Self::connect_stream(stream, config, handler).await
    }

    /// Connects with a fresh [`PlayerSession`] as the handler.
    pub async fn connect_player(config: ClientConfig) -> Result<(Client, Arc<PlayerSession>)> {
        let session = Arc::new(PlayerSession::new());
        let client = Self::connect(config, session.clone()).await?;
        Ok((client, session))
    }

    /// Runs handshake and login over an already open stream, then starts play.
    #[instrument(skip_all, fields(username = %config.username))]
    pub async fn connect_stream<S>(
        stream: S,
        config: ClientConfig,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        validate(&config)?;
        let shared = Arc::new(Shared::new(Arc::new(Metrics::new())));
        Self::start(stream, config, handler, shared).await
    }

    async fn start<S>(
        stream: S,
        config: ClientConfig,
        handler: Arc<dyn SessionHandler>,
        shared: Arc<Shared>,
    ) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let metrics = shared.metrics.clone();
        let shutdown = shared.shutdown.clone();
        metrics.connection_established();

        let (mut read_half, write_half) = tokio::io::split(stream);
        let registry = PacketRegistry::standard();
        let pool = BufferPool::new(config.scratch_pool_size);
        let (sender, writer) = send_pipeline(
            Box::new(write_half),
            registry,
            pool.clone(),
            shutdown.clone(),
            shared.closed.subscribe(),
            metrics.clone(),
        );

        {
            let shared = shared.clone();
            tokio::spawn(async move {
                if let Err(e) = writer.run().await {
                    debug!(error = %e, "{}", constants::ERR_WRITER_GONE);
                    shared.teardown(DisconnectReason::Error(e.to_string()));
                }
            });
        }
        pool.spawn_reaper(DEFAULT_IDLE_TIMEOUT, shutdown.clone());

        metrics.login_attempt();
        let outcome = {
            let _timer = Timer::start("login");
            login(&config, &sender, &shared, registry, &mut read_half).await
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics.login_failed();
                if matches!(e, ProtocolError::Frame(_) | ProtocolError::UnexpectedPacket { .. }) {
                    metrics.protocol_error();
                }
                shared.teardown(DisconnectReason::from_error(&e));
                return Err(e);
            }
        };

        let encrypted = outcome.secret.is_some();
        let source = match play_source(read_half, &sender, outcome.secret) {
            Ok(source) => source,
            Err(e) => {
                shared.teardown(DisconnectReason::Error(e.to_string()));
                return Err(e);
            }
        };

        shared.state.advance(ConnectionState::Play);
        metrics.login_success();
        info!(
            username = %outcome.success.username,
            uuid = %outcome.success.uuid,
            encrypted,
            "login complete"
        );

        handler.attach(sender.clone());
        let base = SessionSnapshot {
            state: shared.state.get(),
            packet_id: 0,
            encrypted,
            uuid: outcome.success.uuid,
        };
        let dispatcher = Dispatcher::new(
            handler.clone(),
            sender.clone(),
            config.respawn_delay,
            shutdown.clone(),
            metrics.clone(),
        );
        let frames = FramedRead::new(source, FrameCodec::new(config.max_frame_size));

        tokio::spawn(receive_loop(frames, dispatcher, registry, shared.clone(), base));
        tokio::spawn(sync_loop(
            handler,
            sender.clone(),
            shared.clone(),
            config.sync_interval,
        ));

        Ok(Client {
            shared,
            sender,
            username: outcome.success.username,
            uuid: outcome.success.uuid,
            encrypted,
            compression: CompressionInfo::default(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Username as confirmed by the server.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Always disabled: compression is never negotiated.
    pub fn compression(&self) -> CompressionInfo {
        self.compression
    }

    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    /// A sender for use from other tasks.
    pub fn sender(&self) -> PacketSender {
        self.sender.clone()
    }

    /// Enqueues `packet`; fails once the connection is closed.
    pub fn send(&self, packet: impl Into<Packet>) -> Result<SendHandle> {
        self.sender.send(packet)
    }

    /// Closes the connection. Returns false if it was already closed.
    pub fn disconnect(&self) -> bool {
        self.shared.teardown(DisconnectReason::Local)
    }

    /// Waits until the connection has ended and returns why.
    pub async fn closed(&self) -> DisconnectReason {
        let mut rx = self.shared.closed.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(current) => (*current).clone(),
            Err(_) => None,
        };
        reason.unwrap_or_else(|| {
            DisconnectReason::Error(constants::ERR_CONNECTION_CLOSED.to_string())
        })
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.teardown(DisconnectReason::Local);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("username", &self.username)
            .field("uuid", &self.uuid)
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

fn validate(config: &ClientConfig) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::ConfigError(errors.join("; ")))
    }
}

/// The inbound stream for play, switching both directions to the cipher when
/// login negotiated a secret.
fn play_source<S>(
    read_half: ReadHalf<S>,
    sender: &PacketSender,
    secret: Option<SharedSecret>,
) -> Result<BoxedSource>
where
    S: AsyncRead + Send + 'static,
{
    match secret {
        Some(secret) => {
            sender.enable_cipher(secret.clone())?;
            Ok(Box::new(CipherStream::new(read_half, secret.as_bytes())?))
        }
        None => Ok(Box::new(read_half)),
    }
}

async fn login<S>(
    config: &ClientConfig,
    sender: &PacketSender,
    shared: &Shared,
    registry: &PacketRegistry,
    reader: &mut ReadHalf<S>,
) -> Result<LoginOutcome>
where
    S: AsyncRead,
{
    sender
        .send(Handshake::login(config.host.clone(), config.port))?
        .await?;
    shared.state.advance(ConnectionState::Login);
    sender.send(LoginStart::new(config.username.clone()))?.await?;
    debug!("login start sent");

    match read_login_packet(registry, reader, config.max_frame_size).await? {
        Packet::EncryptionRequest(request) => {
            debug!(server_id = %request.server_id, "server requested encryption");
            let negotiation = answer_encryption_request(&request)?;
            sender.send(negotiation.response)?.await?;

            match read_login_packet(registry, reader, config.max_frame_size).await? {
                Packet::LoginSuccess(success) => Ok(LoginOutcome {
                    success,
                    secret: Some(negotiation.secret),
                }),
                Packet::LoginDisconnect(disconnect) => {
                    Err(ProtocolError::LoginRejected(disconnect.reason))
                }
                other => Err(ProtocolError::UnexpectedPacket {
                    state: ConnectionState::Login,
                    kind: other.kind(),
                }),
            }
        }
        Packet::LoginSuccess(success) => Ok(LoginOutcome {
            success,
            secret: None,
        }),
        Packet::LoginDisconnect(disconnect) => Err(ProtocolError::LoginRejected(disconnect.reason)),
        other => Err(ProtocolError::UnexpectedPacket {
            state: ConnectionState::Login,
            kind: other.kind(),
        }),
    }
}

async fn read_login_packet<S>(
    registry: &PacketRegistry,
    reader: &mut ReadHalf<S>,
    max_frame_size: usize,
) -> Result<Packet>
where
    S: AsyncRead,
{
    let frame = read_frame(reader, max_frame_size).await.map_err(|e| {
        if matches!(e, ProtocolError::ConnectionClosed) {
            warn!("{}", constants::ERR_NO_LOGIN_REPLY);
        }
        e
    })?;
    let kind = registry
        .resolve_inbound(frame.id, Direction::In, ConnectionState::Login)
        .ok_or(ProtocolError::UnknownPacket {
            id: frame.id,
            state: ConnectionState::Login,
        })?;
    let mut body = frame.body;
    Packet::decode(kind, frame.id, &mut body)
}

async fn receive_loop(
    mut frames: FramedRead<BoxedSource, FrameCodec>,
    dispatcher: Dispatcher,
    registry: &'static PacketRegistry,
    shared: Arc<Shared>,
    base: SessionSnapshot,
) {
    let reason = loop {
        let next = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break None,
            next = frames.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                match e {
                    ProtocolError::Io(_) => shared.metrics.connection_error(),
                    _ => shared.metrics.protocol_error(),
                }
                break Some(DisconnectReason::Error(e.to_string()));
            }
            None => {
                break Some(DisconnectReason::Error(
                    constants::ERR_CONNECTION_CLOSED.to_string(),
                ))
            }
        };
        shared.metrics.frame_received(frame.declared_length() as u64);

        let Some(kind) = registry.resolve_inbound(frame.id, Direction::In, ConnectionState::Play)
        else {
            shared.metrics.unknown_packet();
            trace!(id = frame.id, len = frame.body.len(), "skipping unknown packet");
            continue;
        };

        let mut body = frame.body;
        let packet = match Packet::decode(kind, frame.id, &mut body) {
            Ok(packet) => packet,
            Err(e) => {
                shared.metrics.protocol_error();
                break Some(DisconnectReason::Error(e.to_string()));
            }
        };

        let snapshot = shared.snapshot(&base, frame.id);
        match dispatcher.dispatch(&snapshot, &packet) {
            Ok(Dispatch::Continue) => {}
            Ok(Dispatch::Disconnect(reason)) => break Some(DisconnectReason::Remote(reason)),
            Err(e) => break Some(DisconnectReason::Error(e.to_string())),
        }
    };

    if let Some(reason) = reason {
        shared.teardown(reason);
    }
}

async fn sync_loop(
    handler: Arc<dyn SessionHandler>,
    sender: PacketSender,
    shared: Arc<Shared>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if shared.state.get() != ConnectionState::Play {
            break;
        }

        let Some(update) = handler.pending_movement() else {
            continue;
        };
        let movement = PlayerMovement::from(update);
        if let Err(e) = sender.send(movement) {
            debug!(error = %e, "sync loop stopping");
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MAX_FRAME_SIZE;
    use crate::core::frame::Frame;
    use crate::protocol::packets::{
        Disconnect, EncryptionRequest, KeepAlive, LoginDisconnect, PacketKind,
    };
    use bytes::{Bytes, BytesMut};
    use rand_core::OsRng;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::RsaPrivateKey;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::Barrier;

    async fn send_frame(server: &mut DuplexStream, packet: impl Into<Packet>, id: i32) {
        let mut body = BytesMut::new();
        packet.into().encode_body(&mut body);
        server
            .write_all(&Frame::new(id, body.freeze()).to_bytes())
            .await
            .unwrap();
    }

    async fn expect_frame(server: &mut DuplexStream) -> Frame {
        read_frame(server, MAX_FRAME_SIZE).await.unwrap()
    }

    fn config() -> ClientConfig {
        ClientConfig {
            username: "Steve".into(),
            ..Default::default()
        }
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new(Arc::new(Metrics::new())))
    }

    /// Consumes handshake and login start, demands encryption and waits for the
    /// client's answer.
    async fn demand_encryption(server: &mut DuplexStream) {
        expect_frame(server).await;
        expect_frame(server).await;

        let key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let der = key.to_public_key().to_public_key_der().unwrap();
        send_frame(
            server,
            EncryptionRequest {
                server_id: String::new(),
                public_key: Bytes::copy_from_slice(der.as_bytes()),
                verify_token: Bytes::from_static(&[1, 2, 3, 4]),
            },
            0x01,
        )
        .await;

        let response = expect_frame(server).await;
        assert_eq!(response.id, 0x01);
    }

    #[tokio::test]
    async fn offline_login_reaches_play() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let session = Arc::new(PlayerSession::new());
        let connecting = tokio::spawn(Client::connect_stream(client_io, config(), session.clone()));

        let handshake = expect_frame(&mut server).await;
        assert_eq!(handshake.id, 0x00);
        let login_start = expect_frame(&mut server).await;
        assert_eq!(login_start.id, 0x00);

        let uuid = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        send_frame(
            &mut server,
            LoginSuccess {
                uuid,
                username: "Steve".into(),
            },
            0x02,
        )
        .await;

        let client = connecting.await.unwrap().unwrap();
        assert_eq!(client.state(), ConnectionState::Play);
        assert_eq!(client.uuid(), uuid);
        assert!(!client.is_encrypted());
        assert!(!client.compression().enabled);
        assert!(session.sender().is_some());

        assert!(client.disconnect());
        assert!(!client.disconnect());
        assert_eq!(client.closed().await, DisconnectReason::Local);
        assert_eq!(client.state(), ConnectionState::Disconnect);
    }

    #[tokio::test]
    async fn login_disconnect_is_rejection() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let connecting = tokio::spawn(Client::connect_stream(
            client_io,
            config(),
            Arc::new(PlayerSession::new()),
        ));

        expect_frame(&mut server).await;
        expect_frame(&mut server).await;
        send_frame(
            &mut server,
            LoginDisconnect {
                reason: "\"banned\"".into(),
            },
            0x00,
        )
        .await;

        let err = connecting.await.unwrap().unwrap_err();
        assert!(matches!(err, ProtocolError::LoginRejected(reason) if reason == "\"banned\""));
    }

    #[tokio::test]
    async fn unknown_login_packet_is_fatal() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let connecting = tokio::spawn(Client::connect_stream(
            client_io,
            config(),
            Arc::new(PlayerSession::new()),
        ));

        expect_frame(&mut server).await;
        expect_frame(&mut server).await;
        // 0x05 has no login meaning.
        server.write_all(&[0x02, 0x05, 0x00]).await.unwrap();

        let err = connecting.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnknownPacket {
                id: 0x05,
                state: ConnectionState::Login
            }
        ));
    }

    #[tokio::test]
    async fn server_disconnect_closes_remotely() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let connecting = tokio::spawn(Client::connect_stream(
            client_io,
            config(),
            Arc::new(PlayerSession::new()),
        ));
        expect_frame(&mut server).await;
        expect_frame(&mut server).await;
        send_frame(&mut server, LoginSuccess::default(), 0x02).await;
        let client = connecting.await.unwrap().unwrap();

        send_frame(&mut server, KeepAlive { id: 9 }, 0x00).await;
        // Movement frames may interleave; find the echo.
        loop {
            let frame = expect_frame(&mut server).await;
            if frame.id == 0x00 {
                assert_eq!(frame.body.as_ref(), &[9]);
                break;
            }
        }

        send_frame(
            &mut server,
            Disconnect {
                reason: "restart".into(),
            },
            0x40,
        )
        .await;
        assert_eq!(
            client.closed().await,
            DisconnectReason::Remote("restart".into())
        );
        assert!(matches!(
            client.send(KeepAlive { id: 1 }),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn login_disconnect_after_encryption_response_is_rejection() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let shared = shared();
        let connecting = tokio::spawn(Client::start(
            client_io,
            config(),
            Arc::new(PlayerSession::new()),
            shared.clone(),
        ));

        demand_encryption(&mut server).await;
        // Still in the clear: the cipher only starts after a login success.
        send_frame(
            &mut server,
            LoginDisconnect {
                reason: "banned".into(),
            },
            0x00,
        )
        .await;

        let err = connecting.await.unwrap().unwrap_err();
        assert!(matches!(err, ProtocolError::LoginRejected(reason) if reason == "banned"));
        assert_eq!(shared.state.get(), ConnectionState::Disconnect);
        assert_eq!(
            *shared.closed.borrow(),
            Some(DisconnectReason::Remote("banned".into()))
        );
        assert!(shared.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn second_encryption_request_is_unexpected() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let shared = shared();
        let connecting = tokio::spawn(Client::start(
            client_io,
            config(),
            Arc::new(PlayerSession::new()),
            shared.clone(),
        ));

        demand_encryption(&mut server).await;
        send_frame(&mut server, EncryptionRequest::default(), 0x01).await;

        let err = connecting.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedPacket {
                state: ConnectionState::Login,
                kind: PacketKind::EncryptionRequest,
            }
        ));
        assert_eq!(shared.state.get(), ConnectionState::Disconnect);
        assert!(matches!(
            *shared.closed.borrow(),
            Some(DisconnectReason::Error(_))
        ));
        let metrics = shared.metrics.snapshot();
        assert_eq!(metrics.logins_failed, 1);
        assert_eq!(metrics.protocol_errors, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_teardowns_have_one_winner() {
        const TASKS: usize = 16;
        let shared = shared();
        shared.metrics.connection_established();
        let barrier = Arc::new(Barrier::new(TASKS));

        let tasks: Vec<_> = (0..TASKS)
            .map(|i| {
                let shared = shared.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    let reason = DisconnectReason::Error(format!("task {i}"));
                    (shared.teardown(reason.clone()), reason)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            let (won, reason) = task.await.unwrap();
            if won {
                winners.push(reason);
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(*shared.closed.borrow(), Some(winners[0].clone()));
        assert_eq!(shared.state.get(), ConnectionState::Disconnect);
        assert_eq!(shared.metrics.snapshot().connections_active, 0);

        assert!(!shared.teardown(DisconnectReason::Local));
        assert_eq!(*shared.closed.borrow(), Some(winners[0].clone()));
    }

    #[test]
    fn snapshots_read_the_live_state() {
        let shared = shared();
        shared.metrics.connection_established();
        shared.state.advance(ConnectionState::Play);
        let base = SessionSnapshot {
            state: ConnectionState::Play,
            packet_id: 0,
            encrypted: true,
            uuid: Uuid::nil(),
        };

        let live = shared.snapshot(&base, 0x01);
        assert_eq!(live.state, ConnectionState::Play);
        assert_eq!(live.packet_id, 0x01);
        assert!(live.encrypted);

        shared.teardown(DisconnectReason::Local);
        assert_eq!(
            shared.snapshot(&base, 0x02).state,
            ConnectionState::Disconnect
        );
    }

    #[tokio::test]
    async fn invalid_config_is_refused() {
        let (client_io, _server) = tokio::io::duplex(64);
        let bad = ClientConfig {
            username: String::new(),
            ..Default::default()
        };
        let err = Client::connect_stream(client_io, bad, Arc::new(PlayerSession::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ConfigError(_)));
    }
}
