use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::packets::{ClientStatus, Packet};
use crate::protocol::session::{SessionHandler, SessionSnapshot};
use crate::transport::writer::PacketSender;
use crate::utils::metrics::Metrics;

/// What the receive loop should do after a packet has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    /// The server ended the session with this reason.
    Disconnect(String),
}

/// Routes play packets: protocol reflexes first, then the session handler.
pub struct Dispatcher {
    handler: Arc<dyn SessionHandler>,
    sender: PacketSender,
    respawn: RespawnScheduler,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        handler: Arc<dyn SessionHandler>,
        sender: PacketSender,
        respawn_delay: Duration,
        shutdown: CancellationToken,
        metrics: Arc<Metrics>,
    ) -> Self {
        let respawn = RespawnScheduler::new(
            handler.clone(),
            sender.clone(),
            respawn_delay,
            shutdown,
            metrics.clone(),
        );
        Self {
            handler,
            sender,
            respawn,
            metrics,
        }
    }

    /// Handles one decoded play packet.
    ///
    /// Keep-alives are echoed before the handler sees them. Respawn triggers are
    /// evaluated after the handler has updated its state.
    pub fn dispatch(&self, snapshot: &SessionSnapshot, packet: &Packet) -> Result<Dispatch> {
        if let Packet::KeepAlive(keep_alive) = packet {
            // Completion is not awaited; the writer preserves order.
            let _ = self.sender.send(*keep_alive)?;
            self.metrics.keep_alive_echoed();
            debug!(id = keep_alive.id, "keep-alive echoed");
        }

        self.handler.on_packet(snapshot, packet);

        if self.triggers_respawn(packet) {
            self.respawn.request();
        }

        match packet {
            Packet::Disconnect(disconnect) => {
                info!(reason = %disconnect.reason, "server closed the session");
                Ok(Dispatch::Disconnect(disconnect.reason.clone()))
            }
            _ => Ok(Dispatch::Continue),
        }
    }

    fn triggers_respawn(&self, packet: &Packet) -> bool {
        match packet {
            Packet::Respawn(_) | Packet::JoinGame(_) => true,
            Packet::EntityInit(init) => init.entity_id == self.handler.entity_id(),
            Packet::EntityStatus(status) => {
                status.is_death() && status.entity_id == self.handler.entity_id()
            }
            _ => false,
        }
    }

    pub fn respawn_pending(&self) -> bool {
        self.respawn.is_pending()
    }
}

/// At most one delayed respawn request in flight.
struct RespawnScheduler {
    handler: Arc<dyn SessionHandler>,
    sender: PacketSender,
    delay: Duration,
    pending: Arc<AtomicBool>,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl RespawnScheduler {
    fn new(
        handler: Arc<dyn SessionHandler>,
        sender: PacketSender,
        delay: Duration,
        shutdown: CancellationToken,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            handler,
            sender,
            delay,
            pending: Arc::new(AtomicBool::new(false)),
            shutdown,
            metrics,
        }
    }

    fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Schedules a respawn if the player is dead and none is pending.
    ///
    /// Returns whether a new timer was started.
    fn request(&self) -> bool {
        if self.handler.is_alive() {
            return false;
        }
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let handler = self.handler.clone();
        let sender = self.sender.clone();
        let pending = self.pending.clone();
        let shutdown = self.shutdown.clone();
        let metrics = self.metrics.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !handler.is_alive() {
                        match sender.send(ClientStatus::respawn()) {
                            Ok(_) => {
                                metrics.respawn_requested();
                                info!("respawn requested");
                            }
                            Err(e) => warn!(error = %e, "respawn request not sent"),
                        }
                    }
                }
            }
            pending.store(false, Ordering::Release);
        });
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MAX_FRAME_SIZE;
    use crate::core::frame::{read_frame, Frame};
    use crate::protocol::packets::{
        Disconnect, EntityInit, EntityStatus, EntityStatusCode, JoinGame, KeepAlive, TimeUpdate,
    };
    use crate::protocol::registry::PacketRegistry;
    use crate::protocol::session::PlayerSession;
    use crate::protocol::state::ConnectionState;
    use crate::transport::writer::send_pipeline;
    use crate::utils::buffer_pool::BufferPool;
    use tokio::io::DuplexStream;

    const DELAY: Duration = Duration::from_millis(1250);

    struct Rig {
        dispatcher: Dispatcher,
        session: Arc<PlayerSession>,
        server: DuplexStream,
        shutdown: CancellationToken,
        metrics: Arc<Metrics>,
    }

    fn rig() -> Rig {
        let (client, server) = tokio::io::duplex(4096);
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(Metrics::new());
        let (sender, writer) = send_pipeline(
            Box::new(client),
            PacketRegistry::standard(),
            BufferPool::new(2),
            shutdown.clone(),
            tokio::sync::watch::channel(None).1,
            metrics.clone(),
        );
        tokio::spawn(writer.run());
        let session = Arc::new(PlayerSession::new());
        let dispatcher = Dispatcher::new(
            session.clone(),
            sender,
            DELAY,
            shutdown.clone(),
            metrics.clone(),
        );
        Rig {
            dispatcher,
            session,
            server,
            shutdown,
            metrics,
        }
    }

    fn snap() -> SessionSnapshot {
        SessionSnapshot {
            state: ConnectionState::Play,
            packet_id: 0,
            encrypted: false,
            uuid: uuid::Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn keep_alive_is_echoed_verbatim() {
        let mut rig = rig();
        let outcome = rig
            .dispatcher
            .dispatch(&snap(), &KeepAlive { id: 424242 }.into())
            .unwrap();
        assert_eq!(outcome, Dispatch::Continue);

        let echoed = read_frame(&mut rig.server, MAX_FRAME_SIZE).await.unwrap();
        let mut expected = bytes::BytesMut::new();
        Packet::from(KeepAlive { id: 424242 }).encode_body(&mut expected);
        assert_eq!(echoed, Frame::new(0x00, expected.freeze()));
        assert_eq!(rig.metrics.snapshot().keep_alives_echoed, 1);
        rig.shutdown.cancel();
    }

    #[tokio::test]
    async fn server_disconnect_is_reported() {
        let rig = rig();
        let outcome = rig
            .dispatcher
            .dispatch(
                &snap(),
                &Disconnect {
                    reason: "bye".into(),
                }
                .into(),
            )
            .unwrap();
        assert_eq!(outcome, Dispatch::Disconnect("bye".into()));
        rig.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_respawn_timer_at_a_time() {
        let mut rig = rig();
        rig.dispatcher
            .dispatch(
                &snap(),
                &JoinGame {
                    entity_id: 5,
                    ..Default::default()
                }
                .into(),
            )
            .unwrap();
        assert!(rig.dispatcher.respawn_pending());

        // Further triggers while pending are no-ops.
        rig.dispatcher
            .dispatch(&snap(), &EntityInit { entity_id: 5 }.into())
            .unwrap();
        rig.dispatcher
            .dispatch(
                &snap(),
                &EntityStatus {
                    entity_id: 5,
                    status: EntityStatusCode::Dead,
                }
                .into(),
            )
            .unwrap();

        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;
        assert!(!rig.dispatcher.respawn_pending());

        let frame = read_frame(&mut rig.server, MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(frame, Frame::new(0x16, vec![0x00]));
        assert_eq!(rig.metrics.snapshot().respawns_requested, 1);
        rig.shutdown.cancel();
    }

    #[tokio::test]
    async fn living_player_is_not_respawned() {
        let rig = rig();
        rig.session.on_packet(
            &snap(),
            &crate::protocol::packets::UpdateHealth {
                health: 10.0,
                food: 20,
                saturation: 0.0,
            }
            .into(),
        );
        rig.dispatcher
            .dispatch(&snap(), &JoinGame::default().into())
            .unwrap();
        assert!(!rig.dispatcher.respawn_pending());
        rig.shutdown.cancel();
    }

    #[tokio::test]
    async fn unrelated_packets_do_not_trigger_respawn() {
        let rig = rig();
        rig.dispatcher
            .dispatch(&snap(), &TimeUpdate::default().into())
            .unwrap();
        rig.dispatcher
            .dispatch(&snap(), &EntityInit { entity_id: 77 }.into())
            .unwrap();
        assert!(!rig.dispatcher.respawn_pending());
        rig.shutdown.cancel();
    }
}
