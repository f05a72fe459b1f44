//! # Session Handler
//!
//! The connection core decodes packets and applies protocol reflexes; everything
//! game-related is delegated to a [`SessionHandler`]. The handler owns the player
//! state: position, look, health, aliveness, entity id.
//!
//! The receive loop is the only writer of that state; the sync loop reads it once
//! per tick. [`PlayerSession`] keeps it in one struct behind a single mutex, so each
//! read is a consistent snapshot and the latest value wins.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::types::{BlockPos, Look, Vec3d};
use crate::protocol::packets::{Packet, PlayerMovement};
use crate::protocol::state::ConnectionState;
use crate::transport::writer::PacketSender;

/// Blocks moved per input step of [`PlayerSession::nudge`].
pub const MOVE_STEP: f64 = 0.16;

/// Connection facts handed to the handler alongside each packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub packet_id: i32,
    pub encrypted: bool,
    pub uuid: Uuid,
}

/// Movement the handler wants sent on this sync tick.
///
/// With neither position nor look set, only the grounded flag is sent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementUpdate {
    pub position: Option<Vec3d>,
    pub look: Option<Look>,
    pub on_ground: bool,
}

impl From<MovementUpdate> for PlayerMovement {
    fn from(update: MovementUpdate) -> Self {
        PlayerMovement {
            position: update.position,
            look: update.look,
            on_ground: update.on_ground,
        }
    }
}

/// Game-side consumer of a connection.
///
/// Called from the connection's tasks, so every method takes `&self` and must not
/// block for long.
pub trait SessionHandler: Send + Sync + 'static {
    /// Called once when play begins, with a handle for sending packets.
    fn attach(&self, _sender: PacketSender) {}

    /// Every decoded play packet, after protocol reflexes such as the keep-alive echo.
    fn on_packet(&self, snapshot: &SessionSnapshot, packet: &Packet);

    /// Polled once per sync tick. `None` sends nothing.
    fn pending_movement(&self) -> Option<MovementUpdate>;

    fn is_alive(&self) -> bool;

    /// The player's own entity id, `0` before join.
    fn entity_id(&self) -> i32;
}

/// Player state tracked by [`PlayerSession`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerState {
    pub entity_id: i32,
    pub position: Vec3d,
    pub look: Look,
    pub on_ground: bool,
    pub health: f32,
    pub food: i32,
    pub saturation: f32,
    pub alive: bool,
    pub spawn_point: Option<BlockPos>,
    moved: bool,
    rotated: bool,
}

/// Default handler: tracks the local player and reports movement every tick.
#[derive(Debug, Default)]
pub struct PlayerSession {
    state: Mutex<PlayerState>,
    sender: Mutex<Option<PacketSender>>,
}

impl PlayerSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current player state.
    pub fn snapshot(&self) -> PlayerState {
        self.lock().clone()
    }

    /// Moves the player by whole input steps along x, z and y.
    pub fn nudge(&self, dx: i32, dz: i32, dy: i32) {
        let mut state = self.lock();
        state.position = state.position.offset(
            f64::from(dx) * MOVE_STEP,
            f64::from(dy) * MOVE_STEP,
            f64::from(dz) * MOVE_STEP,
        );
        state.moved = true;
    }

    pub fn turn(&self, look: Look) {
        let mut state = self.lock();
        state.look = look;
        state.rotated = true;
    }

    pub fn set_on_ground(&self, on_ground: bool) {
        self.lock().on_ground = on_ground;
    }

    /// Sender attached when play began, if any.
    pub fn sender(&self) -> Option<PacketSender> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionHandler for PlayerSession {
    fn attach(&self, sender: PacketSender) {
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    fn on_packet(&self, _snapshot: &SessionSnapshot, packet: &Packet) {
        let mut state = self.lock();
        match packet {
            Packet::JoinGame(join) => {
                state.entity_id = join.entity_id;
                info!(entity_id = join.entity_id, game_mode = join.game_mode, "joined game");
            }
            Packet::UpdateHealth(update) => {
                state.health = update.health;
                state.food = update.food;
                state.saturation = update.saturation;
                state.alive = update.health > 0.0;
                debug!(health = update.health, food = update.food, "health updated");
            }
            Packet::EntityStatus(status) if status.entity_id == state.entity_id => {
                if status.is_death() {
                    state.alive = false;
                    info!("player died");
                }
            }
            Packet::SpawnPosition(spawn) => {
                state.spawn_point = Some(spawn.location);
            }
            Packet::PositionAndLook(sync) => {
                let (position, look) = sync.apply(state.position, state.look);
                state.position = position;
                state.look = look;
                debug!(%position, "server corrected position");
            }
            Packet::EntityVelocity(velocity) if velocity.entity_id == state.entity_id => {
                let delta = velocity.velocity();
                state.position = state.position.offset(delta.x, delta.y, delta.z);
                state.moved = true;
            }
            Packet::ServerChat(chat) => {
                info!(position = ?chat.position, "chat: {}", chat.json);
            }
            _ => {}
        }
    }

    fn pending_movement(&self) -> Option<MovementUpdate> {
        let mut state = self.lock();
        let update = MovementUpdate {
            position: state.moved.then_some(state.position),
            look: state.rotated.then_some(state.look),
            on_ground: state.on_ground,
        };
        state.moved = false;
        state.rotated = false;
        Some(update)
    }

    fn is_alive(&self) -> bool {
        self.lock().alive
    }

    fn entity_id(&self) -> i32 {
        self.lock().entity_id
    }
}
