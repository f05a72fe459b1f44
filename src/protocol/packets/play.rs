//! Play-state packets.

use bytes::{Buf, BufMut};

use crate::core::codec::{ProtocolRead, ProtocolWrite};
use crate::core::types::{BlockPos, Look, Vec3d};
use crate::error::Result;

/// Velocity units per block per tick.
const VELOCITY_SCALE: f64 = 8000.0;

/// Ticks in one in-game day.
const TICKS_PER_DAY: i64 = 24_000;

const HARDCORE_BIT: u8 = 0x08;

/// Liveness probe. Goes both ways with the same id; the client echoes it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeepAlive {
    pub id: i32,
}

impl KeepAlive {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            id: buf.read_varint()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_varint(self.id);
    }
}

/// Sent once after login; carries the client's own entity id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinGame {
    pub entity_id: i32,
    pub game_mode: u8,
    pub hardcore: bool,
    pub dimension: i8,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub reduced_debug_info: bool,
}

impl JoinGame {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        let entity_id = buf.read_int()?;
        let mode = buf.read_ubyte()?;
        Ok(Self {
            entity_id,
            game_mode: mode & !HARDCORE_BIT,
            hardcore: mode & HARDCORE_BIT != 0,
            dimension: buf.read_sbyte()?,
            difficulty: buf.read_ubyte()?,
            max_players: buf.read_ubyte()?,
            level_type: buf.read_string()?,
            reduced_debug_info: buf.read_bool()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.entity_id);
        let hardcore = if self.hardcore { HARDCORE_BIT } else { 0 };
        buf.put_u8(self.game_mode | hardcore);
        buf.put_i8(self.dimension);
        buf.put_u8(self.difficulty);
        buf.put_u8(self.max_players);
        buf.write_string(&self.level_type);
        buf.write_bool(self.reduced_debug_info);
    }
}

/// Where an incoming chat message is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPosition {
    #[default]
    Chat,
    System,
    Hotbar,
    Other(i8),
}

impl From<i8> for ChatPosition {
    fn from(raw: i8) -> Self {
        match raw {
            0 => ChatPosition::Chat,
            1 => ChatPosition::System,
            2 => ChatPosition::Hotbar,
            other => ChatPosition::Other(other),
        }
    }
}

impl From<ChatPosition> for i8 {
    fn from(position: ChatPosition) -> Self {
        match position {
            ChatPosition::Chat => 0,
            ChatPosition::System => 1,
            ChatPosition::Hotbar => 2,
            ChatPosition::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerChat {
    /// JSON chat component
    pub json: String,
    pub position: ChatPosition,
}

impl ServerChat {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            json: buf.read_string()?,
            position: buf.read_sbyte()?.into(),
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.json);
        buf.put_i8(self.position.into());
    }
}

/// World clock, both values in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeUpdate {
    pub world_age: i64,
    /// Negative when the daylight cycle is frozen
    pub time_of_day: i64,
}

impl TimeUpdate {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            world_age: buf.read_long()?,
            time_of_day: buf.read_long()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64(self.world_age);
        buf.put_i64(self.time_of_day);
    }

    /// Position within the current day in `[0, 1)`.
    pub fn day_fraction(&self) -> f64 {
        self.time_of_day.rem_euclid(TICKS_PER_DAY) as f64 / TICKS_PER_DAY as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnPosition {
    pub location: BlockPos,
}

impl SpawnPosition {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            location: buf.read_position()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_position(self.location);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateHealth {
    pub health: f32,
    pub food: i32,
    pub saturation: f32,
}

impl UpdateHealth {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            health: buf.read_float()?,
            food: buf.read_varint()?,
            saturation: buf.read_float()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.put_f32(self.health);
        buf.write_varint(self.food);
        buf.put_f32(self.saturation);
    }
}

/// Server moved the player to a (possibly new) world.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Respawn {
    pub dimension: i32,
    pub difficulty: u8,
    pub game_mode: u8,
    pub level_type: String,
}

impl Respawn {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            dimension: buf.read_int()?,
            difficulty: buf.read_ubyte()?,
            game_mode: buf.read_ubyte()?,
            level_type: buf.read_string()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.dimension);
        buf.put_u8(self.difficulty);
        buf.put_u8(self.game_mode);
        buf.write_string(&self.level_type);
    }
}

/// Authoritative position and look from the server.
///
/// Each bit of `flags` marks the matching component as relative to the current value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionAndLook {
    pub position: Vec3d,
    pub look: Look,
    pub flags: u8,
}

impl PositionAndLook {
    pub const RELATIVE_X: u8 = 0x01;
    pub const RELATIVE_Y: u8 = 0x02;
    pub const RELATIVE_Z: u8 = 0x04;
    pub const RELATIVE_PITCH: u8 = 0x08;
    pub const RELATIVE_YAW: u8 = 0x10;

    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            position: buf.read_vec3d()?,
            look: buf.read_look()?,
            flags: buf.read_ubyte()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_vec3d(self.position);
        buf.write_look(self.look);
        buf.put_u8(self.flags);
    }

    /// Applies the packet to a current position and look, honoring relative flags.
    pub fn apply(&self, position: Vec3d, look: Look) -> (Vec3d, Look) {
        let pick = |flag: u8, current: f64, value: f64| {
            if self.flags & flag != 0 {
                current + value
            } else {
                value
            }
        };
        let next_position = Vec3d::new(
            pick(Self::RELATIVE_X, position.x, self.position.x),
            pick(Self::RELATIVE_Y, position.y, self.position.y),
            pick(Self::RELATIVE_Z, position.z, self.position.z),
        );
        let next_look = Look::new(
            pick(Self::RELATIVE_YAW, f64::from(look.yaw), f64::from(self.look.yaw)) as f32,
            pick(Self::RELATIVE_PITCH, f64::from(look.pitch), f64::from(self.look.pitch)) as f32,
        );
        (next_position, next_look)
    }
}

/// Entity velocity in 1/8000 block per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityVelocity {
    pub entity_id: i32,
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl EntityVelocity {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            entity_id: buf.read_varint()?,
            x: buf.read_short()?,
            y: buf.read_short()?,
            z: buf.read_short()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_varint(self.entity_id);
        buf.put_i16(self.x);
        buf.put_i16(self.y);
        buf.put_i16(self.z);
    }

    /// Velocity in blocks per tick.
    pub fn velocity(&self) -> Vec3d {
        Vec3d::new(
            f64::from(self.x) / VELOCITY_SCALE,
            f64::from(self.y) / VELOCITY_SCALE,
            f64::from(self.z) / VELOCITY_SCALE,
        )
    }
}

/// Bare entity announcement, sent when an entity is (re)initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityInit {
    pub entity_id: i32,
}

impl EntityInit {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            entity_id: buf.read_varint()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_varint(self.entity_id);
    }
}

/// Entity status codes the client reacts to. Everything else is kept raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatusCode {
    Hurt,
    Dead,
    Other(i8),
}

impl Default for EntityStatusCode {
    fn default() -> Self {
        EntityStatusCode::Other(0)
    }
}

impl From<i8> for EntityStatusCode {
    fn from(raw: i8) -> Self {
        match raw {
            2 => EntityStatusCode::Hurt,
            3 => EntityStatusCode::Dead,
            other => EntityStatusCode::Other(other),
        }
    }
}

impl From<EntityStatusCode> for i8 {
    fn from(code: EntityStatusCode) -> Self {
        match code {
            EntityStatusCode::Hurt => 2,
            EntityStatusCode::Dead => 3,
            EntityStatusCode::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityStatus {
    pub entity_id: i32,
    pub status: EntityStatusCode,
}

impl EntityStatus {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            entity_id: buf.read_int()?,
            status: buf.read_sbyte()?.into(),
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.entity_id);
        buf.put_i8(self.status.into());
    }

    pub fn is_death(&self) -> bool {
        self.status == EntityStatusCode::Dead
    }
}

/// Server-initiated disconnect during play.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disconnect {
    pub reason: String,
}

impl Disconnect {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            reason: buf.read_string()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.reason);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientChat {
    pub message: String,
}

impl ClientChat {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            message: buf.read_string()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAction {
    #[default]
    Respawn,
    RequestStats,
    OpenInventory,
}

impl ClientAction {
    fn wire_value(self) -> i32 {
        match self {
            ClientAction::Respawn => 0,
            ClientAction::RequestStats => 1,
            ClientAction::OpenInventory => 2,
        }
    }

    fn from_wire(value: i32) -> Self {
        match value {
            1 => ClientAction::RequestStats,
            2 => ClientAction::OpenInventory,
            _ => ClientAction::Respawn,
        }
    }
}

/// "Perform action" request, used for respawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientStatus {
    pub action: ClientAction,
}

impl ClientStatus {
    pub fn respawn() -> Self {
        Self {
            action: ClientAction::Respawn,
        }
    }

    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            action: ClientAction::from_wire(buf.read_varint()?),
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_varint(self.action.wire_value());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerGrounded {
    pub on_ground: bool,
}

impl PlayerGrounded {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            on_ground: buf.read_bool()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_bool(self.on_ground);
    }
}

/// Client movement. Its id depends on which optional parts are present:
///
/// | position | look | id     |
/// |----------|------|--------|
/// | no       | no   | `0x03` |
/// | yes      | no   | `0x04` |
/// | no       | yes  | `0x05` |
/// | yes      | yes  | `0x06` |
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerMovement {
    pub position: Option<Vec3d>,
    pub look: Option<Look>,
    pub on_ground: bool,
}

impl PlayerMovement {
    pub fn packet_id(&self) -> i32 {
        match (self.position.is_some(), self.look.is_some()) {
            (true, true) => 0x06,
            (false, true) => 0x05,
            (true, false) => 0x04,
            (false, false) => 0x03,
        }
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        if let Some(position) = self.position {
            buf.write_vec3d(position);
        }
        if let Some(look) = self.look {
            buf.write_look(look);
        }
        buf.write_bool(self.on_ground);
    }

    /// Decodes a movement body whose shape is fixed by `id`.
    pub fn read_with_id<B: Buf>(id: i32, buf: &mut B) -> Result<Self> {
        let position = if matches!(id, 0x04 | 0x06) {
            Some(buf.read_vec3d()?)
        } else {
            None
        };
        let look = if matches!(id, 0x05 | 0x06) {
            Some(buf.read_look()?)
        } else {
            None
        };
        Ok(Self {
            position,
            look,
            on_ground: buf.read_bool()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn movement_id_follows_populated_fields() {
        let pos = Some(Vec3d::new(1.0, 64.0, -1.0));
        let look = Some(Look::new(90.0, 0.0));
        let id = |position, look| {
            PlayerMovement {
                position,
                look,
                on_ground: true,
            }
            .packet_id()
        };
        assert_eq!(id(pos, None), 0x04);
        assert_eq!(id(None, look), 0x05);
        assert_eq!(id(pos, look), 0x06);
        assert_eq!(id(None, None), 0x03);
    }

    #[test]
    fn movement_body_shape() {
        let full = PlayerMovement {
            position: Some(Vec3d::new(0.5, 70.0, 0.5)),
            look: Some(Look::new(10.0, 20.0)),
            on_ground: false,
        };
        let mut buf = BytesMut::new();
        full.write_fields(&mut buf);
        assert_eq!(buf.len(), 24 + 8 + 1);

        let decoded = PlayerMovement::read_with_id(full.packet_id(), &mut buf.freeze()).unwrap();
        assert_eq!(decoded, full);

        let mut grounded = BytesMut::new();
        PlayerMovement {
            on_ground: true,
            ..Default::default()
        }
        .write_fields(&mut grounded);
        assert_eq!(&grounded[..], &[0x01]);
    }

    #[test]
    fn join_game_splits_hardcore_bit() {
        let mut buf = BytesMut::new();
        buf.put_i32(42);
        buf.put_u8(0x08 | 0x01);
        buf.put_i8(-1);
        buf.put_u8(2);
        buf.put_u8(20);
        buf.write_string("default");
        buf.write_bool(false);

        let join = JoinGame::read_fields(&mut buf.freeze()).unwrap();
        assert_eq!(join.entity_id, 42);
        assert_eq!(join.game_mode, 1);
        assert!(join.hardcore);
        assert_eq!(join.dimension, -1);
        assert_eq!(join.level_type, "default");
    }

    #[test]
    fn velocity_is_scaled() {
        let vel = EntityVelocity {
            entity_id: 1,
            x: 8000,
            y: -4000,
            z: 0,
        };
        assert_eq!(vel.velocity(), Vec3d::new(1.0, -0.5, 0.0));
    }

    #[test]
    fn entity_status_death_code() {
        let mut buf = BytesMut::new();
        buf.put_i32(7);
        buf.put_i8(3);
        let status = EntityStatus::read_fields(&mut buf.freeze()).unwrap();
        assert!(status.is_death());

        assert_eq!(EntityStatusCode::from(9), EntityStatusCode::Other(9));
    }

    #[test]
    fn relative_flags_apply_per_component() {
        let packet = PositionAndLook {
            position: Vec3d::new(1.0, 5.0, 1.0),
            look: Look::new(45.0, 10.0),
            flags: PositionAndLook::RELATIVE_Y | PositionAndLook::RELATIVE_YAW,
        };
        let (pos, look) = packet.apply(Vec3d::new(10.0, 60.0, 10.0), Look::new(90.0, -5.0));
        assert_eq!(pos, Vec3d::new(1.0, 65.0, 1.0));
        assert_eq!(look, Look::new(135.0, 10.0));
    }

    #[test]
    fn day_fraction_wraps() {
        let t = TimeUpdate {
            world_age: 0,
            time_of_day: 30_000,
        };
        assert!((t.day_fraction() - 0.25).abs() < f64::EPSILON);
    }
}
