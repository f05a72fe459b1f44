//! Geometry and identity value types carried by packets.

use std::fmt;

use uuid::Uuid;

use crate::error::{ProtocolError, Result};

/// Integer block coordinate, carried on the wire as a packed 64-bit word.
///
/// Valid ranges: `x, z` in `[-2^25, 2^25 - 1]`, `y` in `[-2^11, 2^11 - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Double-precision position, carried on the wire as three consecutive `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl From<BlockPos> for Vec3d {
    fn from(pos: BlockPos) -> Self {
        Self::new(f64::from(pos.x), f64::from(pos.y), f64::from(pos.z))
    }
}

impl fmt::Display for Vec3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Look {
    pub yaw: f32,
    pub pitch: f32,
}

impl Look {
    pub const fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}

/// Parses a player UUID from either the hyphenated or the bare-hex form.
pub fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::try_parse(text.trim()).map_err(|e| ProtocolError::InvalidUuid(format!("{text}: {e}")))
}

/// Wire form of a UUID in login strings: 32 lowercase hex digits, no hyphens.
pub fn uuid_wire_string(uuid: &Uuid) -> String {
    uuid.simple().to_string()
}
