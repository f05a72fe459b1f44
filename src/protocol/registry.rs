//! # Packet Registry
//!
//! Declarative table mapping `(id, direction, state)` to packet kinds and back.
//!
//! The standard table for protocol 47 is built once on first use and never changes
//! afterwards. Lookups are linear over a few dozen descriptors and return the
//! *first* match, so registration order is resolution order.
//!
//! ## Dynamic packets
//! A kind registered with [`PacketId::Dynamic`] has no fixed id; its outbound id is
//! computed from the packet's field values at send time (see
//! [`Packet::dynamic_id`]).

use std::sync::OnceLock;

use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::protocol::packets::{Packet, PacketKind};
use crate::protocol::state::{ConnectionState, Direction};

/// Numeric id of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketId {
    Static(i32),
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub id: PacketId,
    pub direction: Direction,
    pub state: ConnectionState,
    pub kind: PacketKind,
}

impl PacketDescriptor {
    pub fn is_dynamic(&self) -> bool {
        self.id == PacketId::Dynamic
    }
}

/// Lookup table of packet descriptors.
#[derive(Debug, Clone, Default)]
pub struct PacketRegistry {
    descriptors: Vec<PacketDescriptor>,
}

impl PacketRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared table for protocol 47. Built on first call.
    pub fn standard() -> &'static PacketRegistry {
        static STANDARD: OnceLock<PacketRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let registry = Self::build_standard();
            debug!(descriptors = registry.len(), "packet registry built");
            registry
        })
    }

    fn build_standard() -> Self {
        use ConnectionState::{Handshake, Login, Play};
        use Direction::{Both, In, Out};

        let mut r = Self::new();

        r.register(PacketKind::Handshake, 0x00, Out, Handshake);

        r.register(PacketKind::LoginStart, 0x00, Out, Login);
        r.register(PacketKind::EncryptionResponse, 0x01, Out, Login);
        r.register(PacketKind::LoginDisconnect, 0x00, In, Login);
        r.register(PacketKind::EncryptionRequest, 0x01, In, Login);
        r.register(PacketKind::LoginSuccess, 0x02, In, Login);

        r.register(PacketKind::KeepAlive, 0x00, Both, Play);
        r.register(PacketKind::JoinGame, 0x01, In, Play);
        r.register(PacketKind::ServerChat, 0x02, In, Play);
        r.register(PacketKind::TimeUpdate, 0x03, In, Play);
        r.register(PacketKind::SpawnPosition, 0x05, In, Play);
        r.register(PacketKind::UpdateHealth, 0x06, In, Play);
        r.register(PacketKind::Respawn, 0x07, In, Play);
        r.register(PacketKind::PositionAndLook, 0x08, In, Play);
        r.register(PacketKind::EntityVelocity, 0x12, In, Play);
        r.register(PacketKind::EntityInit, 0x14, In, Play);
        r.register(PacketKind::EntityStatus, 0x1A, In, Play);
        r.register(PacketKind::Disconnect, 0x40, In, Play);

        r.register(PacketKind::ClientChat, 0x01, Out, Play);
        r.register(PacketKind::PlayerGrounded, 0x03, Out, Play);
        r.register(PacketKind::ClientStatus, 0x16, Out, Play);
        r.register_dynamic(PacketKind::PlayerMovement, Out, Play);

        r
    }

    /// Adds a fixed-id descriptor. Duplicates are kept; the earlier one wins lookups.
    pub fn register(
        &mut self,
        kind: PacketKind,
        id: i32,
        direction: Direction,
        state: ConnectionState,
    ) -> &mut Self {
        self.descriptors.push(PacketDescriptor {
            id: PacketId::Static(id),
            direction,
            state,
            kind,
        });
        self
    }

    /// Adds a descriptor whose id is computed per packet instance.
    pub fn register_dynamic(
        &mut self,
        kind: PacketKind,
        direction: Direction,
        state: ConnectionState,
    ) -> &mut Self {
        self.descriptors.push(PacketDescriptor {
            id: PacketId::Dynamic,
            direction,
            state,
            kind,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[PacketDescriptor] {
        &self.descriptors
    }

    /// Kind of an incoming id, or `None` for an unknown packet.
    pub fn resolve_inbound(
        &self,
        id: i32,
        direction: Direction,
        state: ConnectionState,
    ) -> Option<PacketKind> {
        self.descriptors
            .iter()
            .find(|d| {
                d.id == PacketId::Static(id) && d.state == state && d.direction.contains(direction)
            })
            .map(|d| d.kind)
    }

    /// Outbound id of `packet`.
    ///
    /// Fails when the kind has no descriptor at all, or only inbound ones.
    pub fn id_for(&self, packet: &Packet) -> Result<i32> {
        let kind = packet.kind();
        let mut registered = false;
        for descriptor in self.descriptors.iter().filter(|d| d.kind == kind) {
            registered = true;
            if !descriptor.direction.contains(Direction::Out) {
                continue;
            }
            return match descriptor.id {
                PacketId::Static(id) => Ok(id),
                PacketId::Dynamic => packet
                    .dynamic_id()
                    .ok_or(ProtocolError::UnregisteredPacket(kind)),
            };
        }

        if registered {
            Err(ProtocolError::UnsupportedDirection {
                kind,
                direction: Direction::Out,
            })
        } else {
            Err(ProtocolError::UnregisteredPacket(kind))
        }
    }

    /// Default-constructs a packet of `kind`.
    pub fn instantiate(&self, kind: PacketKind) -> Packet {
        kind.instantiate()
    }

    /// Static descriptors shadowed by an earlier one with the same id, state and an
    /// overlapping direction. These are configuration mistakes.
    pub fn duplicates(&self) -> Vec<(PacketDescriptor, PacketDescriptor)> {
        let mut found = Vec::new();
        for (index, later) in self.descriptors.iter().enumerate() {
            if later.is_dynamic() {
                continue;
            }
            let shadowing = self.descriptors[..index].iter().find(|earlier| {
                earlier.id == later.id
                    && earlier.state == later.state
                    && overlaps(earlier.direction, later.direction)
            });
            if let Some(earlier) = shadowing {
                found.push((*earlier, *later));
            }
        }
        found
    }
}

fn overlaps(a: Direction, b: Direction) -> bool {
    a.contains(b) || b.contains(a)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::types::{Look, Vec3d};
    use crate::protocol::packets::{ClientStatus, KeepAlive, LoginSuccess, PlayerMovement};

    #[test]
    fn standard_table_is_built_once() {
        let a = PacketRegistry::standard() as *const PacketRegistry;
        let b = PacketRegistry::standard() as *const PacketRegistry;
        assert_eq!(a, b);
    }

    #[test]
    fn standard_table_has_no_duplicates() {
        assert!(PacketRegistry::standard().duplicates().is_empty());
    }

    #[test]
    fn inbound_resolution_respects_state_and_direction() {
        let r = PacketRegistry::standard();
        assert_eq!(
            r.resolve_inbound(0x00, Direction::In, ConnectionState::Login),
            Some(PacketKind::LoginDisconnect)
        );
        assert_eq!(
            r.resolve_inbound(0x00, Direction::In, ConnectionState::Play),
            Some(PacketKind::KeepAlive)
        );
        assert_eq!(
            r.resolve_inbound(0x01, Direction::In, ConnectionState::Play),
            Some(PacketKind::JoinGame)
        );
        assert_eq!(
            r.resolve_inbound(0x16, Direction::In, ConnectionState::Play),
            None
        );
        assert_eq!(
            r.resolve_inbound(0x7F, Direction::In, ConnectionState::Play),
            None
        );
    }

    #[test]
    fn outbound_ids() {
        let r = PacketRegistry::standard();
        assert_eq!(r.id_for(&KeepAlive { id: 1 }.into()).unwrap(), 0x00);
        assert_eq!(r.id_for(&ClientStatus::respawn().into()).unwrap(), 0x16);

        let movement = PlayerMovement {
            position: Some(Vec3d::default()),
            look: Some(Look::default()),
            on_ground: true,
        };
        assert_eq!(r.id_for(&movement.into()).unwrap(), 0x06);
    }

    #[test]
    fn inbound_only_kind_cannot_be_sent() {
        let err = PacketRegistry::standard()
            .id_for(&LoginSuccess::default().into())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnsupportedDirection {
                kind: PacketKind::LoginSuccess,
                direction: Direction::Out
            }
        ));
    }

    #[test]
    fn unregistered_kind_is_reported() {
        let empty = PacketRegistry::new();
        assert!(matches!(
            empty.id_for(&KeepAlive::default().into()),
            Err(ProtocolError::UnregisteredPacket(PacketKind::KeepAlive))
        ));
    }

    #[test]
    fn first_registration_wins() {
        let mut r = PacketRegistry::new();
        r.register(PacketKind::JoinGame, 0x01, Direction::In, ConnectionState::Play)
            .register(PacketKind::Respawn, 0x01, Direction::Both, ConnectionState::Play);

        assert_eq!(
            r.resolve_inbound(0x01, Direction::In, ConnectionState::Play),
            Some(PacketKind::JoinGame)
        );
        let dups = r.duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].1.kind, PacketKind::Respawn);
    }
}
