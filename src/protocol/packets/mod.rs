//! # Packets
//!
//! The closed set of packets this client speaks, as one tagged union.
//!
//! Every packet struct knows how to write and read its own body. Which way a packet
//! may travel, in which state, and under which id is *not* a property of the struct:
//! that metadata lives in the [`PacketRegistry`](crate::protocol::registry::PacketRegistry).
//!
//! ## Body-only encoding
//! Bodies never include the frame length or the packet id. Extra bytes left after a
//! body has been decoded are ignored; the frame length decides where the next frame
//! starts.

pub mod handshake;
pub mod login;
pub mod play;

pub use handshake::{Handshake, NextState};
pub use login::{EncryptionRequest, EncryptionResponse, LoginDisconnect, LoginStart, LoginSuccess};
pub use play::{
    ChatPosition, ClientAction, ClientChat, ClientStatus, Disconnect, EntityInit, EntityStatus,
    EntityStatusCode, EntityVelocity, JoinGame, KeepAlive, PlayerGrounded, PlayerMovement,
    PositionAndLook, Respawn, ServerChat, SpawnPosition, TimeUpdate, UpdateHealth,
};

use bytes::{Buf, BytesMut};

use crate::error::Result;

macro_rules! packet_set {
    ($( $variant:ident ),* $(,)?) => {
        /// A decoded packet of any kind.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $( $variant($variant), )*
        }

        /// Field-less tag naming a packet kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketKind {
            $( $variant, )*
        }

        impl PacketKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [PacketKind] = &[ $( PacketKind::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( PacketKind::$variant => stringify!($variant), )*
                }
            }

            /// Default-constructs a packet of this kind.
            pub fn instantiate(self) -> Packet {
                match self {
                    $( PacketKind::$variant => Packet::$variant($variant::default()), )*
                }
            }
        }

        impl Packet {
            pub fn kind(&self) -> PacketKind {
                match self {
                    $( Packet::$variant(_) => PacketKind::$variant, )*
                }
            }

            /// Appends the packet body (no length, no id) to `dst`.
            pub fn encode_body(&self, dst: &mut BytesMut) {
                match self {
                    $( Packet::$variant(packet) => packet.write_fields(dst), )*
                }
            }
        }

        $(
            impl From<$variant> for Packet {
                fn from(packet: $variant) -> Self {
                    Packet::$variant(packet)
                }
            }
        )*
    };
}

packet_set! {
    // handshake
    Handshake,
    // login
    LoginStart,
    EncryptionResponse,
    LoginDisconnect,
    EncryptionRequest,
    LoginSuccess,
    // play
    KeepAlive,
    JoinGame,
    ServerChat,
    TimeUpdate,
    SpawnPosition,
    UpdateHealth,
    Respawn,
    PositionAndLook,
    EntityVelocity,
    EntityInit,
    EntityStatus,
    Disconnect,
    ClientChat,
    ClientStatus,
    PlayerGrounded,
    PlayerMovement,
}

impl Packet {
    /// Decodes a body of the given kind. `id` is only consulted by kinds whose
    /// layout depends on it.
    pub fn decode<B: Buf>(kind: PacketKind, id: i32, body: &mut B) -> Result<Packet> {
        let packet = match kind {
            PacketKind::Handshake => Handshake::read_fields(body)?.into(),
            PacketKind::LoginStart => LoginStart::read_fields(body)?.into(),
            PacketKind::EncryptionResponse => EncryptionResponse::read_fields(body)?.into(),
            PacketKind::LoginDisconnect => LoginDisconnect::read_fields(body)?.into(),
            PacketKind::EncryptionRequest => EncryptionRequest::read_fields(body)?.into(),
            PacketKind::LoginSuccess => LoginSuccess::read_fields(body)?.into(),
            PacketKind::KeepAlive => KeepAlive::read_fields(body)?.into(),
            PacketKind::JoinGame => JoinGame::read_fields(body)?.into(),
            PacketKind::ServerChat => ServerChat::read_fields(body)?.into(),
            PacketKind::TimeUpdate => TimeUpdate::read_fields(body)?.into(),
            PacketKind::SpawnPosition => SpawnPosition::read_fields(body)?.into(),
            PacketKind::UpdateHealth => UpdateHealth::read_fields(body)?.into(),
            PacketKind::Respawn => Respawn::read_fields(body)?.into(),
            PacketKind::PositionAndLook => PositionAndLook::read_fields(body)?.into(),
            PacketKind::EntityVelocity => EntityVelocity::read_fields(body)?.into(),
            PacketKind::EntityInit => EntityInit::read_fields(body)?.into(),
            PacketKind::EntityStatus => EntityStatus::read_fields(body)?.into(),
            PacketKind::Disconnect => Disconnect::read_fields(body)?.into(),
            PacketKind::ClientChat => ClientChat::read_fields(body)?.into(),
            PacketKind::ClientStatus => ClientStatus::read_fields(body)?.into(),
            PacketKind::PlayerGrounded => PlayerGrounded::read_fields(body)?.into(),
            PacketKind::PlayerMovement => PlayerMovement::read_with_id(id, body)?.into(),
        };
        Ok(packet)
    }

    /// Id computed from field values, for kinds registered as dynamic.
    pub fn dynamic_id(&self) -> Option<i32> {
        match self {
            Packet::PlayerMovement(movement) => Some(movement.packet_id()),
            _ => None,
        }
    }
}
