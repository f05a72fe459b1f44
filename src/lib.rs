//! # blockwire
//!
//! Async client engine for the protocol-47 block game wire protocol.
//!
//! A [`Client`] opens a TCP connection, performs the handshake and login
//! (including the optional RSA/AES-CFB8 encryption negotiation), and then runs
//! three tasks for the play state:
//!
//! - a receive loop that decodes frames, echoes keep-alives, schedules respawns
//!   and hands every packet to a [`SessionHandler`]
//! - a sync loop that reports the player's movement every 16ms
//! - a writer that drains the send queue onto the socket, one frame at a time
//!
//! ## Example
//! ```rust,no_run
//! use blockwire::{Client, ClientConfig};
//!
//! # async fn run() -> blockwire::Result<()> {
//! let config = ClientConfig {
//!     host: "localhost".into(),
//!     username: "Steve".into(),
//!     ..Default::default()
//! };
//! let (client, session) = Client::connect_player(config).await?;
//! session.nudge(1, 0, 0);
//! let reason = client.closed().await;
//! println!("disconnected: {reason:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::{ClientConfig, LoggingConfig, NetworkConfig};
pub use core::frame::{CompressionInfo, Frame, FrameCodec};
pub use error::{CryptoError, FrameError, ProtocolError, Result};
pub use protocol::packets::{Packet, PacketKind};
pub use protocol::registry::PacketRegistry;
pub use protocol::session::{MovementUpdate, PlayerSession, SessionHandler, SessionSnapshot};
pub use protocol::state::{ConnectionState, Direction};
pub use service::{Client, DisconnectReason};
pub use transport::writer::{PacketSender, SendHandle};
