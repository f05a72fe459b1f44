//! # Protocol Layer
//!
//! Connection states, the packet set and its id registry, login encryption, and
//! the dispatch of play packets to a session handler.
//!
//! ## Components
//! - **State**: `Handshake -> Login -> Play -> Disconnect`
//! - **Packets**: typed packet bodies and the [`Packet`](packets::Packet) enum
//! - **Registry**: (id, direction, state) to packet kind, and back
//! - **Handshake**: shared secret generation and RSA encryption of the login reply
//! - **Dispatcher**: keep-alive echo, deferred respawn, server disconnects
//! - **Session**: the [`SessionHandler`](session::SessionHandler) seam and the default player session

pub mod dispatcher;
pub mod handshake;
pub mod packets;
pub mod registry;
pub mod session;
pub mod state;
