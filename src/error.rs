//! # Error Types
//!
//! Error handling for the client protocol engine.
//!
//! Errors are split by the layer that produced them. Every one of them is fatal to
//! the connection it occurred on; the only condition that is *not* an error is an
//! unknown packet id during play, which is skipped by the receive loop.
//!
//! ## Error Categories
//! - **Frame errors** ([`FrameError`]): truncated input, oversized varints, invalid UTF-8.
//!   A partially consumed frame desynchronizes everything after it, so these are never
//!   recovered mid-frame.
//! - **Crypto errors** ([`CryptoError`]): public key import or RSA encryption failures
//!   during login.
//! - **Protocol errors**: unexpected packets during handshake/login, server-initiated
//!   disconnects, packets used in the wrong direction.
//! - **I/O errors**: socket failures on either loop.
//!
//! ## Example Usage
//! ```rust
//! use blockwire::error::{FrameError, ProtocolError, Result};
//!
//! fn first_byte(data: &[u8]) -> Result<u8> {
//!     data.first().copied().ok_or_else(|| {
//!         ProtocolError::Frame(FrameError::Truncated { needed: 1, remaining: 0 })
//!     })
//! }
//!
//! assert!(first_byte(&[]).is_err());
//! ```

use std::io;
use thiserror::Error;

use crate::protocol::packets::PacketKind;
use crate::protocol::state::{ConnectionState, Direction};

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_WRITER_GONE: &str = "Writer task stopped before the frame was written";

    /// Login errors
    pub const ERR_NO_LOGIN_REPLY: &str = "Server closed the stream before answering login";
    pub const ERR_EMPTY_USERNAME: &str = "Username must not be empty";

    /// Cryptographic errors
    pub const ERR_PUBLIC_KEY_FORMAT: &str =
        "Server public key is neither SubjectPublicKeyInfo nor PKCS#1 DER";
    pub const ERR_SHARED_SECRET_LENGTH: &str = "Shared secret must be exactly 16 bytes";
}

/// Low-level decoding failures while reading a frame or a packet body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Stream truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("VarInt is too big")]
    VarIntTooLarge,

    #[error("Invalid UTF-8 in string field")]
    Utf8Invalid,

    #[error("Negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("Frame too large: {declared} bytes (max {max})")]
    Oversized { declared: usize, max: usize },
}

/// Failures in the login encryption negotiation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid server public key: {0}")]
    InvalidPublicKey(String),

    #[error("RSA encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid cipher key length: {0} bytes")]
    InvalidKeyLength(usize),
}

/// ProtocolError is the primary error type for all client operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Unexpected packet {kind:?} in state {state:?}")]
    UnexpectedPacket {
        state: ConnectionState,
        kind: PacketKind,
    },

    #[error("Unknown packet id 0x{id:02X} in state {state:?}")]
    UnknownPacket { id: i32, state: ConnectionState },

    #[error("Login rejected by server: {0}")]
    LoginRejected(String),

    #[error("Disconnected by server: {0}")]
    Disconnected(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Packet {0:?} has no registered id")]
    UnregisteredPacket(PacketKind),

    #[error("Packet {kind:?} cannot travel {direction:?}")]
    UnsupportedDirection {
        kind: PacketKind,
        direction: Direction,
    },

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_convert_into_protocol_errors() {
        let err: ProtocolError = FrameError::VarIntTooLarge.into();
        assert!(matches!(err, ProtocolError::Frame(FrameError::VarIntTooLarge)));
        assert_eq!(err.to_string(), "Frame error: VarInt is too big");
    }

    #[test]
    fn unknown_packet_message_is_hex() {
        let err = ProtocolError::UnknownPacket {
            id: 0x1a,
            state: ConnectionState::Login,
        };
        assert_eq!(err.to_string(), "Unknown packet id 0x1A in state Login");
    }
}
