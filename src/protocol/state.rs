//! Connection state and packet direction.

use std::io;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::ProtocolError;

/// Protocol phase of a connection.
///
/// Moves forward `Handshake -> Login -> Play`; `Disconnect` is terminal and can be
/// entered from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Handshake = 0,
    Login = 1,
    Play = 2,
    Disconnect = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Handshake,
            1 => ConnectionState::Login,
            2 => ConnectionState::Play,
            _ => ConnectionState::Disconnect,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Disconnect
    }
}

/// Which way a packet travels, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to client
    In,
    /// Client to server
    Out,
    Both,
}

impl Direction {
    /// True when `self` covers `other`. `Both` covers everything.
    #[inline]
    pub fn contains(self, other: Direction) -> bool {
        match (self, other) {
            (Direction::Both, _) => true,
            (a, b) => a == b,
        }
    }
}

/// Lock-free "latest value wins" cell for the connection state.
///
/// Written only by the connection's own state machine; anyone may read it.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the cell is already terminal.
    ///
    /// Returns the previous state.
    pub fn advance(&self, next: ConnectionState) -> ConnectionState {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if ConnectionState::from_u8(current).is_terminal() {
                return ConnectionState::Disconnect;
            }
            match self
                .0
                .compare_exchange(current, next as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(prev) => return ConnectionState::from_u8(prev),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client closed the connection or was dropped.
    Local,
    /// The server ended the session with this reason.
    Remote(String),
    /// A read, write, decode or login failure.
    Error(String),
}

impl DisconnectReason {
    /// Classifies the error that ended a connection.
    pub fn from_error(error: &ProtocolError) -> Self {
        match error {
            ProtocolError::LoginRejected(reason) | ProtocolError::Disconnected(reason) => {
                DisconnectReason::Remote(reason.clone())
            }
            other => DisconnectReason::Error(other.to_string()),
        }
    }

    /// The error handed to operations that were still pending when the connection
    /// ended for this reason.
    pub fn to_error(&self) -> ProtocolError {
        match self {
            DisconnectReason::Local => ProtocolError::ConnectionClosed,
            DisconnectReason::Remote(reason) => ProtocolError::Disconnected(reason.clone()),
            DisconnectReason::Error(message) => ProtocolError::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                message.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_remote_closes() {
        let rejected = ProtocolError::LoginRejected("banned".into());
        assert_eq!(
            DisconnectReason::from_error(&rejected),
            DisconnectReason::Remote("banned".into())
        );
        assert!(matches!(
            DisconnectReason::from_error(&ProtocolError::Timeout),
            DisconnectReason::Error(_)
        ));
    }

    #[test]
    fn pending_operations_see_the_cause() {
        assert!(matches!(
            DisconnectReason::Local.to_error(),
            ProtocolError::ConnectionClosed
        ));
        assert!(matches!(
            DisconnectReason::Remote("restart".into()).to_error(),
            ProtocolError::Disconnected(reason) if reason == "restart"
        ));
        match DisconnectReason::Error("broken pipe".into()).to_error() {
            ProtocolError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::ConnectionAborted);
                assert_eq!(e.to_string(), "broken pipe");
            }
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn both_contains_each_direction() {
        assert!(Direction::Both.contains(Direction::In));
        assert!(Direction::Both.contains(Direction::Out));
        assert!(Direction::In.contains(Direction::In));
        assert!(!Direction::In.contains(Direction::Out));
        assert!(!Direction::Out.contains(Direction::Both));
    }

    #[test]
    fn disconnect_is_absorbing() {
        let cell = StateCell::new(ConnectionState::Handshake);
        assert_eq!(cell.advance(ConnectionState::Login), ConnectionState::Handshake);
        assert_eq!(cell.advance(ConnectionState::Disconnect), ConnectionState::Login);
        assert_eq!(cell.advance(ConnectionState::Play), ConnectionState::Disconnect);
        assert_eq!(cell.get(), ConnectionState::Disconnect);
    }
}
