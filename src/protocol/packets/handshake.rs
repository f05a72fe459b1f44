use bytes::{Buf, BufMut};

use crate::config::PROTOCOL_VERSION;
use crate::core::codec::{ProtocolRead, ProtocolWrite};
use crate::error::Result;

/// State requested by the handshake's `next_state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NextState {
    Status,
    #[default]
    Login,
}

impl NextState {
    fn wire_value(self) -> i32 {
        match self {
            NextState::Status => 1,
            NextState::Login => 2,
        }
    }
}

/// First packet on every connection. No reply is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub host: String,
    pub port: u16,
    pub next_state: NextState,
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            host: String::new(),
            port: 0,
            next_state: NextState::Login,
        }
    }
}

impl Handshake {
    /// Handshake announcing a login to `host:port`.
    pub fn login(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_varint(self.protocol_version);
        buf.write_string(&self.host);
        buf.put_u16(self.port);
        buf.write_varint(self.next_state.wire_value());
    }

    /// Server-side view, used by test servers.
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        let protocol_version = buf.read_varint()?;
        let host = buf.read_string()?;
        let port = buf.read_ushort()?;
        let next_state = match buf.read_varint()? {
            1 => NextState::Status,
            _ => NextState::Login,
        };
        Ok(Self {
            protocol_version,
            host,
            port,
            next_state,
        })
    }
}
