use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::core::codec::{ProtocolRead, ProtocolWrite};
use crate::core::types::{parse_uuid, uuid_wire_string};
use crate::error::Result;

/// Opens the login phase with the requested name.
///
/// When `uuid` is set it follows the name as a bare-hex string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginStart {
    pub username: String,
    pub uuid: Option<Uuid>,
}

impl LoginStart {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            uuid: None,
        }
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.username);
        if let Some(uuid) = &self.uuid {
            buf.write_string(&uuid_wire_string(uuid));
        }
    }

    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        let username = buf.read_string()?;
        let uuid = if buf.has_remaining() {
            Some(parse_uuid(&buf.read_string()?)?)
        } else {
            None
        };
        Ok(Self { username, uuid })
    }
}

/// Reply to [`EncryptionRequest`]: both values RSA-encrypted with the server key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptionResponse {
    pub shared_secret: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl EncryptionResponse {
    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_byte_array(&self.shared_secret);
        buf.write_byte_array(&self.verify_token);
    }

    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            shared_secret: buf.read_byte_array()?.to_vec(),
            verify_token: buf.read_byte_array()?.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginDisconnect {
    /// JSON chat component
    pub reason: String,
}

impl LoginDisconnect {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            reason: buf.read_string()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.reason);
    }
}

/// Server demands encryption.
///
/// `public_key` is DER, `verify_token` is echoed back encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptionRequest {
    pub server_id: String,
    pub public_key: Bytes,
    pub verify_token: Bytes,
}

impl EncryptionRequest {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            server_id: buf.read_string()?,
            public_key: buf.read_byte_array()?,
            verify_token: buf.read_byte_array()?,
        })
    }

    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.server_id);
        buf.write_byte_array(&self.public_key);
        buf.write_byte_array(&self.verify_token);
    }
}

/// Ends login. The server's name and UUID are authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl LoginSuccess {
    pub fn read_fields<B: Buf>(buf: &mut B) -> Result<Self> {
        let uuid = parse_uuid(&buf.read_string()?)?;
        let username = buf.read_string()?;
        Ok(Self { uuid, username })
    }

    /// Servers send the hyphenated form here.
    pub fn write_fields<B: BufMut>(&self, buf: &mut B) {
        buf.write_string(&self.uuid.hyphenated().to_string());
        buf.write_string(&self.username);
    }
}
