//! # Frame Layer
//!
//! One frame is one complete protocol message:
//!
//! ```text
//! [declared_length: VarInt] [packet_id: VarInt] [body: declared_length - size(packet_id)]
//! ```
//!
//! `declared_length` always includes the encoded size of the packet id. Two readers
//! are provided:
//! - [`FrameCodec`], a tokio-util codec for buffered reading once the stream mode is
//!   fixed (play state);
//! - [`read_frame`], which pulls exactly one frame off an `AsyncRead` without reading
//!   ahead, so the stream can be re-wrapped (e.g. by the cipher) between frames.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::config::MAX_FRAME_SIZE;
use crate::core::codec::{varint_size, ProtocolRead, ProtocolWrite, MAX_VARINT_LEN};
use crate::error::{FrameError, ProtocolError, Result};

/// Frame compression settings of a connection.
///
/// Compression is never negotiated by this client, so `enabled` stays false and
/// every frame uses the uncompressed layout above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionInfo {
    pub enabled: bool,
    /// Threshold announced by the server; `-1` while disabled.
    pub max_uncompressed_size: i32,
}

impl Default for CompressionInfo {
    fn default() -> Self {
        Self {
            enabled: false,
            max_uncompressed_size: -1,
        }
    }
}

/// A raw frame: resolved packet id plus the still-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: i32,
    pub body: Bytes,
}

impl Frame {
    pub fn new(id: i32, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }

    /// Value of the length prefix: id size plus body size.
    #[inline]
    pub fn declared_length(&self) -> usize {
        varint_size(self.id) + self.body.len()
    }

    /// Appends the full framed encoding of `id` + `body` to `dst`.
    pub fn encode_parts(id: i32, body: &[u8], dst: &mut BytesMut) {
        let declared = varint_size(id) + body.len();
        dst.reserve(varint_size(declared as i32) + declared);
        dst.write_varint(declared as i32);
        dst.write_varint(id);
        dst.extend_from_slice(body);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        Self::encode_parts(self.id, &self.body, &mut dst);
        dst.freeze()
    }

    /// Splits a complete declared-length payload (id + body) into a frame.
    fn from_payload(mut payload: Bytes) -> std::result::Result<Self, FrameError> {
        let id = payload.read_varint()?;
        Ok(Self { id, body: payload })
    }
}

/// Parses a VarInt at the head of `buf` without consuming it.
///
/// Returns `Ok(None)` when more bytes are needed.
fn peek_varint(buf: &[u8]) -> std::result::Result<Option<(i32, usize)>, FrameError> {
    let mut value: u32 = 0;
    for (index, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        value |= u32::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some((value as i32, index + 1)));
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        return Err(FrameError::VarIntTooLarge);
    }
    Ok(None)
}

fn check_declared(declared: i32, max: usize) -> std::result::Result<usize, FrameError> {
    if declared < 0 {
        return Err(FrameError::NegativeLength(declared));
    }
    // A frame must at least hold its packet id.
    if declared == 0 {
        return Err(FrameError::Truncated {
            needed: 1,
            remaining: 0,
        });
    }
    let declared = declared as usize;
    if declared > max {
        return Err(FrameError::Oversized { declared, max });
    }
    Ok(declared)
}

/// Length-delimited frame codec for the wire protocol.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let Some((declared, prefix_len)) = peek_varint(src)? else {
            return Ok(None);
        };
        let declared = check_declared(declared, self.max_frame_size)?;

        let total = prefix_len + declared;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(prefix_len);
        let payload = src.split_to(declared).freeze();
        let frame = Frame::from_payload(payload)?;
        trace!(id = frame.id, len = declared, "decoded frame");
        Ok(Some(frame))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                needed: src.len() + 1,
                remaining: src.len(),
            }
            .into()),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let declared = frame.declared_length();
        if declared > self.max_frame_size {
            return Err(FrameError::Oversized {
                declared,
                max: self.max_frame_size,
            }
            .into());
        }
        Frame::encode_parts(frame.id, &frame.body, dst);
        Ok(())
    }
}

/// Reads one VarInt straight off the stream, one byte at a time.
async fn read_stream_varint<R>(reader: &mut R, at_boundary: bool) -> Result<(i32, usize)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut value: u32 = 0;
    let mut position: u32 = 0;
    let mut consumed = 0usize;
    loop {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if at_boundary && consumed == 0 {
                    return Err(ProtocolError::ConnectionClosed);
                }
                return Err(FrameError::Truncated {
                    needed: 1,
                    remaining: 0,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        consumed += 1;
        value |= u32::from(byte & 0x7F) << position;
        if byte & 0x80 == 0 {
            return Ok((value as i32, consumed));
        }
        position += 7;
        if position >= 32 {
            return Err(FrameError::VarIntTooLarge.into());
        }
    }
}

/// Reads exactly one frame from `reader`, consuming nothing past its end.
///
/// A clean end-of-stream before the first byte is [`ProtocolError::ConnectionClosed`];
/// anywhere else it is a truncated frame.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let (declared, _) = read_stream_varint(reader, true).await?;
    let declared = check_declared(declared, max_frame_size)?;

    let (id, id_len) = read_stream_varint(reader, false).await?;
    if id_len > declared {
        return Err(FrameError::Truncated {
            needed: id_len,
            remaining: declared,
        }
        .into());
    }

    let mut body = vec![0u8; declared - id_len];
    if let Err(e) = reader.read_exact(&mut body).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(FrameError::Truncated {
                needed: declared - id_len,
                remaining: 0,
            }
            .into());
        }
        return Err(e.into());
    }

    trace!(id, len = declared, "read frame");
    Ok(Frame::new(id, body))
}
