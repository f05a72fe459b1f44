//! # Binary Codec
//!
//! Cursor-based encoding and decoding of the protocol's primitive and domain types,
//! expressed as extension traits over [`bytes::Buf`] and [`bytes::BufMut`].
//!
//! ## Encodings
//! - Fixed-width integers and floats: big-endian
//! - VarInt / VarLong: 7 payload bits per byte, high bit = continuation,
//!   least-significant group first
//! - String: VarInt byte count followed by UTF-8 bytes
//! - Byte array: VarInt length followed by raw bytes, or an explicit caller-supplied size
//! - Packed position: one 64-bit word, `X:26 | Z:26 | Y:12`
//! - Triple double: three big-endian `f64`, no prefix
//!
//! Running out of input is always [`FrameError::Truncated`]; nothing is ever read
//! partially.

use bytes::{Buf, BufMut, Bytes};

use crate::core::types::{BlockPos, Look, Vec3d};
use crate::error::FrameError;

/// Maximum number of bytes a VarInt may occupy on the wire.
pub const MAX_VARINT_LEN: usize = 5;

/// Maximum number of bytes a VarLong may occupy on the wire.
pub const MAX_VARLONG_LEN: usize = 10;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

const X_Z_BITS: u32 = 26;
const Y_BITS: u32 = 12;

/// Number of bytes `value` occupies when VarInt-encoded.
#[inline]
pub fn varint_size(value: i32) -> usize {
    let mut value = value as u32;
    let mut size = 0;
    loop {
        value >>= 7;
        size += 1;
        if value == 0 {
            return size;
        }
    }
}

/// Number of bytes `value` occupies when VarLong-encoded.
#[inline]
pub fn varlong_size(value: i64) -> usize {
    let mut value = value as u64;
    let mut size = 0;
    loop {
        value >>= 7;
        size += 1;
        if value == 0 {
            return size;
        }
    }
}

/// Packs a block coordinate into the protocol's 64-bit position word.
#[inline]
pub fn pack_position(pos: BlockPos) -> i64 {
    ((pos.x as i64 & 0x3FF_FFFF) << 38)
        | ((pos.z as i64 & 0x3FF_FFFF) << 12)
        | (pos.y as i64 & 0xFFF)
}

/// Unpacks a 64-bit position word, sign-extending every axis.
#[inline]
pub fn unpack_position(word: i64) -> BlockPos {
    let raw = word as u64;
    let x = sign_extend((raw >> 38) as i64, X_Z_BITS);
    let z = sign_extend(((raw >> 12) & 0x3FF_FFFF) as i64, X_Z_BITS);
    let y = sign_extend((raw & 0xFFF) as i64, Y_BITS);
    BlockPos::new(x, y, z)
}

/// Two's-complement threshold correction for a `bits`-wide unsigned field.
#[inline]
fn sign_extend(value: i64, bits: u32) -> i32 {
    if value >= 1 << (bits - 1) {
        (value - (1 << bits)) as i32
    } else {
        value as i32
    }
}

/// Decoding half of the codec. Implemented for every [`Buf`].
pub trait ProtocolRead: Buf {
    /// Fails unless at least `needed` bytes remain.
    #[inline]
    fn ensure(&self, needed: usize) -> Result<(), FrameError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(FrameError::Truncated { needed, remaining });
        }
        Ok(())
    }

    fn read_ubyte(&mut self) -> Result<u8, FrameError> {
        self.ensure(1)?;
        Ok(self.get_u8())
    }

    fn read_sbyte(&mut self) -> Result<i8, FrameError> {
        self.ensure(1)?;
        Ok(self.get_i8())
    }

    /// Booleans are a single byte; only `0x01` is true.
    fn read_bool(&mut self) -> Result<bool, FrameError> {
        Ok(self.read_ubyte()? == 0x01)
    }

    fn read_ushort(&mut self) -> Result<u16, FrameError> {
        self.ensure(2)?;
        Ok(self.get_u16())
    }

    fn read_short(&mut self) -> Result<i16, FrameError> {
        self.ensure(2)?;
        Ok(self.get_i16())
    }

    fn read_int(&mut self) -> Result<i32, FrameError> {
        self.ensure(4)?;
        Ok(self.get_i32())
    }

    fn read_long(&mut self) -> Result<i64, FrameError> {
        self.ensure(8)?;
        Ok(self.get_i64())
    }

    fn read_float(&mut self) -> Result<f32, FrameError> {
        self.ensure(4)?;
        Ok(self.get_f32())
    }

    fn read_double(&mut self) -> Result<f64, FrameError> {
        self.ensure(8)?;
        Ok(self.get_f64())
    }

    /// Reads a VarInt, rejecting encodings that run past 32 bits of shift.
    fn read_varint(&mut self) -> Result<i32, FrameError> {
        let mut value: u32 = 0;
        let mut position: u32 = 0;
        loop {
            let byte = self.read_ubyte()?;
            value |= u32::from(byte & SEGMENT_BITS) << position;
            if byte & CONTINUE_BIT == 0 {
                return Ok(value as i32);
            }
            position += 7;
            if position >= 32 {
                return Err(FrameError::VarIntTooLarge);
            }
        }
    }

    /// Reads a VarLong, rejecting encodings that run past 64 bits of shift.
    fn read_varlong(&mut self) -> Result<i64, FrameError> {
        let mut value: u64 = 0;
        let mut position: u32 = 0;
        loop {
            let byte = self.read_ubyte()?;
            value |= u64::from(byte & SEGMENT_BITS) << position;
            if byte & CONTINUE_BIT == 0 {
                return Ok(value as i64);
            }
            position += 7;
            if position >= 64 {
                return Err(FrameError::VarIntTooLarge);
            }
        }
    }

    /// Reads a VarInt length prefix and validates it against the remaining input.
    fn read_length(&mut self) -> Result<usize, FrameError> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(FrameError::NegativeLength(len));
        }
        let len = len as usize;
        self.ensure(len)?;
        Ok(len)
    }

    /// Reads exactly `len` bytes. Used when the enclosing frame already fixes the size.
    fn read_sized_bytes(&mut self, len: usize) -> Result<Bytes, FrameError> {
        self.ensure(len)?;
        Ok(self.copy_to_bytes(len))
    }

    fn read_byte_array(&mut self) -> Result<Bytes, FrameError> {
        let len = self.read_length()?;
        Ok(self.copy_to_bytes(len))
    }

    fn read_string(&mut self) -> Result<String, FrameError> {
        let len = self.read_length()?;
        let raw = self.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| FrameError::Utf8Invalid)
    }

    fn read_position(&mut self) -> Result<BlockPos, FrameError> {
        Ok(unpack_position(self.read_long()?))
    }

    fn read_vec3d(&mut self) -> Result<Vec3d, FrameError> {
        let x = self.read_double()?;
        let y = self.read_double()?;
        let z = self.read_double()?;
        Ok(Vec3d::new(x, y, z))
    }

    /// Yaw then pitch, two big-endian `f32`.
    fn read_look(&mut self) -> Result<Look, FrameError> {
        let yaw = self.read_float()?;
        let pitch = self.read_float()?;
        Ok(Look::new(yaw, pitch))
    }
}

impl<B: Buf + ?Sized> ProtocolRead for B {}

/// Encoding half of the codec. Implemented for every [`BufMut`].
///
/// Fixed-width values go straight through `BufMut::put_*`, which is big-endian.
pub trait ProtocolWrite: BufMut {
    fn write_bool(&mut self, value: bool) {
        self.put_u8(if value { 0x01 } else { 0x00 });
    }

    fn write_varint(&mut self, value: i32) {
        let mut value = value as u32;
        loop {
            if value & !u32::from(SEGMENT_BITS) == 0 {
                self.put_u8(value as u8);
                return;
            }
            self.put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
            value >>= 7;
        }
    }

    fn write_varlong(&mut self, value: i64) {
        let mut value = value as u64;
        loop {
            if value & !u64::from(SEGMENT_BITS) == 0 {
                self.put_u8(value as u8);
                return;
            }
            self.put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
            value >>= 7;
        }
    }

    fn write_byte_array(&mut self, data: &[u8]) {
        self.write_varint(data.len() as i32);
        self.put_slice(data);
    }

    fn write_string(&mut self, value: &str) {
        self.write_byte_array(value.as_bytes());
    }

    fn write_position(&mut self, pos: BlockPos) {
        self.put_i64(pack_position(pos));
    }

    fn write_vec3d(&mut self, value: Vec3d) {
        self.put_f64(value.x);
        self.put_f64(value.y);
        self.put_f64(value.z);
    }

    fn write_look(&mut self, look: Look) {
        self.put_f32(look.yaw);
        self.put_f32(look.pitch);
    }
}

impl<B: BufMut + ?Sized> ProtocolWrite for B {}
