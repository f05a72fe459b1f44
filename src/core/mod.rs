//! # Core Wire Components
//!
//! Primitive encoding, value types, and packet framing.
//!
//! ## Components
//! - **Codec**: big-endian primitives, VarInt/VarLong, strings, packed positions
//! - **Types**: block positions, vectors and look angles
//! - **Frame**: length-prefixed frames and the tokio codec that splits a stream into them
//!
//! ## Wire Format
//! ```text
//! [Length(VarInt)] [PacketId(VarInt)] [Body(Length - size(PacketId))]
//! ```
//!
//! ## Security
//! - Maximum frame size: 2 MiB - 1 (the largest length a 3-byte VarInt can carry)
//! - Length validation before allocation
//! - Malformed VarInts rejected after 5 bytes

pub mod codec;
pub mod frame;
pub mod types;
