//! # Transport Layer
//!
//! Byte-level plumbing under the protocol.
//!
//! - [`cipher`]: AES-128-CFB8 stream wrapper enabled after login
//! - [`writer`]: the single-writer send queue

pub mod cipher;
pub mod writer;
