//! # Client Service
//!
//! The connection driver tying the layers together.

pub mod client;

pub use client::{Client, DisconnectReason};
