//! # Utility Modules
//!
//! Supporting pieces used by the connection but not part of the protocol itself.
//!
//! ## Components
//! - **Buffer Pool**: reusable scratch buffers for packet serialization, with an idle reaper
//! - **Logging**: `tracing-subscriber` setup
//! - **Metrics**: thread-safe observability counters
//! - **Timeout**: async timeout wrappers

pub mod buffer_pool;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use buffer_pool::{BufferPool, PooledBuffer};
