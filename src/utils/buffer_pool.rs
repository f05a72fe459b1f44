//! # Buffer Pool
//!
//! Reusable scratch buffers for packet serialization.
//!
//! Each outbound packet body is written into a rented [`BytesMut`] before it is
//! framed. The buffer goes back to the pool when the [`PooledBuffer`] is dropped.
//! Buffers that sat unused for longer than the idle timeout are released by
//! [`BufferPool::reap_idle`], which [`BufferPool::spawn_reaper`] runs periodically.
//!
//! ## Usage
//! ```rust
//! use blockwire::utils::buffer_pool::BufferPool;
//! use bytes::BufMut;
//!
//! let pool = BufferPool::new(4);
//! {
//!     let mut scratch = pool.acquire();
//!     scratch.put_u8(0x2A);
//! } // returned here
//! assert_eq!(pool.available(), 4);
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Buffers that grew past this are not pooled again (64 KiB)
const MAX_POOLED_BUFFER_SIZE: usize = 64 * 1024;

/// Capacity of freshly allocated buffers
const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Idle time after which a pooled buffer is released
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

struct Slot {
    buffer: BytesMut,
    returned_at: Instant,
}

type Slots = Arc<Mutex<Vec<Slot>>>;

/// A rented buffer that returns itself to the pool when dropped
pub struct PooledBuffer {
    buffer: BytesMut,
    pool: Slots,
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if self.buffer.capacity() <= MAX_POOLED_BUFFER_SIZE {
            self.buffer.clear();
            if let Ok(mut pool) = self.pool.lock() {
                pool.push(Slot {
                    buffer: std::mem::take(&mut self.buffer),
                    returned_at: Instant::now(),
                });
            }
        }
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

/// Thread-safe scratch buffer pool
#[derive(Clone)]
pub struct BufferPool {
    pool: Slots,
    initial_capacity: usize,
}

impl BufferPool {
    /// Create a pool with `pool_size` pre-allocated buffers
    pub fn new(pool_size: usize) -> Self {
        let now = Instant::now();
        let slots = (0..pool_size)
            .map(|_| Slot {
                buffer: BytesMut::with_capacity(DEFAULT_BUFFER_CAPACITY),
                returned_at: now,
            })
            .collect();

        Self {
            pool: Arc::new(Mutex::new(slots)),
            initial_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Rent a buffer, allocating when the pool is empty
    pub fn acquire(&self) -> PooledBuffer {
        let buffer = self
            .pool
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .map(|slot| slot.buffer)
            .unwrap_or_else(|| BytesMut::with_capacity(self.initial_capacity));

        PooledBuffer {
            buffer,
            pool: self.pool.clone(),
        }
    }

    /// Number of buffers currently waiting in the pool
    pub fn available(&self) -> usize {
        self.pool.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Releases buffers idle for at least `idle_timeout`. Returns how many were dropped.
    pub fn reap_idle(&self, idle_timeout: Duration) -> usize {
        let Ok(mut pool) = self.pool.lock() else {
            return 0;
        };
        let before = pool.len();
        pool.retain(|slot| slot.returned_at.elapsed() < idle_timeout);
        before - pool.len()
    }

    /// Runs [`reap_idle`](Self::reap_idle) every `idle_timeout` until `shutdown` fires.
    pub fn spawn_reaper(
        &self,
        idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle_timeout);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let released = pool.reap_idle(idle_timeout);
                        if released > 0 {
                            debug!(
                                released,
                                remaining = pool.available(),
                                "reaped idle scratch buffers"
                            );
                        }
                    }
                }
            }
        })
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SCRATCH_POOL_SIZE)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_buffer_pool_basic() {
        let pool = BufferPool::new(10);
        assert_eq!(pool.available(), 10);

        let mut buf = pool.acquire();
        assert_eq!(pool.available(), 9);

        buf.put_u8(42);
        assert_eq!(buf[0], 42);

        drop(buf);
        assert_eq!(pool.available(), 10);
    }

    #[test]
    fn test_buffer_pool_reuse_is_cleared() {
        let pool = BufferPool::new(1);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"test");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 4);
    }

    #[test]
    fn test_oversized_buffer_not_returned() {
        let pool = BufferPool::new(0);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(&vec![0u8; MAX_POOLED_BUFFER_SIZE + 1]);
        }
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_reap_idle() {
        let pool = BufferPool::new(3);
        assert_eq!(pool.reap_idle(Duration::from_secs(3600)), 0);
        assert_eq!(pool.reap_idle(Duration::ZERO), 3);
        assert_eq!(pool.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_task_stops_on_shutdown() {
        let pool = BufferPool::new(2);
        let shutdown = CancellationToken::new();
        let handle = pool.spawn_reaper(Duration::from_secs(30), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(pool.available(), 0);

        shutdown.cancel();
        assert!(handle.await.is_ok());
    }
}
