//! Observability and Metrics
//!
//! Atomic counters for connection, login and frame traffic. Each client owns one
//! [`Metrics`] shared by its tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for client connections
#[derive(Debug)]
pub struct Metrics {
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Login attempts
    pub logins_total: AtomicU64,
    /// Logins that reached the play state
    pub logins_success: AtomicU64,
    /// Logins that failed or were rejected
    pub logins_failed: AtomicU64,
    /// Frames written to the socket
    pub frames_sent: AtomicU64,
    /// Frames read from the socket
    pub frames_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    /// Frames skipped because their id resolved to no packet
    pub unknown_packets: AtomicU64,
    pub keep_alives_echoed: AtomicU64,
    pub respawns_requested: AtomicU64,
    /// Connection errors (I/O)
    pub connection_errors: AtomicU64,
    /// Protocol errors (framing, unexpected packets, crypto)
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            logins_total: AtomicU64::new(0),
            logins_success: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            unknown_packets: AtomicU64::new(0),
            keep_alives_echoed: AtomicU64::new(0),
            respawns_requested: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn login_attempt(&self) {
        self.logins_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_success(&self) {
        self.logins_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame written, `byte_count` including its length prefix
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn unknown_packet(&self) {
        self.unknown_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn keep_alive_echoed(&self) {
        self.keep_alives_echoed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn respawn_requested(&self) {
        self.respawns_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            logins_total: self.logins_total.load(Ordering::Relaxed),
            logins_success: self.logins_success.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            unknown_packets: self.unknown_packets.load(Ordering::Relaxed),
            keep_alives_echoed: self.keep_alives_echoed.load(Ordering::Relaxed),
            respawns_requested: self.respawns_requested.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            logins_success = snapshot.logins_success,
            logins_failed = snapshot.logins_failed,
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            unknown_packets = snapshot.unknown_packets,
            keep_alives_echoed = snapshot.keep_alives_echoed,
            respawns_requested = snapshot.respawns_requested,
            connection_errors = snapshot.connection_errors,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Client metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub logins_total: u64,
    pub logins_success: u64,
    pub logins_failed: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub unknown_packets: u64,
    pub keep_alives_echoed: u64,
    pub respawns_requested: u64,
    pub connection_errors: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_ms = self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }
}
