// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sink statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated by the sink on every send.
#[derive(Debug)]
pub struct SinkStats {
    /// Metrics written and flushed.
    pub metrics_sent: AtomicU64,

    /// Metrics dropped because their channel is not connected.
    pub metrics_dropped: AtomicU64,

    /// Put or flush failures on connected channels.
    pub write_errors: AtomicU64,

    /// Sink creation time.
    pub created: Instant,
}

impl SinkStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self {
            metrics_sent: AtomicU64::new(0),
            metrics_dropped: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub(crate) fn record_sent(&self) {
        self.metrics_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.metrics_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    ///
    /// Channel counts come from the cache and are passed in by the sink.
    pub fn snapshot(&self, channels_connected: usize, channels_failed: usize) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            metrics_sent: self.metrics_sent.load(Ordering::Relaxed),
            metrics_dropped: self.metrics_dropped.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            channels_connected,
            channels_failed,
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for SinkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of sink statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    pub metrics_sent: u64,
    pub metrics_dropped: u64,
    pub write_errors: u64,
    pub channels_connected: usize,
    pub channels_failed: usize,
    pub uptime_secs: u64,
}

impl SinkStatsSnapshot {
    /// Total send calls seen.
    pub fn metrics_total(&self) -> u64 {
        self.metrics_sent + self.metrics_dropped + self.write_errors
    }

    /// Calculate metrics sent per second.
    pub fn metrics_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.metrics_sent as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
