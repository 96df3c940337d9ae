//! Shared health state for the /health endpoint.
//! Updated by the snapshot builder and realtime sessions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared health counters. Updated by service components, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Realtime sessions currently streaming.
    open_streams: AtomicU64,
    /// Millisecond timestamp of the last successful snapshot recompute (0 = none).
    last_recompute_at_ms: AtomicU64,
    /// Recomputes that failed since process start.
    recompute_failures: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_opened(&self) {
        self.open_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_closed(&self) {
        self.open_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn set_last_recompute_at_ms(&self, ms: i64) {
        self.last_recompute_at_ms.store(ms.max(0) as u64, Ordering::Relaxed);
    }

    pub fn inc_recompute_failures(&self) {
        self.recompute_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn open_streams(&self) -> u64 {
        self.open_streams.load(Ordering::Relaxed)
    }

    pub fn last_recompute_at_ms(&self) -> u64 {
        self.last_recompute_at_ms.load(Ordering::Relaxed)
    }

    pub fn recompute_failures(&self) -> u64 {
        self.recompute_failures.load(Ordering::Relaxed)
    }
}
