//! In-memory latency histogram for league snapshot recomputes.
//! Records the time spent in the league data accessor plus ranking.

use std::sync::Mutex;
use std::time::Duration;

/// Shared recompute latency stats. The snapshot builder records, the API reads.
/// Values stored in microseconds.
pub struct RecomputeLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

/// p50/p95/p99 in microseconds plus the sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
    pub samples: u64,
}

impl RecomputeLatency {
    /// Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 100_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn summary(&self) -> LatencySummary {
        let Ok(h) = self.inner.lock() else {
            return LatencySummary::default();
        };
        if h.len() == 0 {
            return LatencySummary::default();
        }
        LatencySummary {
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
            samples: h.len(),
        }
    }
}

impl Default for RecomputeLatency {
    fn default() -> Self {
        Self::new()
    }
}
