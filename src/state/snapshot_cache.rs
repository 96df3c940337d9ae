use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::CACHE_SWEEP_INTERVAL_SECS;
use crate::types::LeagueSnapshot;

// ---------------------------------------------------------------------------
// CachedSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: LeagueSnapshot,
    stored_at: Instant,
}

impl CachedSnapshot {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }
}

// ---------------------------------------------------------------------------
// SnapshotCache
// ---------------------------------------------------------------------------

/// league_id → most recently computed snapshot.
///
/// Shared by every request and realtime session. Entries outlive their TTL so
/// an expired snapshot can still be served when recompute fails; the sweeper
/// drops them once they pass the stale limit. Last writer wins.
pub struct SnapshotCache {
    entries: DashMap<String, CachedSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot for `league_id` if it was stored less than `ttl` ago.
    pub fn get_fresh(&self, league_id: &str, ttl: Duration) -> Option<LeagueSnapshot> {
        let entry = self.entries.get(league_id)?;
        if entry.age(Instant::now()) < ttl {
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }

    /// Snapshot for `league_id` regardless of age.
    pub fn get_any(&self, league_id: &str) -> Option<LeagueSnapshot> {
        self.entries.get(league_id).map(|e| e.snapshot.clone())
    }

    pub fn insert(&self, snapshot: LeagueSnapshot) {
        self.entries.insert(
            snapshot.league_id.clone(),
            CachedSnapshot { snapshot, stored_at: Instant::now() },
        );
    }

    /// Drops entries older than `max_age`. Returns how many were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.age(now) < max_age);
        before.saturating_sub(self.entries.len())
    }

    /// Empties the cache. Returns how many entries were dropped.
    pub fn flush(&self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self { entries: DashMap::new() }
    }
}

// ---------------------------------------------------------------------------
// CacheSweeper
// ---------------------------------------------------------------------------

/// Background task that drops snapshots older than the stale limit.
/// Runs until the shutdown signal flips.
pub struct CacheSweeper {
    cache: Arc<SnapshotCache>,
    max_age: Duration,
    shutdown: watch::Receiver<bool>,
}

impl CacheSweeper {
    pub fn new(cache: Arc<SnapshotCache>, max_age: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { cache, max_age, shutdown }
    }

    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS));
        ticker.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.cache.sweep(self.max_age);
                    if removed > 0 {
                        debug!(removed, remaining = self.cache.len(), "Swept expired snapshots");
                    }
                }
                _ = self.shutdown.changed() => {
                    info!("Cache sweeper stopping");
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
