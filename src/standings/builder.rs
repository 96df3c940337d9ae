use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::health::HealthState;
use crate::api::latency::RecomputeLatency;
use crate::db::LeagueData;
use crate::error::{AppError, Result};
use crate::standings::compute_standings;
use crate::state::SnapshotCache;
use crate::types::{now_ms, LeagueSnapshot};

/// Computes league standings on demand behind a TTL cache.
///
/// Concurrent misses for one league serialize on a per-league lock and re-check
/// the cache, so a burst of requests costs a single recompute. When recompute
/// fails with `DataUnavailable` and an older snapshot exists, that snapshot is
/// served with `stale = true`.
pub struct SnapshotBuilder {
    data: Arc<dyn LeagueData>,
    cache: Arc<SnapshotCache>,
    ttl: Duration,
    /// league_id → recompute lock
    inflight: DashMap<String, Arc<Mutex<()>>>,
    latency: Arc<RecomputeLatency>,
    health: Arc<HealthState>,
}

/// A caller's hold on a league's recompute lock.
///
/// Dropping the last hold removes the map entry, so the map only tracks leagues
/// with a recompute queued or running. Drop order matters: the mutex guard taken
/// from `lock` must be released before the slot itself.
struct InflightSlot<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    league_id: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn acquire(map: &'a DashMap<String, Arc<Mutex<()>>>, league_id: &'a str) -> Self {
        let lock = map.entry(league_id.to_string()).or_default().value().clone();
        Self { map, league_id, lock }
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        // Two owners left means the map and this slot: nobody else is waiting.
        self.map.remove_if(self.league_id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

impl SnapshotBuilder {
    pub fn new(
        data: Arc<dyn LeagueData>,
        cache: Arc<SnapshotCache>,
        ttl: Duration,
        latency: Arc<RecomputeLatency>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            data,
            cache,
            ttl,
            inflight: DashMap::new(),
            latency,
            health,
        }
    }

    pub async fn get_snapshot(&self, league_id: &str) -> Result<LeagueSnapshot> {
        if league_id.trim().is_empty() {
            return Err(AppError::InvalidArgument("leagueId is required".to_string()));
        }

        if let Some(hit) = self.cache.get_fresh(league_id, self.ttl) {
            return Ok(hit);
        }

        let slot = InflightSlot::acquire(&self.inflight, league_id);
        let _guard = slot.lock.lock().await;

        // Another caller may have refreshed the entry while we waited.
        if let Some(hit) = self.cache.get_fresh(league_id, self.ttl) {
            return Ok(hit);
        }

        match self.recompute(league_id).await {
            Ok(snapshot) => {
                self.cache.insert(snapshot.clone());
                Ok(snapshot)
            }
            Err(AppError::DataUnavailable(reason)) => {
                self.health.inc_recompute_failures();
                match self.cache.get_any(league_id) {
                    Some(mut stale) => {
                        warn!(
                            league_id,
                            computed_at = stale.computed_at,
                            "Serving stale snapshot, recompute failed: {reason}"
                        );
                        stale.stale = true;
                        Ok(stale)
                    }
                    None => Err(AppError::DataUnavailable(reason)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn recompute(&self, league_id: &str) -> Result<LeagueSnapshot> {
        let started = Instant::now();
        let input = self
            .data
            .find_standings(league_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("league {league_id}")))?;
        let standings = compute_standings(&input);
        self.latency.record(started.elapsed());

        let computed_at = now_ms();
        self.health.set_last_recompute_at_ms(computed_at);
        debug!(
            league_id,
            teams = standings.len(),
            matchups = input.matchups.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Snapshot recomputed"
        );

        Ok(LeagueSnapshot {
            league_id: league_id.to_string(),
            standings,
            computed_at,
            stale: false,
        })
    }

    /// Drops every cached snapshot. Called once the server has stopped serving.
    pub fn flush(&self) -> usize {
        self.inflight.clear();
        self.cache.flush()
    }

    pub fn cached_leagues(&self) -> usize {
        self.cache.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
