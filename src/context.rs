use std::sync::Arc;

use tokio::sync::watch;

use crate::api::health::HealthState;
use crate::api::latency::RecomputeLatency;
use crate::config::Config;
use crate::db::{LeagueData, NotificationStore};
use crate::realtime::RealtimeSettings;
use crate::services::NotificationService;
use crate::standings::SnapshotBuilder;
use crate::state::SnapshotCache;

/// Process-wide service context, built once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub notifications: NotificationService,
    pub snapshots: Arc<SnapshotBuilder>,
    pub health: Arc<HealthState>,
    pub latency: Arc<RecomputeLatency>,
    pub realtime: RealtimeSettings,
    /// Flips to `true` when the server begins shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl AppContext {
    pub fn new(
        cfg: &Config,
        notification_store: Arc<dyn NotificationStore>,
        league_data: Arc<dyn LeagueData>,
        cache: Arc<SnapshotCache>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let health = Arc::new(HealthState::new());
        let latency = Arc::new(RecomputeLatency::new());
        let snapshots = Arc::new(SnapshotBuilder::new(
            league_data,
            cache,
            cfg.snapshot_ttl,
            Arc::clone(&latency),
            Arc::clone(&health),
        ));

        Self {
            notifications: NotificationService::new(notification_store),
            snapshots,
            health,
            latency,
            realtime: RealtimeSettings {
                poll_interval: cfg.realtime_poll_interval,
                max_session: cfg.realtime_max_session,
            },
            shutdown,
        }
    }
}
