use std::time::Duration;

use crate::error::{AppError, Result};

/// How long a computed league snapshot is served without recomputation (seconds).
pub const SNAPSHOT_TTL_SECS: u64 = 120;

/// Expired snapshots are kept this long as a stale fallback before the sweeper drops them.
pub const SNAPSHOT_STALE_MAX_SECS: u64 = 3_600;

/// Cache sweeper interval (seconds).
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Realtime channel poll interval: time between snapshot polls (seconds).
pub const REALTIME_POLL_INTERVAL_SECS: u64 = 5;

/// Hard cap on a single realtime session's lifetime (seconds).
pub const REALTIME_MAX_SESSION_SECS: u64 = 3_600;

/// Buffered frames per realtime session before the session task waits on the client.
pub const REALTIME_CHANNEL_CAPACITY: usize = 16;

/// Default page size for the notification list endpoint.
pub const NOTIFICATION_LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// SNAPSHOT_TTL_SECS
    pub snapshot_ttl: Duration,
    /// SNAPSHOT_STALE_MAX_SECS
    pub snapshot_stale_max: Duration,
    /// REALTIME_POLL_INTERVAL_SECS
    pub realtime_poll_interval: Duration,
    /// REALTIME_MAX_SESSION_SECS
    pub realtime_max_session: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "league.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            snapshot_ttl: secs_from_env("SNAPSHOT_TTL_SECS", SNAPSHOT_TTL_SECS),
            snapshot_stale_max: secs_from_env("SNAPSHOT_STALE_MAX_SECS", SNAPSHOT_STALE_MAX_SECS),
            realtime_poll_interval: secs_from_env(
                "REALTIME_POLL_INTERVAL_SECS",
                REALTIME_POLL_INTERVAL_SECS,
            ),
            realtime_max_session: secs_from_env(
                "REALTIME_MAX_SESSION_SECS",
                REALTIME_MAX_SESSION_SECS,
            ),
        })
    }
}

fn secs_from_env(key: &str, default: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
