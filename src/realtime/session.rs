use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::error::Result;
use crate::standings::SnapshotBuilder;
use crate::types::LeagueSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct RealtimeSettings {
    /// Time spent idle between two snapshot polls.
    pub poll_interval: Duration,
    /// Sessions are closed once they have been open this long.
    pub max_session: Duration,
}

/// Why a session stopped streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client went away (response body dropped).
    ClientGone,
    /// The server is shutting down.
    Shutdown,
    /// The session hit its maximum lifetime.
    MaxDuration,
    /// Recompute failed; an error frame was sent.
    Failed,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionEnd::ClientGone => "client_gone",
            SessionEnd::Shutdown => "shutdown",
            SessionEnd::MaxDuration => "max_duration",
            SessionEnd::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One unit pushed down a realtime connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Standings changed since the previous frame.
    Snapshot(LeagueSnapshot),
    /// Nothing changed; keeps intermediaries from timing the connection out.
    Heartbeat,
    /// The session hit its maximum lifetime.
    Close,
    /// Recompute failed; carries the client-safe message.
    Error(String),
}

impl Frame {
    pub fn into_event(self) -> Event {
        match self {
            Frame::Snapshot(snapshot) => Event::default()
                .event("snapshot")
                .json_data(&snapshot)
                .unwrap_or_else(|e| {
                    error!(league_id = %snapshot.league_id, "Snapshot encoding failed: {e}");
                    Event::default().event("error").data(r#"{"error":"internal server error"}"#)
                }),
            Frame::Heartbeat => Event::default().comment("heartbeat"),
            Frame::Close => Event::default().event("close").data("max session duration reached"),
            Frame::Error(message) => Event::default()
                .event("error")
                .data(serde_json::json!({ "error": message }).to_string()),
        }
    }
}

/// Keeps the open-stream gauge honest even if the session task is aborted.
struct OpenStreamGuard(Arc<HealthState>);

impl OpenStreamGuard {
    fn new(health: Arc<HealthState>) -> Self {
        health.stream_opened();
        Self(health)
    }
}

impl Drop for OpenStreamGuard {
    fn drop(&mut self) {
        self.0.stream_closed();
    }
}

/// One realtime league connection.
///
/// Alternates between polling the snapshot builder and waiting out the poll
/// interval. A `snapshot` event is sent only when the standings changed since the
/// previous frame; otherwise a heartbeat comment keeps proxies from timing out.
/// Every wait also watches the frame channel, the shutdown signal and the session
/// deadline, so a dropped client stops the polling at the next suspend point.
pub struct RealtimeSession {
    league_id: String,
    last_snapshot_hash: Option<u64>,
    opened_at: Instant,
    builder: Arc<SnapshotBuilder>,
    settings: RealtimeSettings,
    tx: mpsc::Sender<Frame>,
    shutdown: watch::Receiver<bool>,
    health: Arc<HealthState>,
}

impl RealtimeSession {
    pub fn new(
        league_id: String,
        builder: Arc<SnapshotBuilder>,
        settings: RealtimeSettings,
        tx: mpsc::Sender<Frame>,
        shutdown: watch::Receiver<bool>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            league_id,
            last_snapshot_hash: None,
            opened_at: Instant::now(),
            builder,
            settings,
            tx,
            shutdown,
            health,
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        let _gauge = OpenStreamGuard::new(Arc::clone(&self.health));
        info!(league_id = %self.league_id, "Realtime stream opened");

        let end = self.stream().await;

        info!(
            league_id = %self.league_id,
            reason = %end,
            open_secs = self.opened_at.elapsed().as_secs(),
            "Realtime stream closed"
        );
        end
    }

    async fn stream(&mut self) -> SessionEnd {
        if *self.shutdown.borrow() {
            return SessionEnd::Shutdown;
        }
        let deadline = tokio::time::sleep(self.settings.max_session);
        tokio::pin!(deadline);

        loop {
            // Poll
            let polled = tokio::select! {
                biased;
                _ = self.tx.closed() => return SessionEnd::ClientGone,
                _ = self.shutdown.changed() => return SessionEnd::Shutdown,
                _ = &mut deadline => {
                    let _ = self.tx.send(Frame::Close).await;
                    return SessionEnd::MaxDuration;
                }
                r = self.builder.get_snapshot(&self.league_id) => r,
            };

            let frame = match polled.and_then(|s| self.frame_for(s)) {
                Ok(frame) => frame,
                Err(e) => {
                    error!(league_id = %self.league_id, "Realtime recompute failed: {e}");
                    let _ = self.tx.send(Frame::Error(e.public_message())).await;
                    return SessionEnd::Failed;
                }
            };
            if self.tx.send(frame).await.is_err() {
                return SessionEnd::ClientGone;
            }

            // Wait out the poll interval
            tokio::select! {
                biased;
                _ = self.tx.closed() => return SessionEnd::ClientGone,
                _ = self.shutdown.changed() => return SessionEnd::Shutdown,
                _ = &mut deadline => {
                    let _ = self.tx.send(Frame::Close).await;
                    return SessionEnd::MaxDuration;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// Snapshot event when the standings changed, heartbeat comment otherwise.
    fn frame_for(&mut self, snapshot: LeagueSnapshot) -> Result<Frame> {
        let hash = standings_hash(&snapshot)?;
        if self.last_snapshot_hash == Some(hash) {
            debug!(league_id = %self.league_id, "Standings unchanged, heartbeat");
            return Ok(Frame::Heartbeat);
        }
        self.last_snapshot_hash = Some(hash);
        Ok(Frame::Snapshot(snapshot))
    }
}

/// Hash of what a client can observe changing: the standings and the stale flag.
/// `computed_at` is left out so a recompute with identical results is not a delta.
fn standings_hash(snapshot: &LeagueSnapshot) -> Result<u64> {
    let bytes = serde_json::to_vec(&snapshot.standings)?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    snapshot.stale.hash(&mut hasher);
    Ok(hasher.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
