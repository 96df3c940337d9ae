use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{sse::Sse, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::latency::LatencySummary;
use crate::config::{NOTIFICATION_LIST_LIMIT, REALTIME_CHANNEL_CAPACITY};
use crate::context::AppContext;
use crate::error::AppError;
use crate::realtime::{Frame, RealtimeSession};
use crate::types::{LeagueSnapshot, NewNotification, Notification};

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/realtime/league/:league_id", get(stream_league))
        .route("/leagues/:league_id/standings", get(get_standings))
        .route("/notifications", get(list_notifications).post(create_notification))
        .route("/notifications/unread-count", get(get_unread_count))
        .route("/notifications/mark-all-read", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(ctx)
}

// ---------------------------------------------------------------------------
// Query / body structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadBody {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationBody {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub open_streams: u64,
    pub cached_leagues: usize,
    pub last_recompute_at_ms: Option<u64>,
    pub recompute_failures: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

impl From<LatencySummary> for LatencyResponse {
    fn from(s: LatencySummary) -> Self {
        let ms = |us: Option<u64>| us.map(|v| v as f64 / 1_000.0);
        Self {
            samples: s.samples,
            p50_ms: ms(s.p50_us),
            p95_ms: ms(s.p95_us),
            p99_ms: ms(s.p99_us),
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn stream_league(
    State(ctx): State<AppContext>,
    Path(league_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if league_id.trim().is_empty() {
        return Err(AppError::InvalidArgument("leagueId is required".to_string()));
    }

    let (tx, rx) = mpsc::channel::<Frame>(REALTIME_CHANNEL_CAPACITY);
    let session = RealtimeSession::new(
        league_id,
        ctx.snapshots.clone(),
        ctx.realtime,
        tx,
        ctx.shutdown.clone(),
        ctx.health.clone(),
    );
    tokio::spawn(session.run());

    let stream = ReceiverStream::new(rx).map(|frame| Ok::<_, Infallible>(frame.into_event()));
    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    ];
    Ok((headers, Sse::new(stream)))
}

async fn get_standings(
    State(ctx): State<AppContext>,
    Path(league_id): Path<String>,
) -> Result<Json<LeagueSnapshot>, AppError> {
    Ok(Json(ctx.snapshots.get_snapshot(&league_id).await?))
}

async fn get_unread_count(
    State(ctx): State<AppContext>,
    Query(params): Query<UserQuery>,
) -> Result<Json<CountResponse>, AppError> {
    let user_id = params.user_id.unwrap_or_default();
    let count = ctx.notifications.get_unread_count(&user_id).await?;
    Ok(Json(CountResponse { count }))
}

async fn mark_read(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    ctx.notifications.mark_as_read(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn mark_all_read(
    State(ctx): State<AppContext>,
    payload: Result<Json<MarkAllReadBody>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let body = json_body(payload)?;
    let user_id = body.user_id.unwrap_or_default();
    ctx.notifications.mark_all_as_read(&user_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn list_notifications(
    State(ctx): State<AppContext>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let user_id = params.user_id.unwrap_or_default();
    let notifications = ctx
        .notifications
        .list(
            &user_id,
            params.unread_only.unwrap_or(false),
            params.limit.unwrap_or(NOTIFICATION_LIST_LIMIT),
        )
        .await?;
    Ok(Json(notifications))
}

async fn create_notification(
    State(ctx): State<AppContext>,
    payload: Result<Json<CreateNotificationBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let body = json_body(payload)?;
    let created = ctx
        .notifications
        .create(NewNotification {
            user_id: body.user_id.unwrap_or_default(),
            kind: body.kind.unwrap_or_default(),
            message: body.message.unwrap_or_default(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let last = ctx.health.last_recompute_at_ms();
    Json(HealthResponse {
        status: "ok",
        open_streams: ctx.health.open_streams(),
        cached_leagues: ctx.snapshots.cached_leagues(),
        last_recompute_at_ms: (last > 0).then_some(last),
        recompute_failures: ctx.health.recompute_failures(),
    })
}

async fn get_stats_latency(State(ctx): State<AppContext>) -> Json<LatencyResponse> {
    Json(ctx.latency.summary().into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, Response};
    use tokio::sync::watch;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::db::leagues::tests::{seed_league, seed_matchup};
    use crate::db::{test_pool, SqliteLeagueData, SqliteNotificationStore};
    use crate::services::notifications::tests::UnavailableStore;
    use crate::state::SnapshotCache;

    fn test_config() -> Config {
        Config {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            snapshot_ttl: Duration::from_secs(60),
            snapshot_stale_max: Duration::from_secs(3_600),
            realtime_poll_interval: Duration::from_millis(50),
            realtime_max_session: Duration::from_secs(60),
        }
    }

    async fn test_app() -> (Router, sqlx::SqlitePool, watch::Sender<bool>) {
        let pool = test_pool().await;
        seed_league(&pool, "L1", 2025, &["t1", "t2"]).await;
        seed_matchup(&pool, "L1", 2025, 1, ("t2", 131.2), ("t1", 98.4), true).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = AppContext::new(
            &test_config(),
            Arc::new(SqliteNotificationStore::new(pool.clone())),
            Arc::new(SqliteLeagueData::new(pool.clone())),
            SnapshotCache::new(),
            shutdown_rx,
        );
        (router(ctx), pool, shutdown_tx)
    }

    async fn seed_notification(pool: &sqlx::SqlitePool, user_id: &str) -> i64 {
        sqlx::query(
            "INSERT INTO notifications (user_id, kind, message, read, created_at) VALUES (?, 'trade', 'offer', 0, 1)",
        )
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_of(resp: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unread_count_requires_user_id() {
        let (app, _pool, _shutdown) = test_app().await;

        let resp = app.clone().oneshot(get("/notifications/unread-count")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_of(resp).await["error"].as_str().unwrap().contains("userId"));

        let resp = app.oneshot(get("/notifications/unread-count?userId=")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unread_count_then_mark_flow() {
        let (app, pool, _shutdown) = test_app().await;
        let first = seed_notification(&pool, "alice").await;
        seed_notification(&pool, "alice").await;

        let resp = app.clone().oneshot(get("/notifications/unread-count?userId=alice")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_of(resp).await["count"], 2);

        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(post_json(&format!("/notifications/{first}/read"), ""))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(json_of(resp).await["success"], true);
        }
        let resp = app.clone().oneshot(get("/notifications/unread-count?userId=alice")).await.unwrap();
        assert_eq!(json_of(resp).await["count"], 1);

        let resp = app
            .clone()
            .oneshot(post_json("/notifications/mark-all-read", r#"{"userId":"alice"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_of(resp).await["success"], true);

        let resp = app.oneshot(get("/notifications/unread-count?userId=alice")).await.unwrap();
        assert_eq!(json_of(resp).await["count"], 0);
    }

    #[tokio::test]
    async fn mark_read_on_unknown_id_still_succeeds() {
        let (app, _pool, _shutdown) = test_app().await;
        let resp = app.oneshot(post_json("/notifications/987654/read", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_of(resp).await["success"], true);
    }

    #[tokio::test]
    async fn mark_all_read_rejects_bad_bodies() {
        let (app, pool, _shutdown) = test_app().await;
        seed_notification(&pool, "alice").await;

        for body in ["{}", r#"{"userId":""}"#, r#"{"userId":42}"#, "not json"] {
            let resp = app
                .clone()
                .oneshot(post_json("/notifications/mark-all-read", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert!(json_of(resp).await["error"].is_string());
        }

        let resp = app.oneshot(get("/notifications/unread-count?userId=alice")).await.unwrap();
        assert_eq!(json_of(resp).await["count"], 1);
    }

    #[tokio::test]
    async fn create_and_list_notifications() {
        let (app, _pool, _shutdown) = test_app().await;

        let resp = app
            .clone()
            .oneshot(post_json(
                "/notifications",
                r#"{"userId":"bob","type":"waiver","message":"Claim processed"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = json_of(resp).await;
        assert_eq!(created["userId"], "bob");
        assert_eq!(created["read"], false);

        let resp = app
            .clone()
            .oneshot(post_json("/notifications", r#"{"userId":"bob"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app.oneshot(get("/notifications?userId=bob&unreadOnly=true")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let list = json_of(resp).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["type"], "waiver");
    }

    #[tokio::test]
    async fn store_failure_is_an_opaque_500() {
        let pool = test_pool().await;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let store = Arc::new(UnavailableStore::default());
        let ctx = AppContext::new(
            &test_config(),
            store.clone(),
            Arc::new(SqliteLeagueData::new(pool)),
            SnapshotCache::new(),
            shutdown_rx,
        );
        let app = router(ctx);

        let requests = [
            get("/notifications/unread-count?userId=alice"),
            post_json("/notifications/7/read", ""),
            post_json("/notifications/mark-all-read", r#"{"userId":"alice"}"#),
        ];
        for req in requests {
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                json_of(resp).await,
                serde_json::json!({ "error": "internal server error" })
            );
        }
        assert_eq!(store.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn standings_endpoint_ranks_and_404s() {
        let (app, _pool, _shutdown) = test_app().await;

        let resp = app.clone().oneshot(get("/leagues/L1/standings")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let snapshot = json_of(resp).await;
        assert_eq!(snapshot["leagueId"], "L1");
        assert_eq!(snapshot["standings"][0]["teamId"], "t2");
        assert_eq!(snapshot["standings"][0]["rank"], 1);
        assert_eq!(snapshot["standings"][1]["losses"], 1);

        let resp = app.oneshot(get("/leagues/nope/standings")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(json_of(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn realtime_stream_headers_and_first_frame() {
        let (app, _pool, _shutdown) = test_app().await;

        let resp = app.oneshot(get("/realtime/league/L1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let mut body = resp.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .expect("frame within timeout")
            .expect("stream not empty")
            .unwrap();
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.contains("event: snapshot"), "{text}");
        assert!(text.contains("\"leagueId\":\"L1\""), "{text}");
    }

    #[tokio::test]
    async fn realtime_stream_for_unknown_league_sends_error_and_ends() {
        let (app, _pool, _shutdown) = test_app().await;

        let resp = app.oneshot(get("/realtime/league/nope")).await.unwrap();
        let bytes = tokio::time::timeout(
            Duration::from_secs(2),
            axum::body::to_bytes(resp.into_body(), usize::MAX),
        )
        .await
        .expect("stream ends")
        .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("event: error"), "{text}");
    }

    #[tokio::test]
    async fn health_and_latency_report_recomputes() {
        let (app, _pool, _shutdown) = test_app().await;
        app.clone().oneshot(get("/leagues/L1/standings")).await.unwrap();

        let health = json_of(app.clone().oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["cachedLeagues"], 1);
        assert!(health["lastRecomputeAtMs"].is_u64());

        let latency = json_of(app.oneshot(get("/stats/latency")).await.unwrap()).await;
        assert_eq!(latency["samples"], 1);
        assert!(latency["p50_ms"].is_f64());
    }
}
