mod api;
mod config;
mod context;
mod db;
mod error;
mod realtime;
mod services;
mod standings;
mod state;
mod types;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::router;
use crate::config::Config;
use crate::context::AppContext;
use crate::db::{SqliteLeagueData, SqliteNotificationStore};
use crate::error::Result;
use crate::state::{CacheSweeper, SnapshotCache};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Shared context ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cache = SnapshotCache::new();
    let ctx = AppContext::new(
        &cfg,
        Arc::new(SqliteNotificationStore::new(pool.clone())),
        Arc::new(SqliteLeagueData::new(pool.clone())),
        Arc::clone(&cache),
        shutdown_rx.clone(),
    );
    info!(
        snapshot_ttl_secs = cfg.snapshot_ttl.as_secs(),
        poll_interval_secs = cfg.realtime_poll_interval.as_secs(),
        max_session_secs = cfg.realtime_max_session.as_secs(),
        "Services initialised"
    );

    // --- Background tasks ---

    // Stale snapshot sweeper
    let sweeper = CacheSweeper::new(Arc::clone(&cache), cfg.snapshot_stale_max, shutdown_rx);
    tokio::spawn(async move { sweeper.run().await });

    // --- HTTP API server ---
    let app = router(ctx.clone());
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    // --- Teardown ---
    let flushed = ctx.snapshots.flush();
    info!(flushed, "Snapshot cache flushed");
    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C (or SIGTERM on unix) after telling every realtime session
/// and background task to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing realtime streams");
    let _ = shutdown_tx.send(true);
}
