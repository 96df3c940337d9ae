pub mod leagues;
pub mod models;
pub mod notifications;

pub use leagues::{LeagueData, SqliteLeagueData};
pub use notifications::{NotificationStore, SqliteNotificationStore};

use crate::error::Result;

/// Opens (creating if needed) the SQLite database at `db_path` and applies migrations.
pub async fn connect(db_path: &str) -> Result<sqlx::SqlitePool> {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{db_path}?mode=rwc")).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied. The connection is
/// never recycled, otherwise the in-memory database would vanish with it.
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    pool
}
