use async_trait::async_trait;

use crate::db::models::NotificationRow;
use crate::error::{AppError, Result};
use crate::types::{now_ms, NewNotification, Notification};

/// Data accessor for notification records.
///
/// Every mutation is an update-by-predicate so concurrent `mark_read` and
/// `mark_all_read` calls for the same user can never lose an update.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn count_unread(&self, user_id: &str) -> Result<u64>;

    /// Returns the number of rows that flipped from unread to read (0 or 1).
    async fn mark_read(&self, notification_id: i64) -> Result<u64>;

    /// Returns the number of rows that flipped from unread to read.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64>;

    async fn list(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>>;

    async fn insert(&self, new: NewNotification) -> Result<Notification>;
}

pub struct SqliteNotificationStore {
    pool: sqlx::SqlitePool,
}

impl SqliteNotificationStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    async fn count_unread(&self, user_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::StoreUnavailable)?;

        Ok(count.max(0) as u64)
    }

    async fn mark_read(&self, notification_id: i64) -> Result<u64> {
        let res = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND read = 0")
            .bind(notification_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::StoreUnavailable)?;

        Ok(res.rows_affected())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let res = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::StoreUnavailable)?;

        Ok(res.rows_affected())
    }

    async fn list(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, kind, message, read, created_at
            FROM notifications
            WHERE user_id = ? AND (? = 0 OR read = 0)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::StoreUnavailable)?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let created_at = now_ms();
        let res = sqlx::query(
            "INSERT INTO notifications (user_id, kind, message, read, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&new.user_id)
        .bind(&new.kind)
        .bind(&new.message)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::StoreUnavailable)?;

        Ok(Notification {
            id: res.last_insert_rowid(),
            user_id: new.user_id,
            kind: new.kind,
            message: new.message,
            read: false,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
