use std::sync::Arc;

use tracing::debug;

use crate::db::NotificationStore;
use crate::error::{AppError, Result};
use crate::types::{NewNotification, Notification};

/// Unread counting and mark-read transitions over a [`NotificationStore`].
///
/// Arguments are validated before the store is touched. Mark-read operations are
/// idempotent: an unknown or already-read notification is a no-op.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(AppError::InvalidArgument(format!("{field} is required")))
    } else {
        Ok(())
    }
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn get_unread_count(&self, user_id: &str) -> Result<u64> {
        require(user_id, "userId")?;
        self.store.count_unread(user_id).await
    }

    pub async fn mark_as_read(&self, notification_id: &str) -> Result<()> {
        require(notification_id, "notificationId")?;
        // Ids are integers; anything else cannot name a stored notification.
        let Ok(id) = notification_id.trim().parse::<i64>() else {
            debug!(notification_id, "mark_as_read on non-numeric id, nothing to do");
            return Ok(());
        };
        let flipped = self.store.mark_read(id).await?;
        debug!(notification_id = id, flipped, "mark_as_read");
        Ok(())
    }

    pub async fn mark_all_as_read(&self, user_id: &str) -> Result<()> {
        require(user_id, "userId")?;
        let flipped = self.store.mark_all_read(user_id).await?;
        debug!(user_id, flipped, "mark_all_as_read");
        Ok(())
    }

    pub async fn list(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        require(user_id, "userId")?;
        if limit <= 0 {
            return Err(AppError::InvalidArgument("limit must be positive".to_string()));
        }
        self.store.list(user_id, unread_only, limit).await
    }

    pub async fn create(&self, new: NewNotification) -> Result<Notification> {
        require(&new.user_id, "userId")?;
        require(&new.kind, "type")?;
        require(&new.message, "message")?;
        self.store.insert(new).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
