//! Database row types matching `migrations/0001_init.sql`.
//! Used by sqlx for typed queries.

use crate::types::{MatchupResult, Notification};

#[derive(Debug, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

impl From<NotificationRow> for Notification {
    fn from(r: NotificationRow) -> Self {
        Notification {
            id: r.id,
            user_id: r.user_id,
            kind: r.kind,
            message: r.message,
            read: r.read,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct MatchupRow {
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_score: f64,
    pub away_score: f64,
}

impl From<MatchupRow> for MatchupResult {
    fn from(r: MatchupRow) -> Self {
        MatchupResult {
            home_team_id: r.home_team_id,
            away_team_id: r.away_team_id,
            home_score: r.home_score,
            away_score: r.away_score,
        }
    }
}
