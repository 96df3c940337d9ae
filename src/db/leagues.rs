use async_trait::async_trait;

use crate::db::models::MatchupRow;
use crate::error::{AppError, Result};
use crate::types::{MatchupResult, StandingsInput};

/// Data accessor for league standings inputs.
#[async_trait]
pub trait LeagueData: Send + Sync {
    /// Teams and completed matchups of the league's current season.
    /// `Ok(None)` means the league does not exist.
    async fn find_standings(&self, league_id: &str) -> Result<Option<StandingsInput>>;
}

pub struct SqliteLeagueData {
    pool: sqlx::SqlitePool,
}

impl SqliteLeagueData {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> AppError {
    AppError::DataUnavailable(e.to_string())
}

#[async_trait]
impl LeagueData for SqliteLeagueData {
    async fn find_standings(&self, league_id: &str) -> Result<Option<StandingsInput>> {
        let season: Option<i64> =
            sqlx::query_scalar("SELECT current_season FROM leagues WHERE id = ?")
                .bind(league_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        let Some(season) = season else {
            return Ok(None);
        };

        let team_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM teams WHERE league_id = ? ORDER BY id")
                .bind(league_id)
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;

        let rows: Vec<MatchupRow> = sqlx::query_as(
            r#"
            SELECT home_team_id, away_team_id, home_score, away_score
            FROM matchups
            WHERE league_id = ? AND season = ? AND completed = 1
            ORDER BY week, id
            "#,
        )
        .bind(league_id)
        .bind(season)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(Some(StandingsInput {
            team_ids,
            matchups: rows.into_iter().map(MatchupResult::from).collect(),
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::test_pool;

    pub(crate) async fn seed_league(pool: &sqlx::SqlitePool, league_id: &str, season: i64, teams: &[&str]) {
        sqlx::query("INSERT INTO leagues (id, name, current_season) VALUES (?, ?, ?)")
            .bind(league_id)
            .bind(format!("League {league_id}"))
            .bind(season)
            .execute(pool)
            .await
            .unwrap();
        for team in teams {
            sqlx::query("INSERT INTO teams (id, league_id, name) VALUES (?, ?, ?)")
                .bind(*team)
                .bind(league_id)
                .bind(format!("Team {team}"))
                .execute(pool)
                .await
                .unwrap();
        }
    }

    pub(crate) async fn seed_matchup(
        pool: &sqlx::SqlitePool,
        league_id: &str,
        season: i64,
        week: i64,
        home: (&str, f64),
        away: (&str, f64),
        completed: bool,
    ) {
        sqlx::query(
            r#"
            INSERT INTO matchups (league_id, season, week, home_team_id, away_team_id, home_score, away_score, completed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(league_id)
        .bind(season)
        .bind(week)
        .bind(home.0)
        .bind(away.0)
        .bind(home.1)
        .bind(away.1)
        .bind(completed)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unknown_league_is_none() {
        let data = SqliteLeagueData::new(test_pool().await);
        assert!(data.find_standings("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn only_completed_current_season_matchups_are_returned() {
        let pool = test_pool().await;
        seed_league(&pool, "L1", 2025, &["t1", "t2", "t3"]).await;
        seed_matchup(&pool, "L1", 2025, 1, ("t1", 110.0), ("t2", 95.5), true).await;
        seed_matchup(&pool, "L1", 2025, 2, ("t2", 120.0), ("t3", 80.0), false).await;
        seed_matchup(&pool, "L1", 2024, 9, ("t1", 60.0), ("t3", 140.0), true).await;

        let data = SqliteLeagueData::new(pool);
        let input = data.find_standings("L1").await.unwrap().unwrap();
        assert_eq!(input.team_ids, vec!["t1", "t2", "t3"]);
        assert_eq!(input.matchups.len(), 1);
        assert_eq!(input.matchups[0].home_team_id, "t1");
        assert!((input.matchups[0].away_score - 95.5).abs() < 1e-9);
    }
}
