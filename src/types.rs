use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub read: bool,
    /// Millisecond UTC epoch timestamp.
    pub created_at: i64,
}

/// Input for creating a notification from an upstream application event.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// League standings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
    pub team_id: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: f64,
    pub points_against: f64,
    pub rank: u32,
}

/// Point-in-time standings for one league. Recomputable, never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueSnapshot {
    pub league_id: String,
    pub standings: Vec<TeamStanding>,
    /// Millisecond UTC epoch of the recompute that produced these standings.
    pub computed_at: i64,
    /// True when served from an expired cache entry because recompute failed.
    pub stale: bool,
}

/// One completed head-to-head result.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupResult {
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_score: f64,
    pub away_score: f64,
}

/// Raw records handed back by the league data accessor for one season.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandingsInput {
    /// Every team in the league, including teams with no completed games yet.
    pub team_ids: Vec<String>,
    /// Completed matchups of the league's current season.
    pub matchups: Vec<MatchupResult>,
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
