use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{StandingsInput, TeamStanding};

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    wins: u32,
    losses: u32,
    ties: u32,
    points_for: f64,
    points_against: f64,
}

impl Tally {
    /// Points-for in hundredths. Scores are recorded to two decimals, so this
    /// is the precision ordering and rank sharing compare at.
    fn points_key(&self) -> i64 {
        (self.points_for * 100.0).round() as i64
    }

    fn record(&mut self, scored: f64, allowed: f64) {
        self.points_for += scored;
        self.points_against += allowed;
        match scored.total_cmp(&allowed) {
            Ordering::Greater => self.wins += 1,
            Ordering::Less => self.losses += 1,
            Ordering::Equal => self.ties += 1,
        }
    }
}

/// Aggregates completed matchups into ranked standings.
///
/// Order: wins desc, then points-for desc, then team id asc. Ranks are dense and
/// start at 1; teams with equal wins and points-for share a rank. Teams that have
/// not played appear with an empty record.
pub fn compute_standings(input: &StandingsInput) -> Vec<TeamStanding> {
    let mut tallies: HashMap<&str, Tally> = input
        .team_ids
        .iter()
        .map(|id| (id.as_str(), Tally::default()))
        .collect();

    for m in &input.matchups {
        tallies
            .entry(m.home_team_id.as_str())
            .or_default()
            .record(m.home_score, m.away_score);
        tallies
            .entry(m.away_team_id.as_str())
            .or_default()
            .record(m.away_score, m.home_score);
    }

    let mut rows: Vec<(&str, Tally)> = tallies.into_iter().collect();
    rows.sort_by(|(a_id, a), (b_id, b)| {
        b.wins
            .cmp(&a.wins)
            .then_with(|| b.points_key().cmp(&a.points_key()))
            .then_with(|| a_id.cmp(b_id))
    });

    let mut standings = Vec::with_capacity(rows.len());
    let mut rank = 0u32;
    let mut prev: Option<(u32, i64)> = None;
    for (team_id, t) in rows {
        let key = (t.wins, t.points_key());
        if prev != Some(key) {
            rank += 1;
            prev = Some(key);
        }
        standings.push(TeamStanding {
            team_id: team_id.to_string(),
            wins: t.wins,
            losses: t.losses,
            ties: t.ties,
            points_for: t.points_for,
            points_against: t.points_against,
            rank,
        });
    }
    standings
}
