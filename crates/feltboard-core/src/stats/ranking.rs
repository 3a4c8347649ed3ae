// Season leaderboards.
//
// Each leaderboard computes one integer metric per player, drops players
// that do not clear the metric's threshold, and sorts. Ties are broken by
// player name (ascending) so output is deterministic.

use std::cmp::Ordering;

use serde::Serialize;

use crate::season::{Player, Season};
use crate::store::{SeasonStore, StoreError};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub value: u32,
}

impl LeaderboardEntry {
    fn new(name: &str, value: u32) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// One row of the season standings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    /// 1-based position by total points.
    pub rank: usize,
    pub name: String,
    pub total_points: f64,
    pub bonus_points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortOrder {
    Descending,
    Ascending,
}

/// Build a leaderboard: metric per player, keep `value > min_exclusive`, sort.
fn leaderboard<F>(
    players: &[Player],
    min_exclusive: u32,
    order: SortOrder,
    metric: F,
) -> Vec<LeaderboardEntry>
where
    F: Fn(&Player) -> u32,
{
    let mut entries: Vec<LeaderboardEntry> = players
        .iter()
        .map(|p| LeaderboardEntry::new(&p.name, metric(p)))
        .filter(|e| e.value > min_exclusive)
        .collect();

    entries.sort_by(|a, b| {
        let by_value = match order {
            SortOrder::Descending => b.value.cmp(&a.value),
            SortOrder::Ascending => a.value.cmp(&b.value),
        };
        by_value.then_with(|| a.name.cmp(&b.name))
    });
    entries
}

// ---------------------------------------------------------------------------
// Season-level computations
// ---------------------------------------------------------------------------

/// Players with more than one final-table finish.
pub fn most_final_tables_in(season: &Season) -> Vec<LeaderboardEntry> {
    leaderboard(season.players(), 1, SortOrder::Descending, |p| {
        p.final_tables() as u32
    })
}

/// Players with at least one top-3 finish.
pub fn most_top_3_in(season: &Season) -> Vec<LeaderboardEntry> {
    leaderboard(season.players(), 0, SortOrder::Descending, |p| {
        p.top_threes() as u32
    })
}

/// Players whose longest streak of final-table placements exceeds one.
pub fn most_consecutive_finals_in(season: &Season) -> Vec<LeaderboardEntry> {
    leaderboard(season.players(), 1, SortOrder::Descending, longest_final_table_run)
}

/// Cumulative placement score, lowest first. Each tournament the player
/// missed costs that tournament's participant count (a last-place finish).
pub fn sum_of_placements_in(season: &Season) -> Vec<LeaderboardEntry> {
    let participants = tournament_participants(season);
    leaderboard(season.players(), 0, SortOrder::Ascending, |p| {
        placement_score(p, &participants)
    })
}

/// Number of players with a placement in each tournament. Index 0 is
/// tournament 1; the length is the season's tournament count.
pub fn tournament_participants(season: &Season) -> Vec<u32> {
    let mut counts = vec![0u32; season.num_tournaments()];
    for player in season.players() {
        for placement in &player.placements {
            if let Some(count) = placement
                .number
                .checked_sub(1)
                .and_then(|idx| counts.get_mut(idx))
            {
                *count += 1;
            }
        }
    }
    counts
}

/// Longest run of consecutive placements (tournament order) that are all
/// final tables. A placement outside the final table resets the run.
pub fn longest_final_table_run(player: &Player) -> u32 {
    let mut best = 0;
    let mut run = 0;
    for placement in &player.placements {
        if placement.is_final_table() {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

/// Sum of places over the season's tournaments, with absences scored as the
/// tournament's participant count.
fn placement_score(player: &Player, participants: &[u32]) -> u32 {
    participants
        .iter()
        .enumerate()
        .map(|(idx, &count)| match player.placement_for(idx + 1) {
            Some(p) => p.place(),
            None => count,
        })
        .sum()
}

/// Every player ordered by total points (descending), ranked from 1.
pub fn standings_in(season: &Season) -> Vec<Standing> {
    let mut players: Vec<&Player> = season.players().iter().collect();
    players.sort_by(|a, b| {
        b.total_points
            .partial_cmp(&a.total_points)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    players
        .into_iter()
        .enumerate()
        .map(|(idx, p)| Standing {
            rank: idx + 1,
            name: p.name.clone(),
            total_points: p.total_points,
            bonus_points: p.bonus_points,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Store-facing entry points
// ---------------------------------------------------------------------------

pub fn most_final_tables(
    store: &SeasonStore,
    season_id: &str,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    Ok(most_final_tables_in(&*store.get_season(season_id)?))
}

pub fn most_top_3(
    store: &SeasonStore,
    season_id: &str,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    Ok(most_top_3_in(&*store.get_season(season_id)?))
}

pub fn most_consecutive_finals(
    store: &SeasonStore,
    season_id: &str,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    Ok(most_consecutive_finals_in(&*store.get_season(season_id)?))
}

pub fn sum_of_placements(
    store: &SeasonStore,
    season_id: &str,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    Ok(sum_of_placements_in(&*store.get_season(season_id)?))
}

pub fn standings(store: &SeasonStore, season_id: &str) -> Result<Vec<Standing>, StoreError> {
    Ok(standings_in(&*store.get_season(season_id)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
