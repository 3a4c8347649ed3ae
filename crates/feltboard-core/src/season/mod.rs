// Season data model: seasons, players, and their tournament placements.

pub mod parse;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use tracing::warn;

/// Highest finishing position that still counts as a final table.
pub const FINAL_TABLE_MAX_PLACE: u32 = 9;

/// Highest finishing position that counts as a top-3 finish.
pub const TOP_THREE_MAX_PLACE: u32 = 3;

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// A single player's result in one tournament of a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Display label, e.g. "Tournament 3".
    pub tournament: String,
    /// 1-based tournament number within the season.
    pub number: usize,
    /// Finish position. Zero ("did not place") is unrepresentable.
    pub place: NonZeroU32,
    /// Points earned in the tournament.
    pub points: f64,
}

impl Placement {
    /// Build a placement for tournament `number`. Returns `None` for
    /// `place == 0`, which means the player did not place.
    pub fn new(number: usize, place: u32, points: f64) -> Option<Self> {
        let place = NonZeroU32::new(place)?;
        Some(Self {
            tournament: tournament_label(number),
            number,
            place,
            points,
        })
    }

    /// Finish position as a plain integer.
    pub fn place(&self) -> u32 {
        self.place.get()
    }

    pub fn is_final_table(&self) -> bool {
        self.place() <= FINAL_TABLE_MAX_PLACE
    }

    pub fn is_top_three(&self) -> bool {
        self.place() <= TOP_THREE_MAX_PLACE
    }
}

/// Label used for the `number`th tournament of a season.
pub fn tournament_label(number: usize) -> String {
    format!("Tournament {number}")
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One player's standing within a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub season_number: u32,
    pub bonus_points: u32,
    pub total_points: f64,
    /// Placements in tournament order.
    pub placements: Vec<Placement>,
}

impl Player {
    pub fn final_tables(&self) -> usize {
        self.placements.iter().filter(|p| p.is_final_table()).count()
    }

    pub fn top_threes(&self) -> usize {
        self.placements.iter().filter(|p| p.is_top_three()).count()
    }

    /// Placement for the given 1-based tournament number, if any.
    pub fn placement_for(&self, number: usize) -> Option<&Placement> {
        self.placements.iter().find(|p| p.number == number)
    }

    /// Lowest finishing position. Ties go to the earlier tournament.
    pub fn best_placement(&self) -> Option<&Placement> {
        self.placements
            .iter()
            .reduce(|best, p| if p.place < best.place { p } else { best })
    }
}

/// Normalize a sheet name cell. "Last, First" becomes "First Last"; anything
/// else is only trimmed.
pub fn normalize_name(raw: &str) -> String {
    match raw.split_once(',') {
        Some((last, first)) => {
            let (last, first) = (last.trim(), first.trim());
            if first.is_empty() {
                last.to_string()
            } else {
                format!("{first} {last}")
            }
        }
        None => raw.trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Season
// ---------------------------------------------------------------------------

/// A parsed season. Immutable once built; the store replaces it wholesale on
/// refresh.
#[derive(Debug, Clone)]
pub struct Season {
    name: String,
    number: u32,
    num_tournaments: usize,
    players: Vec<Player>,
    by_name: HashMap<String, usize>,
}

impl Season {
    pub fn new(name: String, number: u32, num_tournaments: usize, players: Vec<Player>) -> Self {
        let mut by_name = HashMap::with_capacity(players.len());
        for (idx, player) in players.iter().enumerate() {
            if by_name.contains_key(&player.name) {
                warn!(
                    "duplicate player '{}' in season {}, keeping first row",
                    player.name, number
                );
                continue;
            }
            by_name.insert(player.name.clone(), idx);
        }
        Self {
            name,
            number,
            num_tournaments,
            players,
            by_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Number of tournaments the season header declares.
    pub fn num_tournaments(&self) -> usize {
        self.num_tournaments
    }

    /// Players in source row order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Exact-match lookup by normalized name.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.by_name.get(name).map(|&idx| &self.players[idx])
    }

    /// Header cell text, e.g. "Fall 2018 (Season 5)".
    pub fn title(&self) -> String {
        format!("{} (Season {})", self.name, self.number)
    }

    /// Render the season back into the cell layout the parser reads: a
    /// header row with the title and one marker per tournament, two blank
    /// metadata rows, then one row per player.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut header = vec![String::new(), self.title(), String::new(), String::new()];
        for number in 1..=self.num_tournaments {
            header.push(tournament_label(number));
            header.push(String::new());
            header.push(String::new());
        }

        let mut rows = vec![header, Vec::new(), Vec::new()];
        for (idx, player) in self.players.iter().enumerate() {
            let mut row = vec![
                (idx + 1).to_string(),
                player.bonus_points.to_string(),
                player.total_points.to_string(),
                player.name.clone(),
            ];
            for number in 1..=self.num_tournaments {
                row.push(String::new());
                match player.placement_for(number) {
                    Some(p) => {
                        row.push(p.place().to_string());
                        row.push(p.points.to_string());
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                    }
                }
            }
            rows.push(row);
        }
        rows
    }
}

impl PartialEq for Season {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.number == other.number
            && self.num_tournaments == other.num_tournaments
            && self.players == other.players
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
