// Record parser: turns a season sheet's raw cell grid into a `Season`.
//
// Sheet layout:
//   row 0     header, cell 1 holds "<name> (Season <n>)", one "Tournament"
//             marker cell per tournament
//   rows 1-2  metadata, ignored
//   rows 3..  ordinal, bonus points, total points, name, then one
//             (spacer, place, points) block per tournament

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{normalize_name, Placement, Player, Season};

/// Raw row-oriented cell data, as returned by the Sheets `values` endpoint.
pub type Rows = Vec<Vec<String>>;

/// Index of the header cell holding the season title.
const TITLE_CELL: usize = 1;

/// First row holding player data.
const FIRST_PLAYER_ROW: usize = 3;

/// Minimum cells for a row to carry identity plus points.
const MIN_PLAYER_CELLS: usize = 4;

/// Cells that precede the tournament blocks in a player row.
const PLAYER_PREFIX_CELLS: usize = 4;

/// Cells per tournament block: spacer, place, points.
const TOURNAMENT_BLOCK_CELLS: usize = 3;

/// Header token that marks a tournament column.
const TOURNAMENT_MARKER: &str = "tournament";

static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+) \(Season (\d+)\)$").expect("invalid season title regex"));

// ---------------------------------------------------------------------------
// Cache file envelope
// ---------------------------------------------------------------------------

/// On-disk (and on-wire) envelope of a season sheet. Other keys the Sheets
/// API returns (`range`, `majorDimension`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetValues {
    #[serde(default)]
    pub values: Rows,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("season sheet has no header row")]
    MissingHeader,

    #[error("malformed season header {cell:?}: expected \"<name> (Season <number>)\"")]
    MalformedHeader { cell: String },

    #[error("row {row}, column {column}: cannot parse {value:?} as a number")]
    InvalidNumber {
        row: usize,
        column: usize,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Season identity and tournament count read from the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonHeader {
    pub name: String,
    pub number: u32,
    pub num_tournaments: usize,
}

/// Parse the header row. The title cell must match the season pattern.
pub fn parse_header(row: &[String]) -> Result<SeasonHeader, ParseError> {
    if row.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    let cell = row.get(TITLE_CELL).map(|c| c.trim()).unwrap_or_default();
    let caps = TITLE_REGEX
        .captures(cell)
        .ok_or_else(|| ParseError::MalformedHeader {
            cell: cell.to_string(),
        })?;

    let number = caps[2]
        .parse::<u32>()
        .map_err(|_| ParseError::MalformedHeader {
            cell: cell.to_string(),
        })?;

    // The title cell is not a tournament column even if the league name
    // contains the marker.
    let num_tournaments = row
        .iter()
        .enumerate()
        .filter(|&(i, c)| i != TITLE_CELL && c.to_lowercase().contains(TOURNAMENT_MARKER))
        .count();

    Ok(SeasonHeader {
        name: caps[1].trim().to_string(),
        number,
        num_tournaments,
    })
}

// ---------------------------------------------------------------------------
// Season
// ---------------------------------------------------------------------------

/// Parse a season using the tournament count declared in its header.
pub fn parse_season(rows: &[Vec<String>]) -> Result<Season, ParseError> {
    let header = parse_header(rows.first().ok_or(ParseError::MissingHeader)?)?;
    build_season(header, rows)
}

/// Parse a season with an explicit tournament count, overriding whatever the
/// header declares.
pub fn parse_season_with_tournaments(
    rows: &[Vec<String>],
    num_tournaments: usize,
) -> Result<Season, ParseError> {
    let mut header = parse_header(rows.first().ok_or(ParseError::MissingHeader)?)?;
    header.num_tournaments = num_tournaments;
    build_season(header, rows)
}

fn build_season(header: SeasonHeader, rows: &[Vec<String>]) -> Result<Season, ParseError> {
    let mut players = Vec::new();
    for (row_idx, row) in rows.iter().enumerate().skip(FIRST_PLAYER_ROW) {
        if let Some(player) = parse_player_row(row_idx, row, &header)? {
            players.push(player);
        }
    }
    Ok(Season::new(
        header.name,
        header.number,
        header.num_tournaments,
        players,
    ))
}

/// Parse one player row. `Ok(None)` means the row is skipped: too short, or
/// the player has no season total and so did not participate.
fn parse_player_row(
    row_idx: usize,
    row: &[String],
    header: &SeasonHeader,
) -> Result<Option<Player>, ParseError> {
    if row.len() < MIN_PLAYER_CELLS {
        return Ok(None);
    }

    let total_cell = row[2].trim();
    if total_cell.is_empty() {
        return Ok(None);
    }
    let total_points = parse_points(row_idx, 2, total_cell)?;
    if total_points == 0.0 {
        return Ok(None);
    }

    let bonus_points: u32 = parse_or_zero(row_idx, 1, &row[1])?;
    let name = normalize_name(&row[3]);

    let blocks = &row[PLAYER_PREFIX_CELLS..];
    // A trailing block counts once its place cell exists; the Sheets API
    // trims blank trailing cells, so points may be missing.
    let available = (blocks.len() + 1) / TOURNAMENT_BLOCK_CELLS;
    let mut placements = Vec::new();
    for block_idx in 0..available.min(header.num_tournaments) {
        let start = block_idx * TOURNAMENT_BLOCK_CELLS;
        let column = PLAYER_PREFIX_CELLS + start;
        let place: u32 = parse_or_zero(row_idx, column + 1, &blocks[start + 1])?;
        if place == 0 {
            continue;
        }
        let points = match blocks.get(start + 2) {
            Some(cell) if !cell.trim().is_empty() => parse_points(row_idx, column + 2, cell)?,
            _ => 0.0,
        };
        placements.extend(Placement::new(block_idx + 1, place, points));
    }

    Ok(Some(Player {
        name,
        season_number: header.number,
        bonus_points,
        total_points,
        placements,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_number<T: FromStr>(row: usize, column: usize, cell: &str) -> Result<T, ParseError> {
    cell.trim().parse().map_err(|_| ParseError::InvalidNumber {
        row,
        column,
        value: cell.to_string(),
    })
}

/// Points are finite and never negative.
fn parse_points(row: usize, column: usize, cell: &str) -> Result<f64, ParseError> {
    let value: f64 = parse_number(row, column, cell)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ParseError::InvalidNumber {
            row,
            column,
            value: cell.to_string(),
        })
    }
}

/// Like `parse_number`, but a blank cell reads as zero.
fn parse_or_zero<T: FromStr + Default>(
    row: usize,
    column: usize,
    cell: &str,
) -> Result<T, ParseError> {
    if cell.trim().is_empty() {
        Ok(T::default())
    } else {
        parse_number(row, column, cell)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
