// Player lookup: name search and per-player profile facts.

use std::sync::Arc;

use crate::season::{Placement, Player, Season};
use crate::store::{SeasonStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no player named {name:?} in season {season}")]
    PlayerNotFound { name: String, season: String },

    #[error("{name} has no recorded placements")]
    EmptyPlacements { name: String },
}

/// Every player name in source row order.
pub fn get_all_names(store: &SeasonStore, season_id: &str) -> Result<Vec<String>, StoreError> {
    let season = store.get_season(season_id)?;
    Ok(season.players().iter().map(|p| p.name.clone()).collect())
}

/// Names containing `fragment` (case-sensitive), in source row order.
pub fn get_names(
    store: &SeasonStore,
    fragment: &str,
    season_id: &str,
) -> Result<Vec<String>, StoreError> {
    let season = store.get_season(season_id)?;
    Ok(season
        .players()
        .iter()
        .filter(|p| p.name.contains(fragment))
        .map(|p| p.name.clone())
        .collect())
}

/// The player's record.
pub fn get_player(store: &SeasonStore, name: &str, season_id: &str) -> Result<Player, LookupError> {
    with_player(store, name, season_id, |p| p.clone())
}

/// The player's lowest finish. Ties go to the earlier tournament.
pub fn get_best_placement(
    store: &SeasonStore,
    name: &str,
    season_id: &str,
) -> Result<Placement, LookupError> {
    with_player(store, name, season_id, |p| p.best_placement().cloned())?.ok_or_else(|| {
        LookupError::EmptyPlacements {
            name: name.to_string(),
        }
    })
}

/// Number of the player's final-table finishes.
pub fn get_final_tables(
    store: &SeasonStore,
    name: &str,
    season_id: &str,
) -> Result<usize, LookupError> {
    with_player(store, name, season_id, Player::final_tables)
}

/// Number of tournaments the player placed in.
pub fn tournaments_no(store: &SeasonStore, name: &str, season_id: &str) -> Result<usize, LookupError> {
    with_player(store, name, season_id, |p| p.placements.len())
}

/// The player's placements in tournament order.
pub fn get_results(
    store: &SeasonStore,
    name: &str,
    season_id: &str,
) -> Result<Vec<Placement>, LookupError> {
    with_player(store, name, season_id, |p| p.placements.clone())
}

fn with_player<T>(
    store: &SeasonStore,
    name: &str,
    season_id: &str,
    f: impl FnOnce(&Player) -> T,
) -> Result<T, LookupError> {
    let season: Arc<Season> = store.get_season(season_id)?;
    let player = season
        .player(name)
        .ok_or_else(|| LookupError::PlayerNotFound {
            name: name.to_string(),
            season: season_id.to_string(),
        })?;
    Ok(f(player))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_player(name: &str, places: &[(usize, u32)]) -> Player {
        Player {
            name: name.into(),
            season_number: 5,
            bonus_points: 1,
            total_points: 20.0,
            placements: places
                .iter()
                .map(|&(n, place)| Placement::new(n, place, 2.5).unwrap())
                .collect(),
        }
    }

    fn store() -> SeasonStore {
        let season = Season::new(
            "Fall 2018".into(),
            5,
            4,
            vec![
                make_player("John Doe", &[(1, 12), (2, 3), (4, 3)]),
                make_player("Jane Smith", &[(3, 1)]),
                make_player("Johnny Cash", &[]),
            ],
        );
        SeasonStore::from_seasons("unused", vec![("2018F".to_string(), season)])
    }

    #[test]
    fn all_names_in_row_order() {
        assert_eq!(
            get_all_names(&store(), "2018F").unwrap(),
            vec!["John Doe", "Jane Smith", "Johnny Cash"]
        );
    }

    #[test]
    fn name_search_is_case_sensitive_substring() {
        let s = store();
        assert_eq!(get_names(&s, "John", "2018F").unwrap(), vec!["John Doe", "Johnny Cash"]);
        assert!(get_names(&s, "john", "2018F").unwrap().is_empty());
        assert_eq!(get_names(&s, "Smi", "2018F").unwrap(), vec!["Jane Smith"]);
    }

    #[test]
    fn best_placement_is_lowest_place() {
        let best = get_best_placement(&store(), "John Doe", "2018F").unwrap();
        assert_eq!(best.place(), 3);
        assert_eq!(best.tournament, "Tournament 2");
    }

    #[test]
    fn best_placement_without_placements_is_typed_error() {
        match get_best_placement(&store(), "Johnny Cash", "2018F").unwrap_err() {
            LookupError::EmptyPlacements { name } => assert_eq!(name, "Johnny Cash"),
            other => panic!("expected EmptyPlacements, got: {other}"),
        }
    }

    #[test]
    fn profile_counts() {
        let s = store();
        assert_eq!(get_final_tables(&s, "John Doe", "2018F").unwrap(), 2);
        assert_eq!(tournaments_no(&s, "John Doe", "2018F").unwrap(), 3);
        assert_eq!(tournaments_no(&s, "Johnny Cash", "2018F").unwrap(), 0);
        let results = get_results(&s, "John Doe", "2018F").unwrap();
        let numbers: Vec<usize> = results.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 4]);
        assert_eq!(get_player(&s, "Jane Smith", "2018F").unwrap().bonus_points, 1);
    }

    #[test]
    fn unknown_player_and_season() {
        let s = store();
        assert!(matches!(
            get_final_tables(&s, "Nobody", "2018F"),
            Err(LookupError::PlayerNotFound { .. })
        ));
        assert!(matches!(
            tournaments_no(&s, "John Doe", "1999X"),
            Err(LookupError::Store(StoreError::SeasonNotFound(_)))
        ));
        assert!(matches!(
            get_all_names(&s, "1999X"),
            Err(StoreError::SeasonNotFound(_))
        ));
    }
}
