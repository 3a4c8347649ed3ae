// Season store: the in-memory set of parsed seasons, backed by one cached
// JSON file per season, plus the lazy staleness refresh.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::RefreshState;
use crate::season::parse::{parse_season, ParseError, SheetValues};
use crate::season::Season;
use crate::sheets::{RefreshError, SheetSource};

const CACHE_EXTENSION: &str = "json";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown season: {0}")]
    SeasonNotFound(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid season JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to parse season {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
}

// ---------------------------------------------------------------------------
// Refresh outcome
// ---------------------------------------------------------------------------

/// What a call to `refresh_if_stale` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache is younger than the threshold; nothing was fetched.
    Fresh,
    /// Another refresh holds the guard.
    InProgress,
    /// The sheet listing or the current season's sheet could not be
    /// fetched. Cached data is still served and the state is not advanced.
    Failed,
    Refreshed {
        current_season: String,
        updated: Vec<String>,
        failed: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// SeasonStore
// ---------------------------------------------------------------------------

type SeasonMap = BTreeMap<String, Arc<Season>>;

/// Owns every parsed season, keyed by cache file stem (the sheet title).
pub struct SeasonStore {
    data_dir: PathBuf,
    seasons: RwLock<SeasonMap>,
    refresh_guard: tokio::sync::Mutex<()>,
}

impl SeasonStore {
    /// Load every cached season under `data_dir`. Files that fail to load are
    /// logged and left out. A missing directory gives an empty store.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let seasons = load_all(&data_dir);
        info!(
            "Loaded {} season(s) from {}",
            seasons.len(),
            data_dir.display()
        );
        Self {
            data_dir,
            seasons: RwLock::new(seasons),
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Build a store from already-parsed seasons (no cache directory reads).
    pub fn from_seasons(
        data_dir: impl Into<PathBuf>,
        seasons: impl IntoIterator<Item = (String, Season)>,
    ) -> Self {
        let seasons = seasons
            .into_iter()
            .map(|(id, season)| (id, Arc::new(season)))
            .collect();
        Self {
            data_dir: data_dir.into(),
            seasons: RwLock::new(seasons),
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn get_season(&self, id: &str) -> Result<Arc<Season>, StoreError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SeasonNotFound(id.to_string()))
    }

    /// Known season identifiers, sorted.
    pub fn season_ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Re-parse every cache file and swap the whole season map.
    pub fn reload(&self) {
        let seasons = load_all(&self.data_dir);
        info!("Reloaded {} season(s)", seasons.len());
        *self.seasons.write().expect("season map lock poisoned") = seasons;
    }

    /// Path of the cache file for season `id`.
    pub fn cache_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{id}.{CACHE_EXTENSION}"))
    }

    /// Write raw sheet values to the cache file for `id`. Does not reload.
    pub fn write_sheet(&self, id: &str, sheet: &SheetValues) -> Result<PathBuf, StoreError> {
        let path = self.cache_path(id);
        let json = serde_json::to_string_pretty(sheet).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("wrote {}", path.display());
        Ok(path)
    }

    /// Write a parsed season to the cache in sheet layout. Does not reload.
    pub fn write_season(&self, id: &str, season: &Season) -> Result<PathBuf, StoreError> {
        self.write_sheet(
            id,
            &SheetValues {
                values: season.to_rows(),
            },
        )
    }

    /// Refresh the cache from `source` when `state` is at least `threshold`
    /// old. The first remote sheet is the current season; it is always
    /// re-fetched, other seasons only when they have no cache file yet.
    ///
    /// Fetch, parse and write failures are logged, never returned: a sheet
    /// that fails keeps its previous cache file. `state` advances only when
    /// the current season was refreshed.
    pub async fn refresh_if_stale(
        &self,
        source: &dyn SheetSource,
        state: &mut RefreshState,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        if !state.is_stale(now, threshold) {
            debug!("season cache is fresh, skipping refresh");
            return RefreshOutcome::Fresh;
        }

        let Ok(_guard) = self.refresh_guard.try_lock() else {
            info!("refresh already in progress");
            return RefreshOutcome::InProgress;
        };

        let names = match source.sheet_names().await {
            Ok(names) if names.is_empty() => {
                warn!("refresh failed: {}", RefreshError::NoSheets);
                return RefreshOutcome::Failed;
            }
            Ok(names) => names,
            Err(e) => {
                warn!("refresh failed, serving cached seasons: {e}");
                return RefreshOutcome::Failed;
            }
        };
        let current_season = names[0].clone();
        info!(
            "Refreshing season cache ({} sheets, current = {})",
            names.len(),
            current_season
        );

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for name in &names {
            if *name != current_season && self.cache_path(name).exists() {
                continue;
            }
            match self.fetch_and_write(source, name).await {
                Ok(()) => updated.push(name.clone()),
                Err(e) => {
                    warn!("failed to refresh sheet '{}': {e}", name);
                    failed.push(name.clone());
                }
            }
        }

        self.reload();

        if !updated.contains(&current_season) {
            warn!(
                "current season '{}' was not refreshed, will retry next run",
                current_season
            );
            return RefreshOutcome::Failed;
        }

        state.last_refresh = Some(now);
        state.current_season = Some(current_season.clone());

        RefreshOutcome::Refreshed {
            current_season,
            updated,
            failed,
        }
    }

    /// Fetch one sheet and replace its cache file. A sheet that does not
    /// parse leaves the existing file alone.
    async fn fetch_and_write(&self, source: &dyn SheetSource, name: &str) -> Result<(), RefreshError> {
        let sheet = source.sheet(name).await?;
        parse_season(&sheet.values).map_err(|source| RefreshError::Parse {
            title: name.to_string(),
            source,
        })?;
        self.write_sheet(name, &sheet).map_err(|e| match e {
            StoreError::Io { path, source } => RefreshError::Io {
                path: path.display().to_string(),
                source,
            },
            other => RefreshError::Io {
                path: self.cache_path(name).display().to_string(),
                source: std::io::Error::other(other.to_string()),
            },
        })?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SeasonMap> {
        self.seasons.read().expect("season map lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Cache file loading
// ---------------------------------------------------------------------------

/// Load and parse one cached season file.
pub fn load_season_file(path: &Path) -> Result<Season, StoreError> {
    let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sheet: SheetValues = serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    parse_season(&sheet.values).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_all(data_dir: &Path) -> SeasonMap {
    let mut seasons = SeasonMap::new();

    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read season directory {}: {e}", data_dir.display());
            return seasons;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == CACHE_EXTENSION))
        .collect();
    paths.sort();

    for path in paths {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        match load_season_file(&path) {
            Ok(season) => {
                debug!(
                    "loaded season '{}' ({} players) from {}",
                    id,
                    season.players().len(),
                    path.display()
                );
                seasons.insert(id, Arc::new(season));
            }
            Err(e) => warn!("skipping season file: {e}"),
        }
    }

    seasons
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    fn sheet(title: &str, players: &[&[&str]]) -> SheetValues {
        let mut values: Vec<Vec<String>> = vec![
            vec!["".into(), title.into(), "".into(), "".into(), "Tournament 1".into()],
            vec![],
            vec![],
        ];
        values.extend(
            players
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect::<Vec<String>>()),
        );
        SheetValues { values }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// In-memory sheet source that records which sheets were fetched.
    struct FakeSheets {
        names: Result<Vec<String>, ()>,
        sheets: HashMap<String, SheetValues>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeSheets {
        fn new(sheets: &[(&str, SheetValues)]) -> Self {
            Self {
                names: Ok(sheets.iter().map(|(n, _)| n.to_string()).collect()),
                sheets: sheets
                    .iter()
                    .map(|(n, s)| (n.to_string(), s.clone()))
                    .collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SheetSource for FakeSheets {
        async fn sheet_names(&self) -> Result<Vec<String>, RefreshError> {
            self.names.clone().map_err(|_| RefreshError::NoSheets)
        }

        async fn sheet(&self, title: &str) -> Result<SheetValues, RefreshError> {
            self.fetched.lock().unwrap().push(title.to_string());
            self.sheets.get(title).cloned().ok_or(RefreshError::Disabled)
        }
    }

    fn stale_state() -> RefreshState {
        RefreshState {
            last_refresh: Some(Utc.with_ymd_and_hms(2018, 9, 1, 0, 0, 0).unwrap()),
            current_season: Some("2018S".into()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 10, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn open_skips_broken_files() {
        let dir = scratch("feltboard_store_broken");
        let store = SeasonStore::from_seasons(&dir, Vec::new());
        store
            .write_sheet("2018F", &sheet("Fall 2018 (Season 5)", &[&["1", "0", "10", "Doe, John"]]))
            .unwrap();
        store
            .write_sheet("bad-header", &sheet("Fall 2018", &[]))
            .unwrap();
        fs::write(dir.join("garbage.json"), "{ not json").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = SeasonStore::open(&dir);
        assert_eq!(store.season_ids(), vec!["2018F"]);
        assert_eq!(store.get_season("2018F").unwrap().players()[0].name, "John Doe");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_empty_store() {
        let store = SeasonStore::open(std::env::temp_dir().join("feltboard_store_nowhere"));
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_season_is_not_found() {
        let store = SeasonStore::from_seasons("unused", Vec::new());
        match store.get_season("1999X").unwrap_err() {
            StoreError::SeasonNotFound(id) => assert_eq!(id, "1999X"),
            other => panic!("expected SeasonNotFound, got: {other}"),
        }
    }

    #[tokio::test]
    async fn fresh_cache_is_not_refreshed() {
        let store = SeasonStore::from_seasons("unused", Vec::new());
        let source = FakeSheets::new(&[]);
        let mut state = stale_state();
        state.last_refresh = Some(now() - Duration::days(3));
        let before = state.clone();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(outcome, RefreshOutcome::Fresh);
        assert_eq!(state, before);
        assert!(source.fetched().is_empty());
    }

    #[tokio::test]
    async fn stale_refresh_fetches_current_and_missing_only() {
        let dir = scratch("feltboard_store_refresh");
        let store = SeasonStore::open(&dir);
        // 2018S is cached already, 2018F is current, 2017F is missing.
        store
            .write_sheet("2018S", &sheet("Spring 2018 (Season 4)", &[&["1", "0", "3", "Old, Cached"]]))
            .unwrap();
        store
            .write_sheet("2018F", &sheet("Fall 2018 (Season 5)", &[&["1", "0", "3", "Stale, Data"]]))
            .unwrap();

        let source = FakeSheets::new(&[
            ("2018F", sheet("Fall 2018 (Season 5)", &[&["1", "0", "9", "Doe, John", "", "1", "9"]])),
            ("2018S", sheet("Spring 2018 (Season 4)", &[&["1", "0", "3", "Remote, Newer"]])),
            ("2017F", sheet("Fall 2017 (Season 3)", &[&["1", "0", "4", "Smith, Jane"]])),
        ]);
        let mut state = stale_state();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                current_season: "2018F".into(),
                updated: vec!["2018F".into(), "2017F".into()],
                failed: vec![],
            }
        );
        assert_eq!(source.fetched(), vec!["2018F", "2017F"]);
        assert_eq!(state.last_refresh, Some(now()));
        assert_eq!(state.current_season.as_deref(), Some("2018F"));

        assert_eq!(store.season_ids(), vec!["2017F", "2018F", "2018S"]);
        assert_eq!(store.get_season("2018F").unwrap().players()[0].name, "John Doe");
        assert_eq!(store.get_season("2018S").unwrap().players()[0].name, "Cached Old");

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn listing_failure_keeps_cache_and_state() {
        let dir = scratch("feltboard_store_listing_fail");
        let store = SeasonStore::open(&dir);
        store
            .write_sheet("2018F", &sheet("Fall 2018 (Season 5)", &[&["1", "0", "3", "Doe, John"]]))
            .unwrap();
        store.reload();

        let mut source = FakeSheets::new(&[]);
        source.names = Err(());
        let mut state = stale_state();
        let before = state.clone();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert_eq!(state, before);
        assert_eq!(store.season_ids(), vec!["2018F"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn single_sheet_failure_is_reported_not_fatal() {
        let dir = scratch("feltboard_store_sheet_fail");
        let store = SeasonStore::open(&dir);

        let mut source = FakeSheets::new(&[(
            "2018F",
            sheet("Fall 2018 (Season 5)", &[&["1", "0", "3", "Doe, John"]]),
        )]);
        source.names = Ok(vec!["2018F".into(), "2018S".into()]);
        let mut state = RefreshState::default();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                current_season: "2018F".into(),
                updated: vec!["2018F".into()],
                failed: vec!["2018S".into()],
            }
        );
        assert_eq!(store.season_ids(), vec!["2018F"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unparseable_current_sheet_keeps_cached_season() {
        let dir = scratch("feltboard_store_unparseable");
        let store = SeasonStore::open(&dir);
        store
            .write_sheet("2018F", &sheet("Fall 2018 (Season 5)", &[&["1", "0", "3", "Doe, John"]]))
            .unwrap();
        store.reload();

        let source = FakeSheets::new(&[("2018F", SheetValues::default())]);
        let mut state = stale_state();
        let before = state.clone();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert_eq!(state, before);
        assert_eq!(store.season_ids(), vec!["2018F"]);
        assert_eq!(store.get_season("2018F").unwrap().players()[0].name, "John Doe");

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn malformed_title_in_missing_sheet_is_reported() {
        let dir = scratch("feltboard_store_bad_title");
        let store = SeasonStore::open(&dir);

        let source = FakeSheets::new(&[
            ("2018F", sheet("Fall 2018 (Season 5)", &[&["1", "0", "3", "Doe, John"]])),
            ("2018S", sheet("Spring 2018", &[])),
        ]);
        let mut state = RefreshState::default();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                current_season: "2018F".into(),
                updated: vec!["2018F".into()],
                failed: vec!["2018S".into()],
            }
        );
        assert!(!store.cache_path("2018S").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn current_season_fetch_failure_does_not_advance_state() {
        let dir = scratch("feltboard_store_current_fail");
        let store = SeasonStore::open(&dir);
        store
            .write_sheet("2018F", &sheet("Fall 2018 (Season 5)", &[&["1", "0", "3", "Doe, John"]]))
            .unwrap();
        store.reload();

        // 2018F is listed but the fetch errors; 2017F is new and succeeds.
        let mut source = FakeSheets::new(&[(
            "2017F",
            sheet("Fall 2017 (Season 3)", &[&["1", "0", "4", "Smith, Jane"]]),
        )]);
        source.names = Ok(vec!["2018F".into(), "2017F".into()]);
        let mut state = stale_state();
        let before = state.clone();

        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert_eq!(state, before);
        assert!(state.is_stale(now() + Duration::days(1), Duration::days(7)));
        assert_eq!(store.season_ids(), vec!["2017F", "2018F"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn concurrent_refresh_reports_in_progress() {
        let store = SeasonStore::from_seasons("unused", Vec::new());
        let source = FakeSheets::new(&[]);
        let mut state = RefreshState::default();

        let _held = store.refresh_guard.lock().await;
        let outcome = store
            .refresh_if_stale(&source, &mut state, Duration::days(7), now())
            .await;
        assert_eq!(outcome, RefreshOutcome::InProgress);
        assert!(source.fetched().is_empty());
        assert!(state.last_refresh.is_none());
    }
}
