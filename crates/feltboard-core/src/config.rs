// Configuration loading (league.toml, credentials.toml) and the persisted
// refresh state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Everything that can go wrong between `defaults/` and a validated `Config`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("failed to write {path}: {message}")]
    WriteError { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub sheets: SheetsConfig,
    pub refresh: RefreshConfig,
    pub credentials: CredentialsConfig,
    /// Directory holding one cached JSON file per season.
    pub data_dir: PathBuf,
    /// Where the refresh state is persisted.
    pub state_path: PathBuf,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire league.toml file.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
    sheets: SheetsConfig,
    data: DataSection,
    refresh: RefreshSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    /// Spreadsheet holding one tab per season. Empty disables remote refresh.
    #[serde(default)]
    pub spreadsheet_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DataSection {
    dir: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RefreshSection {
    interval_days: i64,
    state_path: String,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval_days: i64,
}

impl RefreshConfig {
    /// The staleness threshold. Validation rejects day counts chrono cannot
    /// represent; an unvalidated out-of-range value saturates.
    pub fn interval(&self) -> Duration {
        Duration::try_days(self.interval_days).unwrap_or(Duration::MAX)
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub sheets_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Refresh state
// ---------------------------------------------------------------------------

/// When the cache was last refreshed and which season was current then.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshState {
    /// `None` means the cache has never been refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_season: Option<String>,
}

impl RefreshState {
    /// Read the state file. A missing file is a never-refreshed state.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = read_file(path)?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::WriteError {
            path: path.to_path_buf(),
            message,
        };
        let text = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        std::fs::write(path, text).map_err(|e| write_err(e.to_string()))
    }

    /// True when at least `interval` has passed since the last refresh, or
    /// when there never was one.
    pub fn is_stale(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_refresh {
            Some(last) => now - last >= interval,
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`. Data and
/// state paths are resolved against `base_dir` too.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    validate_paths(&league_file)?;

    let config = Config {
        league: league_file.league,
        sheets: league_file.sheets,
        refresh: RefreshConfig {
            interval_days: league_file.refresh.interval_days,
        },
        credentials,
        data_dir: base_dir.join(&league_file.data.dir),
        state_path: base_dir.join(&league_file.refresh.state_path),
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    // No defaults/ is fine for an installed copy that already has config/.
    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        // create_new: a user-edited config file is never overwritten.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.name".into(),
            message: "must not be empty".into(),
        });
    }

    if config.refresh.interval_days <= 0 {
        return Err(ConfigError::ValidationError {
            field: "refresh.interval_days".into(),
            message: format!("must be > 0, got {}", config.refresh.interval_days),
        });
    }
    if Duration::try_days(config.refresh.interval_days).is_none() {
        return Err(ConfigError::ValidationError {
            field: "refresh.interval_days".into(),
            message: format!("out of range, got {}", config.refresh.interval_days),
        });
    }

    Ok(())
}

/// Path settings are checked before they are resolved against the base dir,
/// where an empty value would silently become the base dir itself.
fn validate_paths(raw: &LeagueFile) -> Result<(), ConfigError> {
    let path_fields: &[(&str, &str)] = &[
        ("data.dir", raw.data.dir.as_str()),
        ("refresh.state_path", raw.refresh.state_path.as_str()),
    ];
    for (name, val) in path_fields {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
