// Google Sheets v4 fetch client.
//
// Lists the spreadsheet's sheet titles and fetches a sheet's cell values in
// the same `{"values": [[...]]}` envelope the cache files use.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::season::parse::{ParseError, SheetValues};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sheets whose title contains this are scratch tabs, not seasons.
const SCRATCH_SHEET_MARKER: &str = "test";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("remote sheets are not configured (no API key)")]
    Disabled,

    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode { url: String, source: reqwest::Error },

    #[error("spreadsheet has no season sheets")]
    NoSheets,

    #[error("invalid spreadsheet URL for {spreadsheet_id:?}")]
    InvalidUrl { spreadsheet_id: String },

    #[error("sheet '{title}' is not a valid season: {source}")]
    Parse { title: String, source: ParseError },

    #[error("failed to write cache file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// SheetSource
// ---------------------------------------------------------------------------

/// Where season sheets come from. The store only talks to this seam, so
/// tests can serve sheets from memory.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Season sheet titles, most recent first.
    async fn sheet_names(&self) -> Result<Vec<String>, RefreshError>;

    /// Cell values of one sheet.
    async fn sheet(&self, title: &str) -> Result<SheetValues, RefreshError>;
}

// ---------------------------------------------------------------------------
// Raw API response shapes (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Drop scratch tabs, keeping the spreadsheet's tab order.
fn season_titles(resp: SpreadsheetResponse) -> Vec<String> {
    resp.sheets
        .into_iter()
        .map(|s| s.properties.title)
        .filter(|t| !t.contains(SCRATCH_SHEET_MARKER))
        .collect()
}

// ---------------------------------------------------------------------------
// SheetsClient
// ---------------------------------------------------------------------------

/// HTTP client for one spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    api_key: String,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            spreadsheet_id,
            api_key,
        }
    }

    /// API URL for this spreadsheet with `segments` appended. Each segment is
    /// percent-encoded, so a sheet title can hold `/`, `#` or `?`.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, RefreshError> {
        let invalid = || RefreshError::InvalidUrl {
            spreadsheet_id: self.spreadsheet_id.clone(),
        };
        let mut url = reqwest::Url::parse(SHEETS_API_URL).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
    ) -> Result<T, RefreshError> {
        debug!(%url, "fetching");
        let resp = self
            .http
            .get(url.clone())
            .query(&[("key", &self.api_key)])
            .send()
            .await
            .map_err(|source| RefreshError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RefreshError::Status {
                url: url.to_string(),
                status,
            });
        }

        resp.json::<T>().await.map_err(|source| RefreshError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn sheet_names(&self) -> Result<Vec<String>, RefreshError> {
        let resp: SpreadsheetResponse = self.get_json(self.endpoint(&[])?).await?;
        Ok(season_titles(resp))
    }

    async fn sheet(&self, title: &str) -> Result<SheetValues, RefreshError> {
        self.get_json(self.endpoint(&["values", title])?).await
    }
}

// ---------------------------------------------------------------------------
// RemoteSheets wrapper
// ---------------------------------------------------------------------------

/// Either a configured Sheets client or nothing to fetch from.
pub enum RemoteSheets {
    Active(SheetsClient),
    Disabled,
}

impl RemoteSheets {
    /// `Active` when both a spreadsheet id and an API key are configured.
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.sheets_api_key {
            Some(key) if !key.is_empty() && !config.sheets.spreadsheet_id.is_empty() => {
                RemoteSheets::Active(SheetsClient::new(
                    config.sheets.spreadsheet_id.clone(),
                    key.clone(),
                ))
            }
            _ => RemoteSheets::Disabled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RemoteSheets::Active(_))
    }
}

#[async_trait]
impl SheetSource for RemoteSheets {
    async fn sheet_names(&self) -> Result<Vec<String>, RefreshError> {
        match self {
            RemoteSheets::Active(client) => client.sheet_names().await,
            RemoteSheets::Disabled => Err(RefreshError::Disabled),
        }
    }

    async fn sheet(&self, title: &str) -> Result<SheetValues, RefreshError> {
        match self {
            RemoteSheets::Active(client) => client.sheet(title).await,
            RemoteSheets::Disabled => Err(RefreshError::Disabled),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
