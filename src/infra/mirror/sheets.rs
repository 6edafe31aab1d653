//! Google Sheets v4 mirror over the REST values API.
//!
//! Each collection lives in a sheet of the same name. Status mapping:
//! 429 is a quota error, 5xx and transport failures mean unreachable, any
//! other non-success status is a permanent rejection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MirrorConfig;
use crate::core::{Collection, MirrorError, MirrorStore, ScheduleError};

/// Default Sheets endpoint.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long after a transport failure the mirror reports itself unreachable.
const UNREACHABLE_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ValuesBody<'a> {
    values: &'a [Vec<String>],
}

/// Spreadsheet client authenticated with a bearer token.
pub struct SheetsMirror {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: String,
    last_transport_failure: Mutex<Option<Instant>>,
}

impl SheetsMirror {
    /// Client for one spreadsheet.
    pub fn new(
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScheduleError> {
        let timeout = if timeout.is_zero() { DEFAULT_REQUEST_TIMEOUT } else { timeout };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScheduleError::MirrorUnavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            last_transport_failure: Mutex::new(None),
        })
    }

    /// Client built from the mirror section of the configuration.
    pub fn from_config(config: &MirrorConfig) -> Result<Self, ScheduleError> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| ScheduleError::MirrorUnavailable("spreadsheet id not configured".into()))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| ScheduleError::MirrorUnavailable("sheets access token not configured".into()))?;
        Self::new(
            config.api_base.clone().unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            spreadsheet_id,
            access_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.api_base.trim_end_matches('/'),
            self.spreadsheet_id,
            range,
            suffix
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, MirrorError> {
        let response = match request.bearer_auth(&self.access_token).send().await {
            Ok(response) => response,
            Err(err) => {
                *self.last_transport_failure.lock() = Some(Instant::now());
                return Err(MirrorError::Unavailable(format!("sheets request failed: {err}")));
            }
        };
        let status = response.status();
        if status.is_success() {
            *self.last_transport_failure.lock() = None;
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %body, "sheets call failed");
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(MirrorError::RateLimited),
            s if s.is_server_error() => Err(MirrorError::Unavailable(format!("sheets returned {status}"))),
            _ => Err(MirrorError::Rejected(format!("sheets returned {status}: {body}"))),
        }
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl MirrorStore for SheetsMirror {
    async fn read_rows(&self, collection: Collection) -> Result<Vec<Vec<String>>, MirrorError> {
        let url = self.values_url(collection.name(), "");
        let response = self.send(self.client.get(url)).await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| MirrorError::Rejected(format!("invalid values response: {e}")))?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write_rows(&self, collection: Collection, rows: Vec<Vec<String>>) -> Result<(), MirrorError> {
        // Clearing first drops rows beyond the new length.
        let clear = self.values_url(collection.name(), ":clear");
        self.send(self.client.post(clear).json(&serde_json::json!({}))).await?;
        if rows.is_empty() {
            return Ok(());
        }
        let update = self.values_url(&format!("{}!A1", collection.name()), "?valueInputOption=RAW");
        self.send(self.client.put(update).json(&ValuesBody { values: &rows }))
            .await
            .map(drop)
    }

    async fn append_row(&self, collection: Collection, row: Vec<String>) -> Result<(), MirrorError> {
        let url = self.values_url(
            &format!("{}!A1", collection.name()),
            ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        );
        let rows = [row];
        self.send(self.client.post(url).json(&ValuesBody { values: &rows }))
            .await
            .map(drop)
    }

    async fn is_reachable(&self) -> bool {
        match *self.last_transport_failure.lock() {
            Some(at) if at.elapsed() < UNREACHABLE_BACKOFF => {
                warn!("sheets mirror recently unreachable");
                false
            }
            _ => true,
        }
    }
}
