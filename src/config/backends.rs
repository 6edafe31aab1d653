//! Storage backend and synchronization settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::{RateLimit, ReplayOrder};

/// Primary store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryBackendConfig {
    /// In-memory store for development/testing.
    #[default]
    InMemory,
    /// Postgres via sqlx.
    Postgres,
}

/// Mirror selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorBackendConfig {
    /// No mirror; writes succeed without effect.
    #[default]
    Disabled,
    /// In-memory sheets.
    InMemory,
    /// Google Sheets.
    Sheets,
}

/// Primary store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Backend selection.
    pub backend: PrimaryBackendConfig,
    /// Connection string, required for Postgres.
    pub database_url: Option<String>,
    /// Pool upper bound.
    pub max_connections: u32,
    /// Pool lower bound.
    pub min_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout_secs: u64,
    /// Per-statement timeout.
    pub command_timeout_secs: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            backend: PrimaryBackendConfig::InMemory,
            database_url: None,
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 10,
            command_timeout_secs: 60,
        }
    }
}

impl PrimaryConfig {
    /// Validate primary settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".into());
        }
        if self.min_connections > self.max_connections {
            return Err("min_connections must not exceed max_connections".into());
        }
        if self.connect_timeout_secs == 0 || self.command_timeout_secs == 0 {
            return Err("timeouts must be greater than 0".into());
        }
        if self.backend == PrimaryBackendConfig::Postgres
            && self.database_url.as_deref().is_none_or(str::is_empty)
        {
            return Err("database_url is required for the postgres backend".into());
        }
        Ok(())
    }
}

/// Mirror configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Backend selection.
    pub backend: MirrorBackendConfig,
    /// Spreadsheet id, required for Sheets.
    pub spreadsheet_id: Option<String>,
    /// OAuth bearer token, required for Sheets.
    pub access_token: Option<String>,
    /// Override of the Sheets endpoint.
    pub api_base: Option<String>,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            backend: MirrorBackendConfig::Disabled,
            spreadsheet_id: None,
            access_token: None,
            api_base: None,
            request_timeout_secs: 30,
        }
    }
}

impl MirrorConfig {
    /// Validate mirror settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.backend == MirrorBackendConfig::Sheets {
            if self.spreadsheet_id.as_deref().is_none_or(str::is_empty) {
                return Err("spreadsheet_id is required for the sheets backend".into());
            }
            if self.access_token.as_deref().is_none_or(str::is_empty) {
                return Err("access_token is required for the sheets backend".into());
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }
}

/// Rate limiting, buffering and flushing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Calls per window.
    pub rate_limit_max_calls: usize,
    /// Window length.
    pub rate_limit_window_secs: u64,
    /// Share of the quota open to low-priority calls.
    pub low_priority_share: f64,
    /// Operation buffer capacity.
    pub buffer_capacity: usize,
    /// Pause between flush cycles.
    pub flush_interval_secs: u64,
    /// Replay order within a priority class.
    pub replay_order: ReplayOrder,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_calls: 100,
            rate_limit_window_secs: 100,
            low_priority_share: 0.3,
            buffer_capacity: 5000,
            flush_interval_secs: 60,
            replay_order: ReplayOrder::OldestFirst,
        }
    }
}

impl SyncConfig {
    /// Validate sync settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit_max_calls == 0 {
            return Err("rate_limit_max_calls must be greater than 0".into());
        }
        if self.rate_limit_window_secs == 0 {
            return Err("rate_limit_window_secs must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.low_priority_share) {
            return Err("low_priority_share must be within 0..=1".into());
        }
        if self.buffer_capacity == 0 {
            return Err("buffer_capacity must be greater than 0".into());
        }
        if self.flush_interval_secs == 0 {
            return Err("flush_interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Limiter settings.
    pub fn rate_limit(&self) -> RateLimit {
        RateLimit {
            max_calls: self.rate_limit_max_calls,
            window: Duration::from_secs(self.rate_limit_window_secs),
            low_priority_share: self.low_priority_share,
        }
    }

    /// Flush interval.
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}
