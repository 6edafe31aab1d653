//! Office-level configuration: capacity, timezone, administrators and the
//! seat map used when no stored one exists.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::config::backends::{MirrorBackendConfig, MirrorConfig, PrimaryBackendConfig, PrimaryConfig, SyncConfig};
use crate::core::model::{DefaultAssignment, WorkDay, DEFAULT_MAX_SEATS};
use crate::core::weekly::WeeklyTimes;
use crate::util::serde::EmployeeId;

/// Moscow time, the office's zone.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 180;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficeConfig {
    /// Seats per day.
    pub max_seats: usize,
    /// Office timezone as minutes east of UTC.
    pub utc_offset_minutes: i32,
    /// Directory of the flat-file cache.
    pub data_dir: PathBuf,
    /// Administrators granted regardless of stored data.
    pub admin_ids: Vec<EmployeeId>,
    /// Seat map used when no tier has one; the built-in map if unset.
    pub default_assignment: Option<DefaultAssignment>,
    /// Primary store.
    pub primary: PrimaryConfig,
    /// Spreadsheet mirror.
    pub mirror: MirrorConfig,
    /// Rate limiting and replay.
    pub sync: SyncConfig,
    /// Friday reminder and Sunday publication.
    pub weekly: WeeklyConfig,
}

/// Weekly reminder and publication schedule, in office-local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyConfig {
    /// Run the weekly jobs at all.
    pub enabled: bool,
    /// Friday reminder hour.
    pub reminder_hour: u32,
    /// Friday reminder minute.
    pub reminder_minute: u32,
    /// Sunday publication hour.
    pub publish_hour: u32,
    /// Sunday publication minute.
    pub publish_minute: u32,
    /// Pause between schedule checks.
    pub check_interval_secs: u64,
}

impl Default for WeeklyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_hour: 18,
            reminder_minute: 0,
            publish_hour: 20,
            publish_minute: 0,
            check_interval_secs: 60,
        }
    }
}

impl WeeklyConfig {
    /// Validate the schedule.
    pub fn validate(&self) -> Result<(), String> {
        if self.reminder_hour > 23 || self.publish_hour > 23 {
            return Err("hours must be within 0..=23".into());
        }
        if self.reminder_minute > 59 || self.publish_minute > 59 {
            return Err("minutes must be within 0..=59".into());
        }
        if self.check_interval_secs == 0 {
            return Err("check_interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Job times. Out-of-range values fall back to midnight.
    pub fn times(&self) -> WeeklyTimes {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        WeeklyTimes {
            reminder_at: at(self.reminder_hour, self.reminder_minute),
            publish_at: at(self.publish_hour, self.publish_minute),
        }
    }

    /// Check interval.
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            max_seats: DEFAULT_MAX_SEATS,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            data_dir: PathBuf::from("data"),
            admin_ids: Vec::new(),
            default_assignment: None,
            primary: PrimaryConfig::default(),
            mirror: MirrorConfig::default(),
            sync: SyncConfig::default(),
            weekly: WeeklyConfig::default(),
        }
    }
}

impl OfficeConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_seats == 0 {
            return Err("max_seats must be greater than 0".into());
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err("utc_offset_minutes must be within one day".into());
        }
        self.primary.validate().map_err(|e| format!("primary invalid: {e}"))?;
        self.mirror.validate().map_err(|e| format!("mirror invalid: {e}"))?;
        self.sync.validate().map_err(|e| format!("sync invalid: {e}"))?;
        self.weekly.validate().map_err(|e| format!("weekly invalid: {e}"))?;
        if let Some(assignment) = &self.default_assignment {
            assignment
                .validate(self.max_seats)
                .map_err(|e| format!("default_assignment invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, String> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(format!(".env error: {err}"));
            }
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup, starting from defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            cfg.primary.backend = PrimaryBackendConfig::Postgres;
            cfg.primary.database_url = Some(url);
        }
        if let Some(flag) = lookup("USE_GOOGLE_SHEETS") {
            if flag.trim().eq_ignore_ascii_case("true") {
                cfg.mirror.backend = MirrorBackendConfig::Sheets;
            }
        }
        cfg.mirror.spreadsheet_id = lookup("GOOGLE_SHEETS_ID").filter(|v| !v.trim().is_empty());
        cfg.mirror.access_token = lookup("GOOGLE_SHEETS_TOKEN").filter(|v| !v.trim().is_empty());
        if let Some(ids) = lookup("ADMIN_IDS") {
            cfg.admin_ids = parse_admin_ids(&ids)?;
        }
        if let Some(seats) = lookup("MAX_OFFICE_SEATS") {
            cfg.max_seats = seats
                .trim()
                .parse()
                .map_err(|e| format!("MAX_OFFICE_SEATS: {e}"))?;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(offset) = lookup("UTC_OFFSET_MINUTES") {
            cfg.utc_offset_minutes = offset
                .trim()
                .parse()
                .map_err(|e| format!("UTC_OFFSET_MINUTES: {e}"))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Configured seat map, or the built-in one.
    pub fn fallback_assignment(&self) -> DefaultAssignment {
        self.default_assignment.clone().unwrap_or_else(builtin_assignment)
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<EmployeeId>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e| format!("ADMIN_IDS `{s}`: {e}")))
        .collect()
}

/// Seat map shipped with the office.
pub fn builtin_assignment() -> DefaultAssignment {
    const MON_FRI: [&str; 8] = ["Dima Ch", "Timur", "Vasya", "Ilya", "Egor", "Aylar", "Vitaliy", "Dasha"];
    DefaultAssignment::empty(DEFAULT_MAX_SEATS)
        .with_day(WorkDay::Monday, &MON_FRI)
        .with_day(
            WorkDay::Tuesday,
            &["Dima Ch", "Timur", "Vasya", "Aidan", "Roma", "Dima A", "Kostya", "Lesha B"],
        )
        .with_day(
            WorkDay::Wednesday,
            &["Dima Ch", "Timur", "Kostya", "Ilya", "Roma", "Katya", "Artem", "Mark"],
        )
        .with_day(
            WorkDay::Thursday,
            &["Dima Ch", "Timur", "Vasya", "Lesha B", "Roma", "Mark", "Tolya", "Gleb"],
        )
        .with_day(WorkDay::Friday, &MON_FRI)
}
