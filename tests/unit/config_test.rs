//! Tests for configuration validation

use std::time::Duration;

use seat_scheduler::config::{
    builtin_assignment, MirrorBackendConfig, MirrorConfig, OfficeConfig, PrimaryBackendConfig,
    PrimaryConfig, SyncConfig, DEFAULT_UTC_OFFSET_MINUTES,
};
use seat_scheduler::core::{DefaultAssignment, WorkDay, DEFAULT_MAX_SEATS};
use seat_scheduler::sync::ReplayOrder;

#[test]
fn test_office_config_defaults() {
    let cfg = OfficeConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_seats, DEFAULT_MAX_SEATS);
    assert_eq!(cfg.utc_offset_minutes, DEFAULT_UTC_OFFSET_MINUTES);
    assert_eq!(cfg.primary.backend, PrimaryBackendConfig::InMemory);
    assert_eq!(cfg.mirror.backend, MirrorBackendConfig::Disabled);
    assert_eq!(cfg.fallback_assignment(), builtin_assignment());
}

#[test]
fn test_office_config_invalid_max_seats() {
    let invalid = OfficeConfig {
        max_seats: 0,
        ..OfficeConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_office_config_invalid_offset() {
    let invalid = OfficeConfig {
        utc_offset_minutes: 24 * 60,
        ..OfficeConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_office_config_checks_default_assignment() {
    let invalid = OfficeConfig {
        max_seats: 2,
        default_assignment: Some(DefaultAssignment::empty(8)),
        ..OfficeConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.starts_with("default_assignment invalid"), "{err}");

    let custom = DefaultAssignment::empty(8).with_day(WorkDay::Friday, &["Gleb"]);
    let valid = OfficeConfig {
        default_assignment: Some(custom.clone()),
        ..OfficeConfig::default()
    };
    assert!(valid.validate().is_ok());
    assert_eq!(valid.fallback_assignment(), custom);
}

#[test]
fn test_primary_config_validation() {
    assert!(PrimaryConfig::default().validate().is_ok());

    let no_url = PrimaryConfig {
        backend: PrimaryBackendConfig::Postgres,
        ..PrimaryConfig::default()
    };
    assert!(no_url.validate().is_err());

    let inverted = PrimaryConfig {
        min_connections: 20,
        ..PrimaryConfig::default()
    };
    assert!(inverted.validate().is_err());
}

#[test]
fn test_mirror_config_validation() {
    let missing_token = MirrorConfig {
        backend: MirrorBackendConfig::Sheets,
        spreadsheet_id: Some("sheet-1".into()),
        ..MirrorConfig::default()
    };
    let err = missing_token.validate().unwrap_err();
    assert!(err.contains("access_token"));

    let complete = MirrorConfig {
        access_token: Some("token".into()),
        ..missing_token
    };
    assert!(complete.validate().is_ok());
}

#[test]
fn test_sync_config_validation() {
    let cfg = SyncConfig::default();
    assert!(cfg.validate().is_ok());
    let limit = cfg.rate_limit();
    assert_eq!(limit.max_calls, 100);
    assert_eq!(limit.window, Duration::from_secs(100));
    assert_eq!(limit.low_priority_limit(), 30);
    assert_eq!(cfg.flush_interval(), Duration::from_secs(60));

    for invalid in [
        SyncConfig {
            buffer_capacity: 0,
            ..SyncConfig::default()
        },
        SyncConfig {
            low_priority_share: 1.5,
            ..SyncConfig::default()
        },
        SyncConfig {
            rate_limit_window_secs: 0,
            ..SyncConfig::default()
        },
    ] {
        assert!(invalid.validate().is_err());
    }
}

#[test]
fn test_from_json_partial() {
    let json = r#"{
        "max_seats": 6,
        "admin_ids": [1, 2],
        "sync": { "replay_order": "newest_first", "flush_interval_secs": 15 }
    }"#;
    let cfg = OfficeConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.max_seats, 6);
    assert_eq!(cfg.admin_ids, vec![1, 2]);
    assert_eq!(cfg.sync.replay_order, ReplayOrder::NewestFirst);
    assert_eq!(cfg.sync.flush_interval_secs, 15);
    assert_eq!(cfg.sync.buffer_capacity, 5000);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(OfficeConfig::from_json_str(r#"{"max_seats": 0}"#).is_err());
    let err = OfficeConfig::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));
    let err = OfficeConfig::from_json_str(r#"{"primary": {"backend": "postgres"}}"#).unwrap_err();
    assert!(err.starts_with("primary invalid"));
}

#[test]
fn test_from_vars_sheets_mirror() {
    let cfg = OfficeConfig::from_vars(|key| match key {
        "USE_GOOGLE_SHEETS" => Some("TRUE".into()),
        "GOOGLE_SHEETS_ID" => Some("sheet-1".into()),
        "GOOGLE_SHEETS_TOKEN" => Some("token".into()),
        "DATA_DIR" => Some("/var/lib/seats".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.mirror.backend, MirrorBackendConfig::Sheets);
    assert_eq!(cfg.mirror.spreadsheet_id.as_deref(), Some("sheet-1"));
    assert_eq!(cfg.data_dir, std::path::PathBuf::from("/var/lib/seats"));
}

#[test]
fn test_from_vars_rejects_bad_numbers() {
    let err = OfficeConfig::from_vars(|key| (key == "MAX_OFFICE_SEATS").then(|| "eight".into())).unwrap_err();
    assert!(err.starts_with("MAX_OFFICE_SEATS"));
    let err = OfficeConfig::from_vars(|key| (key == "ADMIN_IDS").then(|| "1,x".into())).unwrap_err();
    assert!(err.contains("ADMIN_IDS"));
}
