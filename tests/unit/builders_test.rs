//! Tests for builder modules

use std::sync::Arc;

use seat_scheduler::builders::{
    assemble, build_mirror_backend, build_primary, build_service, startup_snapshot, StoreParts, AUDIT_RETENTION,
};
use seat_scheduler::config::{builtin_assignment, MirrorBackendConfig, MirrorConfig, OfficeConfig, PrimaryConfig};
use seat_scheduler::core::{Collection, Directory, MirrorStore, PrimaryStore, WorkDay};
use seat_scheduler::infra::{InMemoryMirror, InMemoryNotifier, InMemoryPrimary, LogNotifier, MemoryCache};
use seat_scheduler::runtime::TokioSpawner;

fn temp_data_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("seat-scheduler-{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn test_build_service_defaults() {
    let data_dir = temp_data_dir();
    let cfg = OfficeConfig {
        data_dir: data_dir.clone(),
        admin_ids: vec![1],
        ..OfficeConfig::default()
    };
    let spawner = TokioSpawner::current().unwrap();

    let system = build_service(&cfg, Arc::new(LogNotifier), &spawner).await.unwrap();
    assert!(data_dir.is_dir());
    assert_eq!(system.service.max_seats(), 8);
    assert_eq!(system.service.default_assignment(), builtin_assignment());
    assert!(system.service.directory().is_admin(1));
    assert!(system.audit.events().len() <= AUDIT_RETENTION);

    system.shutdown();
    assert!(system.flusher.is_stopped());
    assert!(system.weekly.as_ref().is_some_and(|weekly| weekly.is_stopped()));
    let _ = std::fs::remove_dir_all(&data_dir);
}

#[tokio::test]
async fn test_assemble_rejects_invalid_config() {
    let cfg = OfficeConfig {
        max_seats: 0,
        ..OfficeConfig::default()
    };
    let parts = StoreParts {
        primary: Arc::new(InMemoryPrimary::new()),
        mirror: Arc::new(InMemoryMirror::new()),
        cache: Arc::new(MemoryCache::new()),
    };
    let spawner = TokioSpawner::current().unwrap();
    let err = assemble(&cfg, parts, Arc::new(InMemoryNotifier::new()), &spawner)
        .await
        .err()
        .unwrap();
    assert!(err.to_string().starts_with("config invalid"));
}

#[tokio::test]
async fn test_assemble_prefers_stored_default() {
    let primary = Arc::new(InMemoryPrimary::new());
    let stored = builtin_assignment().with_day(WorkDay::Friday, &["Gleb"]);
    primary.save_default(&stored).await.unwrap();
    let parts = StoreParts {
        primary,
        mirror: Arc::new(InMemoryMirror::new()),
        cache: Arc::new(MemoryCache::new()),
    };
    let spawner = TokioSpawner::current().unwrap();
    let system = assemble(&OfficeConfig::default(), parts, Arc::new(InMemoryNotifier::new()), &spawner)
        .await
        .unwrap();
    assert_eq!(system.service.default_assignment(), stored);
    system.shutdown();
}

#[tokio::test]
async fn test_build_backends() {
    build_primary(&PrimaryConfig::default()).await.unwrap();

    let disabled = build_mirror_backend(&MirrorConfig::default()).unwrap();
    assert!(disabled.is_reachable().await);
    assert!(disabled.read_rows(Collection::Admins).await.unwrap().is_empty());

    let sheets = MirrorConfig {
        backend: MirrorBackendConfig::Sheets,
        spreadsheet_id: Some("sheet-1".into()),
        access_token: Some("token".into()),
        ..MirrorConfig::default()
    };
    assert!(build_mirror_backend(&sheets).is_ok());
}

#[test]
fn test_startup_snapshot_reads_primary_without_runtime() {
    let snapshot = startup_snapshot(&PrimaryConfig::default()).unwrap();
    assert!(snapshot.default.is_none());
    assert!(snapshot.employees.is_empty());
    assert!(snapshot.admins.is_empty());
}

#[tokio::test]
async fn test_startup_snapshot_refuses_async_context() {
    let err = startup_snapshot(&PrimaryConfig::default()).unwrap_err();
    assert!(format!("{err:#}").contains("inside an async runtime"));
}
