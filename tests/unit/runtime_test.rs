//! Tests for the API surface and the tokio spawner

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use seat_scheduler::builders::{assemble_with_clock, SeatSystem, StoreParts};
use seat_scheduler::config::OfficeConfig;
use seat_scheduler::core::{AdmissionOutcome, EmployeeRecord, PrimaryStore, Spawn, WorkDay};
use seat_scheduler::infra::{InMemoryNotifier, InMemoryPrimary, MemoryCache, NoopMirror};
use seat_scheduler::runtime::{
    health, release_seat, request_seat, roster_view, submit_weekly_request, week_view, SeatRequest,
    TokioSpawner, WeeklyRequestSubmission,
};

fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()
}

async fn system() -> SeatSystem {
    let primary = Arc::new(InMemoryPrimary::new());
    for (id, name, username) in [(20, "Zoe", "zoe"), (21, "Mark", "mark_k")] {
        primary
            .save_employee(&EmployeeRecord {
                id,
                manual_name: name.into(),
                display_name: name.into(),
                username: Some(username.into()),
                approved: true,
            })
            .await
            .unwrap();
    }
    let parts = StoreParts {
        primary,
        mirror: Arc::new(NoopMirror),
        cache: Arc::new(MemoryCache::new()),
    };
    let clock = Arc::new(|| Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
    let spawner = TokioSpawner::current().unwrap();
    assemble_with_clock(
        &OfficeConfig::default(),
        parts,
        Arc::new(InMemoryNotifier::new()),
        &spawner,
        clock,
    )
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_full_day_queues_and_shows_in_view() {
    let system = system().await;
    let req = SeatRequest {
        date: wednesday(),
        employee_id: 20,
    };
    let outcome = request_seat(&system.service, req.clone()).await.unwrap();
    assert_eq!(outcome, AdmissionOutcome::Queued { position: 1 });

    let view = roster_view(&system.service, wednesday()).await.unwrap();
    assert_eq!(view.free_slots, 0);
    assert_eq!(view.queue, vec!["Zoe".to_string()]);
    // The built-in Wednesday roster seats a "Mark"; the directory knows his username.
    assert!(view.employees.contains(&"Mark(@mark_k)".to_string()));

    release_seat(&system.service, req).await.unwrap();
    assert!(roster_view(&system.service, wednesday()).await.unwrap().queue.is_empty());
}

#[tokio::test]
async fn test_errors_are_flattened_to_strings() {
    let system = system().await;
    let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
    let err = request_seat(
        &system.service,
        SeatRequest {
            date: saturday,
            employee_id: 20,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, "2026-10-24 is not a workday");

    let err = release_seat(
        &system.service,
        SeatRequest {
            date: wednesday(),
            employee_id: 99,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, "unknown employee 99");
}

#[tokio::test]
async fn test_weekly_submission_parses_day_names() {
    let system = system().await;
    let week_start = NaiveDate::from_ymd_opt(2026, 10, 26).unwrap();
    let saved = submit_weekly_request(
        &system.service,
        WeeklyRequestSubmission {
            week_start,
            employee_id: 20,
            requested: vec!["пт".into(), "Thursday".into()],
            skipped: Vec::new(),
        },
    )
    .await
    .unwrap();
    assert!(saved.request.days_requested.contains(&WorkDay::Friday));
    assert!(saved.request.days_requested.contains(&WorkDay::Thursday));

    let err = submit_weekly_request(
        &system.service,
        WeeklyRequestSubmission {
            week_start,
            employee_id: 20,
            requested: vec!["someday".into()],
            skipped: Vec::new(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, "unknown day `someday`");

    let view = week_view(&system.service, week_start).await.unwrap();
    assert_eq!(view.days.len(), 5);
    assert_eq!(view.available[&WorkDay::Monday], 0);
    assert!(!view.days[&WorkDay::Friday].contains(&"Zoe(@zoe)".to_string()));
}

#[tokio::test]
async fn test_health_reports_mirror_state() {
    let system = system().await;
    let status = health(&system.mirror);
    assert!(status.ok);
    assert_eq!(status.pending_mirror_writes, 0);
    system.shutdown();
}
