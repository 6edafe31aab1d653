//! Live admission and waitlist behavior through the full service stack.
//!
//! Covers:
//! 1. A skipped default day frees a seat and broadcasts availability
//! 2. A full day waitlists instead of admitting
//! 3. Release promotes the waitlist head without a broadcast
//! 4. Materializing a started week keeps live promotions
//! 5. FIFO promotion order and idempotent release
//! 6. Primary failures leave memory untouched
//! 7. The seat cap holds under random command sequences

use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rand::Rng;
use seat_scheduler::builders::{assemble_with_clock, SeatSystem, StoreParts};
use seat_scheduler::config::OfficeConfig;
use seat_scheduler::core::{
    AdmissionOutcome, AuditAction, DefaultAssignment, EmployeeRecord, LiveEffect, Notification,
    PrimaryStore, ReleaseOutcome, ScheduleError, Spawn, WorkDay,
};
use seat_scheduler::infra::{InMemoryMirror, InMemoryNotifier, InMemoryPrimary, MemoryCache};
use seat_scheduler::util::serde::EmployeeId;

const MONDAY_NAMES: [&str; 8] = ["Dima", "Timur", "Vasya", "Ilya", "Aylar", "Vitaliy", "Dasha", "Roma"];
const EXTRA_NAMES: [&str; 4] = ["Egor", "Katya", "Mark", "Gleb"];

#[derive(Clone)]
struct TestSpawner;

impl Spawn for TestSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

struct Harness {
    system: SeatSystem,
    primary: Arc<InMemoryPrimary>,
    notifier: Arc<InMemoryNotifier>,
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

/// Ids are 1-based positions in MONDAY_NAMES followed by EXTRA_NAMES.
fn id_of(name: &str) -> EmployeeId {
    let position = MONDAY_NAMES
        .iter()
        .chain(EXTRA_NAMES.iter())
        .position(|n| *n == name)
        .unwrap();
    EmployeeId::try_from(position + 1).unwrap()
}

fn assignment() -> DefaultAssignment {
    DefaultAssignment::empty(8)
        .with_day(WorkDay::Monday, &MONDAY_NAMES)
        .with_day(WorkDay::Tuesday, &["Dima", "Timur"])
        .with_day(WorkDay::Wednesday, &["Dima"])
        .with_day(WorkDay::Thursday, &["Dima"])
        .with_day(WorkDay::Friday, &["Dima"])
}

async fn harness() -> Harness {
    let primary = Arc::new(InMemoryPrimary::new());
    for name in MONDAY_NAMES.iter().chain(EXTRA_NAMES.iter()) {
        primary
            .save_employee(&EmployeeRecord {
                id: id_of(name),
                manual_name: (*name).to_string(),
                display_name: (*name).to_string(),
                username: Some(name.to_lowercase()),
                approved: true,
            })
            .await
            .unwrap();
    }
    let notifier = Arc::new(InMemoryNotifier::new());
    let cfg = OfficeConfig {
        default_assignment: Some(assignment()),
        admin_ids: vec![id_of("Dima")],
        ..OfficeConfig::default()
    };
    let parts = StoreParts {
        primary: primary.clone(),
        mirror: Arc::new(InMemoryMirror::new()),
        cache: Arc::new(MemoryCache::new()),
    };
    // Monday 09:00 in the office zone (UTC+3).
    let clock = Arc::new(|| Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap());
    let system = assemble_with_clock(&cfg, parts, notifier.clone(), &TestSpawner, clock)
        .await
        .unwrap();
    Harness {
        system,
        primary,
        notifier,
    }
}

#[tokio::test]
async fn test_skipping_default_day_frees_seat_and_broadcasts() {
    let h = harness().await;
    let service = &h.system.service;
    assert_eq!(service.get_roster(monday()).await.unwrap().len(), 8);

    let saved = service
        .save_weekly_request(monday(), id_of("Vasya"), &[], &[WorkDay::Monday])
        .await
        .unwrap();

    let roster = service.get_roster(monday()).await.unwrap();
    assert_eq!(roster.len(), 7);
    assert!(!roster.contains(&"Vasya".to_string()));
    assert_eq!(
        saved.live,
        vec![LiveEffect::Release {
            date: monday(),
            outcome: ReleaseOutcome::Released {
                promoted: None,
                free_slots: 1,
                notified: EXTRA_NAMES.len() + 1,
            },
        }]
    );

    let expected = Notification::SeatAvailable {
        date: monday(),
        free_slots: 1,
    };
    for name in EXTRA_NAMES.iter().chain(["Vasya"].iter()) {
        assert_eq!(h.notifier.delivered_to(id_of(name)), vec![expected.clone()]);
    }
    assert!(h.notifier.delivered_to(id_of("Dima")).is_empty());
}

#[tokio::test]
async fn test_materializing_current_week_keeps_promotions() {
    let h = harness().await;
    let service = &h.system.service;
    service.admit(monday(), id_of("Egor")).await.unwrap();
    service.release(monday(), id_of("Dima")).await.unwrap();
    let before = service.get_roster(monday()).await.unwrap();

    let week = service.materialize_week(monday()).await.unwrap();
    assert_eq!(week.day(WorkDay::Monday), before.as_slice());
    let roster = service.get_roster(monday()).await.unwrap();
    assert!(roster.contains(&"Egor".to_string()));
    assert!(!roster.contains(&"Dima".to_string()));
    assert_eq!(roster, h.primary.load_roster(monday()).await.unwrap().unwrap().employees);
}

#[tokio::test]
async fn test_skip_request_promotes_waitlist_head() {
    let h = harness().await;
    let service = &h.system.service;
    service.admit(monday(), id_of("Katya")).await.unwrap();

    let saved = service
        .save_weekly_request(monday(), id_of("Roma"), &[], &[WorkDay::Monday])
        .await
        .unwrap();
    assert_eq!(
        saved.live,
        vec![LiveEffect::Release {
            date: monday(),
            outcome: ReleaseOutcome::Released {
                promoted: Some(id_of("Katya")),
                free_slots: 0,
                notified: 0,
            },
        }]
    );
    assert!(service.queue(monday()).await.unwrap().is_empty());
    assert_eq!(
        h.notifier.delivered_to(id_of("Katya")),
        vec![Notification::Promoted { date: monday() }]
    );
}

#[tokio::test]
async fn test_full_day_waitlists_then_promotes_on_release() {
    let h = harness().await;
    let service = &h.system.service;

    let outcome = service.admit(monday(), id_of("Egor")).await.unwrap();
    assert_eq!(outcome, AdmissionOutcome::Queued { position: 1 });
    let queue = service.queue(monday()).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].employee_name, "Egor");
    assert_eq!(service.get_roster(monday()).await.unwrap().len(), 8);

    let released = service.release(monday(), id_of("Dima")).await.unwrap();
    assert_eq!(
        released,
        ReleaseOutcome::Released {
            promoted: Some(id_of("Egor")),
            free_slots: 0,
            notified: 0,
        }
    );
    let roster = service.get_roster(monday()).await.unwrap();
    assert_eq!(roster.len(), 8);
    assert_eq!(roster.last().map(String::as_str), Some("Egor"));
    assert!(service.queue(monday()).await.unwrap().is_empty());

    assert_eq!(
        h.notifier.delivered_to(id_of("Egor")),
        vec![Notification::Promoted { date: monday() }]
    );
    assert_eq!(h.notifier.deliveries().len(), 1);

    assert_eq!(h.system.audit.of(AuditAction::Queued).len(), 1);
    assert_eq!(h.system.audit.of(AuditAction::Promoted).len(), 1);
}

#[tokio::test]
async fn test_waitlist_is_fifo() {
    let h = harness().await;
    let service = &h.system.service;

    assert_eq!(
        service.admit(monday(), id_of("Egor")).await.unwrap(),
        AdmissionOutcome::Queued { position: 1 }
    );
    assert_eq!(
        service.admit(monday(), id_of("Katya")).await.unwrap(),
        AdmissionOutcome::Queued { position: 2 }
    );
    assert_eq!(
        service.admit(monday(), id_of("Egor")).await.unwrap(),
        AdmissionOutcome::AlreadyQueued { position: 1 }
    );

    let first = service.release(monday(), id_of("Timur")).await.unwrap();
    let second = service.release(monday(), id_of("Ilya")).await.unwrap();
    assert!(matches!(first, ReleaseOutcome::Released { promoted: Some(id), .. } if id == id_of("Egor")));
    assert!(matches!(second, ReleaseOutcome::Released { promoted: Some(id), .. } if id == id_of("Katya")));
}

#[tokio::test]
async fn test_leaving_waitlist_does_not_promote() {
    let h = harness().await;
    let service = &h.system.service;
    service.admit(monday(), id_of("Egor")).await.unwrap();
    service.admit(monday(), id_of("Katya")).await.unwrap();

    assert_eq!(
        service.release(monday(), id_of("Egor")).await.unwrap(),
        ReleaseOutcome::Dequeued
    );
    let queue = service.queue(monday()).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].employee_id, id_of("Katya"));
    assert_eq!(service.get_roster(monday()).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_release_of_absent_employee_is_not_found() {
    let h = harness().await;
    let service = &h.system.service;
    service.admit(monday(), id_of("Egor")).await.unwrap();
    let roster_before = service.get_roster(monday()).await.unwrap();
    let queue_before = service.queue(monday()).await.unwrap();
    let writes_before = h.primary.write_count();

    let err = service.release(monday(), id_of("Mark")).await.unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound(_)));

    assert_eq!(service.get_roster(monday()).await.unwrap(), roster_before);
    assert_eq!(service.queue(monday()).await.unwrap(), queue_before);
    assert_eq!(h.primary.write_count(), writes_before);
}

#[tokio::test]
async fn test_admitting_seated_employee_is_noop() {
    let h = harness().await;
    let service = &h.system.service;
    let tuesday = monday().succ_opt().unwrap();
    assert_eq!(
        service.admit(tuesday, id_of("Timur")).await.unwrap(),
        AdmissionOutcome::AlreadyPresent { free_slots: 6 }
    );
    assert_eq!(
        service.admit(tuesday, id_of("Egor")).await.unwrap(),
        AdmissionOutcome::Admitted { free_slots: 5 }
    );
}

#[tokio::test]
async fn test_primary_failure_leaves_memory_unchanged() {
    let h = harness().await;
    let service = &h.system.service;
    let tuesday = monday().succ_opt().unwrap();
    let before = service.get_roster(tuesday).await.unwrap();

    h.primary.set_fail_writes(true);
    let err = service.admit(tuesday, id_of("Egor")).await.unwrap_err();
    assert!(matches!(err, ScheduleError::PrimaryStoreUnavailable(_)));
    assert_eq!(service.get_roster(tuesday).await.unwrap(), before);

    let err = service.release(tuesday, id_of("Timur")).await.unwrap_err();
    assert!(matches!(err, ScheduleError::PrimaryStoreUnavailable(_)));
    assert_eq!(service.get_roster(tuesday).await.unwrap(), before);
    assert!(h.notifier.deliveries().is_empty());

    h.primary.set_fail_writes(false);
    assert_eq!(
        service.admit(tuesday, id_of("Egor")).await.unwrap(),
        AdmissionOutcome::Admitted { free_slots: 5 }
    );
}

#[tokio::test]
async fn test_weekend_dates_are_rejected() {
    let h = harness().await;
    let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
    let err = h.system.service.admit(saturday, id_of("Egor")).await.unwrap_err();
    assert_eq!(err, ScheduleError::NotAWorkday(saturday));
}

#[tokio::test]
async fn test_unknown_employee_is_rejected() {
    let h = harness().await;
    let err = h.system.service.admit(monday(), 999).await.unwrap_err();
    assert_eq!(err, ScheduleError::UnknownEmployee(999));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_respect_capacity() {
    let h = harness().await;
    let wednesday = monday() + chrono::Duration::days(2);
    let mut handles = Vec::new();
    for name in MONDAY_NAMES.iter().chain(EXTRA_NAMES.iter()) {
        let service = h.system.service.clone();
        let id = id_of(name);
        handles.push(tokio::spawn(async move { service.admit(wednesday, id).await }));
    }
    let mut seated = 0;
    let mut queued = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            AdmissionOutcome::Admitted { .. } | AdmissionOutcome::AlreadyPresent { .. } => seated += 1,
            AdmissionOutcome::Queued { .. } | AdmissionOutcome::AlreadyQueued { .. } => queued += 1,
        }
    }
    assert_eq!(seated, 8);
    assert_eq!(queued, 4);
    assert_eq!(h.system.service.get_roster(wednesday).await.unwrap().len(), 8);
    assert_eq!(h.system.service.queue(wednesday).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_random_commands_never_exceed_capacity() {
    let h = harness().await;
    let service = &h.system.service;
    let thursday = monday() + chrono::Duration::days(3);
    let everyone: Vec<EmployeeId> = MONDAY_NAMES
        .iter()
        .chain(EXTRA_NAMES.iter())
        .map(|n| id_of(n))
        .collect();
    let mut rng = rand::rng();
    for _ in 0..300 {
        let id = everyone[rng.random_range(0..everyone.len())];
        if rng.random_bool(0.6) {
            service.admit(thursday, id).await.unwrap();
        } else {
            match service.release(thursday, id).await {
                Ok(_) | Err(ScheduleError::NotFound(_)) => {}
                Err(err) => panic!("unexpected release error: {err}"),
            }
        }
        let roster = service.get_roster(thursday).await.unwrap();
        let queue = service.queue(thursday).await.unwrap();
        assert!(roster.len() <= 8);
        // A waitlist only exists while the day is full.
        assert!(queue.is_empty() || roster.len() == 8);
        for entry in &queue {
            assert!(!roster.contains(&entry.employee_name));
        }
    }
}
