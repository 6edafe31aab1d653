//! Collaborator-facing scheduling service.
//!
//! One [`SeatService`] is built at startup and shared by reference with every
//! command handler. It owns the in-memory default assignment and directory and
//! drives the admission and resolution engines over a [`ScheduleStore`].
//!
//! Requests for a future week stay pending until the week is materialized,
//! either by [`SeatService::publish_week`] on Sunday evening or, failing that,
//! on the first access to one of its dates once the week is current.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::admission::{AdmissionEngine, AdmissionOutcome, ReleaseOutcome};
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::directory::{normalize_username, Directory, StaticDirectory};
use crate::core::model::{
    is_week_start, week_dates, week_start, DateRoster, DefaultAssignment, EmployeeRecord,
    PendingEmployee, QueueEntry, SeatKey, WeeklyRequest, WorkDay,
};
use crate::core::notify::{Notification, Notifier};
use crate::core::resolution::{ResolvedWeek, ScheduleResolver};
use crate::core::store::ScheduleStore;
use crate::core::ScheduleError;
use crate::util::serde::EmployeeId;

/// Wall clock used to find "today" and the current week.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Effect of a saved request on the live roster of the current week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum LiveEffect {
    /// A requested day went through admission.
    Admission {
        /// Affected date.
        date: NaiveDate,
        /// Admission result.
        outcome: AdmissionOutcome,
    },
    /// A skipped day went through release.
    Release {
        /// Affected date.
        date: NaiveDate,
        /// Release result.
        outcome: ReleaseOutcome,
    },
}

/// A stored request and what it changed immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRequest {
    /// The request as persisted.
    pub request: WeeklyRequest,
    /// Live changes for remaining days of the current week.
    pub live: Vec<LiveEffect>,
}

/// Scheduling service.
pub struct SeatService {
    store: Arc<dyn ScheduleStore>,
    directory: Arc<StaticDirectory>,
    admission: AdmissionEngine,
    resolver: ScheduleResolver,
    notifier: Arc<dyn Notifier>,
    settled: tokio::sync::Mutex<HashSet<NaiveDate>>,
    default: RwLock<DefaultAssignment>,
    audit: Option<Arc<dyn AuditSink>>,
    bootstrap_admins: Vec<EmployeeId>,
    offset: FixedOffset,
    clock: Clock,
}

impl SeatService {
    /// Build a service. Call [`SeatService::reload`] to pull state from the store.
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        directory: Arc<StaticDirectory>,
        notifier: Arc<dyn Notifier>,
        max_seats: usize,
        utc_offset_minutes: i32,
    ) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            warn!(utc_offset_minutes, "invalid utc offset; using UTC");
            Utc.fix()
        });
        let engine_directory: Arc<dyn Directory> = directory.clone();
        Self {
            admission: AdmissionEngine::new(store.clone(), engine_directory, notifier.clone(), max_seats),
            resolver: ScheduleResolver::new(max_seats),
            notifier,
            settled: tokio::sync::Mutex::new(HashSet::new()),
            default: RwLock::new(DefaultAssignment::empty(max_seats)),
            store,
            directory,
            audit: None,
            bootstrap_admins: Vec::new(),
            offset,
            clock: Arc::new(Utc::now),
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Administrators granted on every reload regardless of stored data.
    #[must_use]
    pub fn with_bootstrap_admins(mut self, admins: Vec<EmployeeId>) -> Self {
        self.bootstrap_admins = admins;
        self
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Load the default assignment and the directory through the read cascade.
    pub async fn reload(&self) -> Result<(), ScheduleError> {
        let default = self.store.default_assignment().await?;
        let employees = self.store.employees().await?;
        let admins = self.store.admins().await?;
        let pending = self.store.pending_employees().await?;
        info!(
            default_source = ?default.source,
            employees = employees.value.len(),
            admins = admins.value.len(),
            pending = pending.value.len(),
            "service state loaded"
        );
        *self.default.write() = default.value;
        self.directory.replace(
            employees.value,
            admins.value.into_iter().chain(self.bootstrap_admins.iter().copied()),
            pending.value,
        );
        Ok(())
    }

    /// Shared directory.
    pub fn directory(&self) -> &Arc<StaticDirectory> {
        &self.directory
    }

    /// Seat count.
    pub const fn max_seats(&self) -> usize {
        self.resolver.max_seats()
    }

    /// Current time in the office timezone.
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        (self.clock)().with_timezone(&self.offset)
    }

    /// Today in the office timezone.
    pub fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }

    /// Monday of the current week.
    pub fn current_week_start(&self) -> NaiveDate {
        week_start(self.today())
    }

    /// Monday of the next week.
    pub fn next_week_start(&self) -> NaiveDate {
        self.current_week_start() + Duration::days(7)
    }

    fn require_week_start(date: NaiveDate) -> Result<(), ScheduleError> {
        if is_week_start(date) {
            Ok(())
        } else {
            Err(ScheduleError::InvalidWeekStart(date))
        }
    }

    fn require_admin(&self, actor: EmployeeId) -> Result<(), ScheduleError> {
        if self.directory.is_admin(actor) {
            Ok(())
        } else {
            Err(ScheduleError::PermissionDenied(actor))
        }
    }

    async fn audit(
        &self,
        action: AuditAction,
        date: Option<NaiveDate>,
        employee_id: Option<EmployeeId>,
        payload: Option<String>,
    ) {
        let event = build_audit_event(action, date, employee_id, payload);
        if let Some(sink) = &self.audit {
            sink.record(event.clone());
        }
        self.store.append_log(&event).await;
    }

    /// Seated employees of a date, plain names in seat-fill order.
    pub async fn get_roster(&self, date: NaiveDate) -> Result<Vec<String>, ScheduleError> {
        Ok(self.roster(date).await?.employees)
    }

    /// Full roster of a date.
    pub async fn roster(&self, date: NaiveDate) -> Result<DateRoster, ScheduleError> {
        WorkDay::from_date(date).ok_or(ScheduleError::NotAWorkday(date))?;
        self.settle(date).await?;
        self.admission.roster(date).await
    }

    /// Waitlist of a date.
    pub async fn queue(&self, date: NaiveDate) -> Result<Vec<QueueEntry>, ScheduleError> {
        WorkDay::from_date(date).ok_or(ScheduleError::NotAWorkday(date))?;
        self.settle(date).await?;
        self.admission.queue(date).await
    }

    /// Seat an employee or waitlist them.
    pub async fn admit(&self, date: NaiveDate, employee_id: EmployeeId) -> Result<AdmissionOutcome, ScheduleError> {
        WorkDay::from_date(date).ok_or(ScheduleError::NotAWorkday(date))?;
        self.settle(date).await?;
        let outcome = self.admission.admit(date, employee_id).await?;
        match outcome {
            AdmissionOutcome::Admitted { free_slots } => {
                self.audit(
                    AuditAction::Admitted,
                    Some(date),
                    Some(employee_id),
                    Some(format!("free_slots={free_slots}")),
                )
                .await;
            }
            AdmissionOutcome::Queued { position } => {
                self.audit(
                    AuditAction::Queued,
                    Some(date),
                    Some(employee_id),
                    Some(format!("position={position}")),
                )
                .await;
            }
            AdmissionOutcome::AlreadyPresent { .. } | AdmissionOutcome::AlreadyQueued { .. } => {}
        }
        Ok(outcome)
    }

    /// Give up a seat or leave the waitlist.
    pub async fn release(&self, date: NaiveDate, employee_id: EmployeeId) -> Result<ReleaseOutcome, ScheduleError> {
        WorkDay::from_date(date).ok_or(ScheduleError::NotAWorkday(date))?;
        self.settle(date).await?;
        let outcome = self.admission.release(date, employee_id).await?;
        match &outcome {
            ReleaseOutcome::Dequeued => {
                self.audit(AuditAction::Dequeued, Some(date), Some(employee_id), None)
                    .await;
            }
            ReleaseOutcome::Released {
                promoted,
                free_slots,
                ..
            } => {
                self.audit(
                    AuditAction::Released,
                    Some(date),
                    Some(employee_id),
                    Some(format!("free_slots={free_slots}")),
                )
                .await;
                if let Some(promoted) = promoted {
                    self.audit(AuditAction::Promoted, Some(date), Some(*promoted), None)
                        .await;
                }
            }
        }
        Ok(outcome)
    }

    /// Requests stored for a week.
    pub async fn weekly_requests(&self, week_start: NaiveDate) -> Result<Vec<WeeklyRequest>, ScheduleError> {
        Self::require_week_start(week_start)?;
        Ok(self.store.requests(week_start).await?.value)
    }

    /// Resolve a week from the default assignment and its requests.
    pub async fn resolve_week(&self, week_start: NaiveDate) -> Result<ResolvedWeek, ScheduleError> {
        Self::require_week_start(week_start)?;
        let requests = self.store.requests(week_start).await?.value;
        let default = self.default.read().clone();
        Ok(self
            .resolver
            .resolve(week_start, &default, &requests, self.directory.as_ref()))
    }

    /// Store a request for a future week, replacing any earlier one for the
    /// same week and employee.
    ///
    /// A request for the current week is not kept pending. It acts on the
    /// remaining days at once: skipped days release the seat, requested days
    /// go through admission.
    pub async fn save_weekly_request(
        &self,
        week_start: NaiveDate,
        employee_id: EmployeeId,
        requested: &[WorkDay],
        skipped: &[WorkDay],
    ) -> Result<SavedRequest, ScheduleError> {
        let request = WeeklyRequest::new(
            week_start,
            employee_id,
            requested.iter().copied(),
            skipped.iter().copied(),
        );
        self.store_request(request).await
    }

    /// Store a request built from the days the employee wants to be in.
    pub async fn set_week_days(
        &self,
        week_start: NaiveDate,
        employee_id: EmployeeId,
        desired: &[WorkDay],
    ) -> Result<SavedRequest, ScheduleError> {
        let identity = self
            .directory
            .identity(employee_id)
            .ok_or(ScheduleError::UnknownEmployee(employee_id))?;
        let request = {
            let default = self.default.read();
            WeeklyRequest::from_desired_days(week_start, employee_id, &identity.plain_name, desired, &default)
        };
        self.store_request(request).await
    }

    async fn store_request(&self, request: WeeklyRequest) -> Result<SavedRequest, ScheduleError> {
        Self::require_week_start(request.week_start)?;
        if self.directory.identity(request.employee_id).is_none() {
            return Err(ScheduleError::UnknownEmployee(request.employee_id));
        }
        let live_week = request.week_start <= self.current_week_start();
        if live_week {
            self.settle(request.week_start).await?;
        } else {
            self.store.save_request(&request).await?;
        }
        self.audit(
            AuditAction::RequestSaved,
            Some(request.week_start),
            Some(request.employee_id),
            Some(format!(
                "requested={} skipped={}",
                WeeklyRequest::days_csv(&request.days_requested),
                WeeklyRequest::days_csv(&request.days_skipped)
            )),
        )
        .await;

        let live = if live_week {
            self.apply_live(&request).await?
        } else {
            Vec::new()
        };
        Ok(SavedRequest { request, live })
    }

    async fn apply_live(&self, request: &WeeklyRequest) -> Result<Vec<LiveEffect>, ScheduleError> {
        let today = self.today();
        let mut effects = Vec::new();
        for day in &request.days_skipped {
            let date = day.date_in(request.week_start);
            if date < today {
                continue;
            }
            match self.release(date, request.employee_id).await {
                Ok(outcome) => effects.push(LiveEffect::Release { date, outcome }),
                Err(ScheduleError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        for day in &request.days_requested {
            let date = day.date_in(request.week_start);
            if date < today {
                continue;
            }
            let outcome = self.admit(date, request.employee_id).await?;
            effects.push(LiveEffect::Admission { date, outcome });
        }
        Ok(effects)
    }

    /// Apply a week's pending requests to its rosters, then discard them.
    ///
    /// Every date is merged under its admission lock, starting from what the
    /// date holds now, so live admissions and promotions survive. Requests are
    /// cleared only after every date is written; a retry after a partial
    /// failure merges the same requests again, which leaves dates already
    /// written unchanged.
    pub async fn materialize_week(&self, week_start: NaiveDate) -> Result<ResolvedWeek, ScheduleError> {
        Self::require_week_start(week_start)?;
        let mut settled = self.settled.lock().await;
        let requests = self.store.requests(week_start).await?.value;
        let week = self.apply_requests(week_start, &requests).await?;
        if week_start <= self.current_week_start() {
            settled.insert(week_start);
        }
        Ok(week)
    }

    /// Materialize the week of `date` once it is current or past and still
    /// has pending requests.
    async fn settle(&self, date: NaiveDate) -> Result<(), ScheduleError> {
        let monday = week_start(date);
        if monday > self.current_week_start() {
            return Ok(());
        }
        let mut settled = self.settled.lock().await;
        if settled.contains(&monday) {
            return Ok(());
        }
        let requests = self.store.requests(monday).await?.value;
        if !requests.is_empty() {
            info!(week_start = %monday, requests = requests.len(), "applying pending requests to a started week");
            self.apply_requests(monday, &requests).await?;
        }
        settled.insert(monday);
        Ok(())
    }

    async fn apply_requests(
        &self,
        week_start: NaiveDate,
        requests: &[WeeklyRequest],
    ) -> Result<ResolvedWeek, ScheduleError> {
        let mut days = BTreeMap::new();
        let mut dropped = Vec::new();
        for (date, day) in week_dates(week_start) {
            let mut day_dropped = Vec::new();
            let roster = self
                .admission
                .rewrite_roster(date, |current| {
                    let (names, skipped) =
                        self.resolver
                            .resolve_day(day, current.employees.clone(), requests, self.directory.as_ref());
                    day_dropped = skipped;
                    names
                })
                .await?;
            dropped.extend(day_dropped);
            days.insert(day, roster.employees);
        }
        if !requests.is_empty() {
            self.store.clear_requests(week_start).await?;
        }
        info!(week_start = %week_start, dropped = dropped.len(), "week materialized");
        self.audit(
            AuditAction::WeekMaterialized,
            Some(week_start),
            None,
            Some(format!("dropped={}", dropped.len())),
        )
        .await;
        Ok(ResolvedWeek {
            week_start,
            days,
            dropped,
        })
    }

    async fn deliver(&self, employee_id: EmployeeId, notification: &Notification) -> bool {
        match self.notifier.notify(employee_id, notification).await {
            Ok(()) => true,
            Err(err) => {
                warn!(employee_id, error = %err, "notification delivery failed");
                false
            }
        }
    }

    /// Remind every employee to file requests for the week starting at
    /// `week_start`. Returns the number of deliveries.
    pub async fn send_reminders(&self, week_start: NaiveDate) -> Result<usize, ScheduleError> {
        Self::require_week_start(week_start)?;
        let notification = Notification::RequestReminder { week_start };
        let mut delivered = 0;
        for id in self.directory.employee_ids() {
            if self.deliver(id, &notification).await {
                delivered += 1;
            }
        }
        info!(week_start = %week_start, delivered, "request reminders sent");
        Ok(delivered)
    }

    /// Materialize a week and send every employee their office and remote
    /// days, with the free seats on their remote days. Returns the number of
    /// deliveries.
    pub async fn publish_week(&self, week_start: NaiveDate) -> Result<usize, ScheduleError> {
        let week = self.materialize_week(week_start).await?;
        let max = self.max_seats();
        let mut delivered = 0;
        for id in self.directory.employee_ids() {
            let Some(identity) = self.directory.identity(id) else {
                continue;
            };
            let (office_days, remote_days): (Vec<WorkDay>, Vec<WorkDay>) = WorkDay::ALL
                .into_iter()
                .partition(|day| week.day(*day).contains(&identity.plain_name));
            let free_slots = remote_days
                .iter()
                .map(|day| (*day, max.saturating_sub(week.day(*day).len())))
                .filter(|(_, free)| *free > 0)
                .collect();
            let notification = Notification::WeekSchedule {
                week_start,
                office_days,
                remote_days,
                free_slots,
            };
            if self.deliver(id, &notification).await {
                delivered += 1;
            }
        }
        info!(week_start = %week_start, delivered, "week schedule published");
        Ok(delivered)
    }

    /// In-memory default assignment.
    pub fn default_assignment(&self) -> DefaultAssignment {
        self.default.read().clone()
    }

    /// Reload the default assignment through the read cascade.
    pub async fn load_default(&self) -> Result<DefaultAssignment, ScheduleError> {
        let loaded = self.store.default_assignment().await?;
        debug!(source = ?loaded.source, "default assignment loaded");
        *self.default.write() = loaded.value.clone();
        Ok(loaded.value)
    }

    /// Replace the default assignment. Admin only.
    pub async fn save_default(&self, actor: EmployeeId, assignment: DefaultAssignment) -> Result<(), ScheduleError> {
        self.require_admin(actor)?;
        assignment.validate(self.max_seats())?;
        self.store.save_default(&assignment).await?;
        *self.default.write() = assignment;
        self.audit(AuditAction::DefaultSaved, None, Some(actor), None)
            .await;
        Ok(())
    }

    /// Assign one default seat. Admin only.
    pub async fn set_default_seat(
        &self,
        actor: EmployeeId,
        day: WorkDay,
        seat: SeatKey,
        plain_name: &str,
    ) -> Result<(), ScheduleError> {
        let mut assignment = self.default_assignment();
        assignment.set_seat(day, seat, plain_name)?;
        self.save_default(actor, assignment).await
    }

    /// Free one default seat. Admin only.
    pub async fn clear_default_seat(&self, actor: EmployeeId, day: WorkDay, seat: SeatKey) -> Result<(), ScheduleError> {
        let mut assignment = self.default_assignment();
        assignment.clear_seat(day, seat)?;
        self.save_default(actor, assignment).await
    }

    async fn week_rosters(&self, week_start: NaiveDate) -> Result<BTreeMap<WorkDay, Vec<String>>, ScheduleError> {
        Self::require_week_start(week_start)?;
        if week_start > self.current_week_start() {
            return Ok(self.resolve_week(week_start).await?.days);
        }
        self.settle(week_start).await?;
        let mut days = BTreeMap::new();
        for (date, day) in week_dates(week_start) {
            days.insert(day, self.admission.roster(date).await?.employees);
        }
        Ok(days)
    }

    /// Free seats per day. Future weeks are computed from the resolved
    /// schedule, the current and past weeks from the live rosters.
    pub async fn available_slots(&self, week_start: NaiveDate) -> Result<BTreeMap<WorkDay, usize>, ScheduleError> {
        let max = self.max_seats();
        Ok(self
            .week_rosters(week_start)
            .await?
            .into_iter()
            .map(|(day, names)| (day, max.saturating_sub(names.len())))
            .collect())
    }

    /// Whether the employee is in the office on each day of a week.
    pub async fn employee_week(
        &self,
        week_start: NaiveDate,
        employee_id: EmployeeId,
    ) -> Result<BTreeMap<WorkDay, bool>, ScheduleError> {
        let identity = self
            .directory
            .identity(employee_id)
            .ok_or(ScheduleError::UnknownEmployee(employee_id))?;
        Ok(self
            .week_rosters(week_start)
            .await?
            .into_iter()
            .map(|(day, names)| (day, names.contains(&identity.plain_name)))
            .collect())
    }

    /// Insert or update an employee.
    pub async fn save_employee(&self, record: EmployeeRecord) -> Result<(), ScheduleError> {
        self.store.save_employee(&record).await?;
        self.directory.upsert(record);
        Ok(())
    }

    /// Record an employee who contacted the bot. A pending entry with the same
    /// username supplies the name and approves them.
    pub async fn register_employee(
        &self,
        id: EmployeeId,
        display_name: &str,
        username: Option<&str>,
    ) -> Result<EmployeeRecord, ScheduleError> {
        let pending = username.and_then(|u| {
            self.directory
                .pending()
                .into_iter()
                .find(|p| normalize_username(&p.username) == normalize_username(u))
        });
        let existing = self.directory.record(id);
        let record = EmployeeRecord {
            id,
            manual_name: pending
                .as_ref()
                .map(|p| p.manual_name.clone())
                .or_else(|| existing.as_ref().map(|e| e.manual_name.clone()))
                .unwrap_or_else(|| display_name.to_string()),
            display_name: display_name.to_string(),
            username: username.map(|u| u.trim_start_matches('@').to_string()),
            approved: pending.is_some() || existing.as_ref().is_some_and(|e| e.approved),
        };
        self.save_employee(record.clone()).await?;
        if let Some(pending) = pending {
            self.store.remove_pending(&pending.username).await?;
            self.directory.take_pending(&pending.username);
        }
        Ok(record)
    }

    /// Grant admin rights. Admin only.
    pub async fn add_admin(&self, actor: EmployeeId, id: EmployeeId) -> Result<(), ScheduleError> {
        self.require_admin(actor)?;
        self.store.add_admin(id).await?;
        self.directory.set_admin(id, true);
        Ok(())
    }

    /// Revoke admin rights. Admin only.
    pub async fn remove_admin(&self, actor: EmployeeId, id: EmployeeId) -> Result<(), ScheduleError> {
        self.require_admin(actor)?;
        self.store.remove_admin(id).await?;
        self.directory.set_admin(id, false);
        Ok(())
    }

    /// Pre-register an employee by username. Admin only.
    pub async fn add_pending(&self, actor: EmployeeId, pending: PendingEmployee) -> Result<(), ScheduleError> {
        self.require_admin(actor)?;
        self.store.save_pending(&pending).await?;
        self.directory.add_pending(pending);
        Ok(())
    }

    /// Drop a pre-registration. Admin only.
    pub async fn remove_pending(&self, actor: EmployeeId, username: &str) -> Result<(), ScheduleError> {
        self.require_admin(actor)?;
        self.store.remove_pending(username).await?;
        self.directory.take_pending(username);
        Ok(())
    }
}
