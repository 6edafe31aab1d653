//! API-facing request/response models and thin request functions.
//!
//! Errors are flattened to strings at this boundary; callers render them.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::resolution::display_name;
use crate::core::{AdmissionOutcome, ReleaseOutcome, SavedRequest, SeatService, StaticDirectory, WorkDay};
use crate::sync::MirrorSync;
use crate::util::serde::EmployeeId;

/// Seat request for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatRequest {
    /// Target date.
    pub date: NaiveDate,
    /// Requesting employee.
    pub employee_id: EmployeeId,
}

/// Weekly request submission; day names accept any supported spelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyRequestSubmission {
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Requesting employee.
    pub employee_id: EmployeeId,
    /// Days to add.
    #[serde(default)]
    pub requested: Vec<String>,
    /// Days to give up.
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// One date as shown to employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterView {
    /// Date.
    pub date: NaiveDate,
    /// Occupants in presentation form.
    pub employees: Vec<String>,
    /// Free seats.
    pub free_slots: usize,
    /// Waitlisted names, head first.
    pub queue: Vec<String>,
}

/// One week as shown to employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekView {
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Occupants per day in presentation form.
    pub days: BTreeMap<WorkDay, Vec<String>>,
    /// Free seats per day.
    pub available: BTreeMap<WorkDay, usize>,
}

/// Health response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Mirror writes waiting for replay.
    pub pending_mirror_writes: usize,
    /// Mirror calls in the current rate-limit window.
    pub calls_in_window: usize,
}

fn parse_days(names: &[String]) -> Result<Vec<WorkDay>, String> {
    names
        .iter()
        .map(|n| WorkDay::parse(n).ok_or_else(|| format!("unknown day `{n}`")))
        .collect()
}

/// Take a seat or join the waitlist.
pub async fn request_seat(service: &SeatService, req: SeatRequest) -> Result<AdmissionOutcome, String> {
    service
        .admit(req.date, req.employee_id)
        .await
        .map_err(|e| e.to_string())
}

/// Give up a seat or leave the waitlist.
pub async fn release_seat(service: &SeatService, req: SeatRequest) -> Result<ReleaseOutcome, String> {
    service
        .release(req.date, req.employee_id)
        .await
        .map_err(|e| e.to_string())
}

/// Store a weekly request.
pub async fn submit_weekly_request(
    service: &SeatService,
    req: WeeklyRequestSubmission,
) -> Result<SavedRequest, String> {
    let requested = parse_days(&req.requested)?;
    let skipped = parse_days(&req.skipped)?;
    service
        .save_weekly_request(req.week_start, req.employee_id, &requested, &skipped)
        .await
        .map_err(|e| e.to_string())
}

/// Live roster and waitlist of a date.
pub async fn roster_view(service: &SeatService, date: NaiveDate) -> Result<RosterView, String> {
    let roster = service.roster(date).await.map_err(|e| e.to_string())?;
    let queue = service.queue(date).await.map_err(|e| e.to_string())?;
    let directory: &StaticDirectory = service.directory();
    Ok(RosterView {
        date,
        free_slots: roster.free_slots(service.max_seats()),
        employees: roster.employees.iter().map(|n| display_name(directory, n)).collect(),
        queue: queue.into_iter().map(|e| e.employee_name).collect(),
    })
}

/// Resolved week with availability.
pub async fn week_view(service: &SeatService, week_start: NaiveDate) -> Result<WeekView, String> {
    let resolved = service.resolve_week(week_start).await.map_err(|e| e.to_string())?;
    let available = service
        .available_slots(week_start)
        .await
        .map_err(|e| e.to_string())?;
    Ok(WeekView {
        week_start,
        days: resolved.display(&**service.directory()),
        available,
    })
}

/// Return a health payload for the mirror path.
pub fn health(mirror: &MirrorSync) -> Health {
    Health {
        ok: true,
        pending_mirror_writes: mirror.buffer().len(),
        calls_in_window: mirror.limiter().in_window(),
    }
}
