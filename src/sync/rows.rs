//! Positional sheet rows: header handling, keyed edits and per-entity codecs.
//!
//! Rows that fail to parse are skipped with a warning; a bad row never fails
//! the whole read.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::core::model::{
    DateRoster, DefaultAssignment, EmployeeRecord, PendingEmployee, QueueEntry, SeatKey,
    WeeklyRequest, WorkDay,
};
use crate::core::store::Collection;
use crate::core::ScheduleError;
use crate::sync::buffer::MirrorWrite;
use crate::util::serde::EmployeeId;

/// Sheet rows.
pub type Rows = Vec<Vec<String>>;

/// First-cell tokens that mark a header row.
pub const HEADER_KEYWORDS: &[&str] = &[
    "employee_id",
    "id",
    "username",
    "day_name",
    "date",
    "week_start",
    "timestamp",
];

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", |c| c.trim())
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Whether a row looks like a header.
pub fn is_header(row: &[String]) -> bool {
    let first = cell(row, 0).to_lowercase();
    HEADER_KEYWORDS.contains(&first.as_str())
}

/// Data rows: header removed, blank rows dropped.
pub fn data_rows(rows: Rows) -> Rows {
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_some_and(|r| is_header(r)) {
        rows.next();
    }
    rows.filter(|r| !is_blank(r)).collect()
}

/// The collection's header row.
pub fn header_row(collection: Collection) -> Vec<String> {
    collection.header().iter().map(|h| (*h).to_string()).collect()
}

fn matches_key(row: &[String], key: &[String]) -> bool {
    !key.is_empty() && key.iter().enumerate().all(|(i, k)| cell(row, i) == k.trim())
}

/// Apply a mutation to a full sheet and return the new sheet, header first.
pub fn apply_write(collection: Collection, sheet: Rows, write: &MirrorWrite) -> Rows {
    let mut data = data_rows(sheet);
    match write {
        MirrorWrite::ReplaceAll { rows } => data.clone_from(rows),
        MirrorWrite::UpsertByKey { key, row } => {
            match data.iter_mut().find(|r| matches_key(r, key)) {
                Some(existing) => existing.clone_from(row),
                None => data.push(row.clone()),
            }
        }
        MirrorWrite::DeleteByKey { key } => data.retain(|r| !matches_key(r, key)),
        MirrorWrite::ReplaceByKey { key, rows } => {
            data.retain(|r| !matches_key(r, key));
            data.extend(rows.iter().cloned());
        }
        MirrorWrite::Append { row } => data.push(row.clone()),
    }
    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(header_row(collection));
    out.extend(data);
    out
}

fn skip_malformed<T>(collection: Collection, row: &[String], parsed: Result<T, ScheduleError>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(collection = %collection, ?row, error = %err, "malformed row skipped");
            None
        }
    }
}

fn parse_id(raw: &str) -> Result<EmployeeId, ScheduleError> {
    raw.parse().map_err(|_| ScheduleError::malformed("employee id", raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ScheduleError::malformed("date", raw))
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Key of a single-cell keyed row.
pub fn key(value: impl ToString) -> Vec<String> {
    vec![value.to_string()]
}

/// Row for an admin id.
pub fn encode_admin(id: EmployeeId) -> Vec<String> {
    vec![id.to_string()]
}

/// Admin ids from data rows.
pub fn decode_admins(rows: &Rows) -> Vec<EmployeeId> {
    rows.iter()
        .filter_map(|r| skip_malformed(Collection::Admins, r, parse_id(cell(r, 0))))
        .collect()
}

/// Row for an employee.
pub fn encode_employee(record: &EmployeeRecord) -> Vec<String> {
    vec![
        record.id.to_string(),
        record.manual_name.clone(),
        record.display_name.clone(),
        record.username.clone().unwrap_or_default(),
        if record.approved { "TRUE" } else { "FALSE" }.to_string(),
    ]
}

/// Employees from data rows.
pub fn decode_employees(rows: &Rows) -> Vec<EmployeeRecord> {
    rows.iter()
        .filter_map(|r| {
            let parsed = parse_id(cell(r, 0)).map(|id| EmployeeRecord {
                id,
                manual_name: cell(r, 1).to_string(),
                display_name: cell(r, 2).to_string(),
                username: Some(cell(r, 3).trim_start_matches('@').to_string()).filter(|u| !u.is_empty()),
                approved: parse_bool(cell(r, 4)),
            });
            skip_malformed(Collection::Employees, r, parsed)
        })
        .collect()
}

/// Row for a pending employee.
pub fn encode_pending(pending: &PendingEmployee) -> Vec<String> {
    vec![pending.username.clone(), pending.manual_name.clone()]
}

/// Pending employees from data rows.
pub fn decode_pending(rows: &Rows) -> Vec<PendingEmployee> {
    rows.iter()
        .filter_map(|r| {
            let parsed = if cell(r, 0).is_empty() {
                Err(ScheduleError::malformed("username", ""))
            } else {
                Ok(PendingEmployee {
                    username: cell(r, 0).to_string(),
                    manual_name: cell(r, 1).to_string(),
                })
            };
            skip_malformed(Collection::PendingEmployees, r, parsed)
        })
        .collect()
}

/// Rows for a default assignment, one per day with the seat map as JSON.
pub fn encode_default(assignment: &DefaultAssignment) -> Rows {
    assignment
        .days()
        .iter()
        .map(|(day, seats)| {
            let json = serde_json::to_string(seats).unwrap_or_else(|_| "{}".to_string());
            vec![day.as_str().to_string(), json]
        })
        .collect()
}

/// Default assignment from data rows, or `None` when no day parsed.
pub fn decode_default(rows: &Rows) -> Option<DefaultAssignment> {
    let mut assignment = DefaultAssignment::default();
    let mut any = false;
    for r in rows {
        let parsed = cell(r, 0).parse::<WorkDay>().and_then(|day| {
            serde_json::from_str::<BTreeMap<SeatKey, String>>(cell(r, 1))
                .map(|seats| (day, seats))
                .map_err(|e| ScheduleError::malformed("seat map", e))
        });
        if let Some((day, seats)) = skip_malformed(Collection::DefaultSchedule, r, parsed) {
            assignment.insert_day(day, seats);
            any = true;
        }
    }
    any.then_some(assignment)
}

/// Row for a date roster.
pub fn encode_roster(roster: &DateRoster) -> Vec<String> {
    vec![
        roster.date.to_string(),
        roster.day.as_str().to_string(),
        roster.to_csv(),
    ]
}

/// Roster for `date` from data rows.
pub fn find_roster(rows: &Rows, date: NaiveDate) -> Option<DateRoster> {
    let wanted = date.to_string();
    rows.iter()
        .filter(|r| cell(r, 0) == wanted)
        .find_map(|r| {
            skip_malformed(
                Collection::Schedules,
                r,
                DateRoster::new(date, DateRoster::parse_csv(cell(r, 2))),
            )
        })
}

/// Key of a request row.
pub fn request_key(week_start: NaiveDate, employee_id: EmployeeId) -> Vec<String> {
    vec![week_start.to_string(), employee_id.to_string()]
}

/// Row for a weekly request.
pub fn encode_request(request: &WeeklyRequest) -> Vec<String> {
    vec![
        request.week_start.to_string(),
        request.employee_id.to_string(),
        WeeklyRequest::days_csv(&request.days_requested),
        WeeklyRequest::days_csv(&request.days_skipped),
    ]
}

/// Requests for `week_start` from data rows.
pub fn decode_requests(rows: &Rows, week_start: NaiveDate) -> Vec<WeeklyRequest> {
    let wanted = week_start.to_string();
    rows.iter()
        .filter(|r| cell(r, 0) == wanted)
        .filter_map(|r| {
            let parsed = parse_id(cell(r, 1)).and_then(|id| {
                let requested = WeeklyRequest::parse_days(cell(r, 2))?;
                let skipped = WeeklyRequest::parse_days(cell(r, 3))?;
                Ok(WeeklyRequest::new(week_start, id, requested, skipped))
            });
            skip_malformed(Collection::Requests, r, parsed)
        })
        .collect()
}

/// Rows for a date's waitlist.
pub fn encode_queue(date: NaiveDate, entries: &[QueueEntry]) -> Rows {
    entries
        .iter()
        .map(|e| vec![date.to_string(), e.employee_id.to_string(), e.employee_name.clone()])
        .collect()
}

/// Waitlist for `date` from data rows, in row order.
pub fn decode_queue(rows: &Rows, date: NaiveDate) -> Vec<QueueEntry> {
    let wanted = date.to_string();
    rows.iter()
        .filter(|r| cell(r, 0) == wanted)
        .filter_map(|r| {
            let parsed = parse_id(cell(r, 1)).map(|employee_id| QueueEntry {
                employee_id,
                employee_name: cell(r, 2).to_string(),
            });
            skip_malformed(Collection::Queue, r, parsed)
        })
        .collect()
}

/// Validate a date cell; used by callers that key rows by date.
pub fn date_cell(raw: &str) -> Result<NaiveDate, ScheduleError> {
    parse_date(raw.trim())
}
