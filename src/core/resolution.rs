//! Schedule resolution: default assignment plus weekly requests to per-day rosters.
//!
//! Skips are applied for every request before any additions, so a seat given
//! up by one employee is visible to every other request of the same week.
//! Additions beyond capacity are dropped; requests never create waitlist
//! entries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::directory::Directory;
use crate::core::model::{week_dates, DateRoster, DefaultAssignment, WeeklyRequest, WorkDay};
use crate::core::ScheduleError;
use crate::util::serde::EmployeeId;

/// A request addition that did not fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRequest {
    /// Requesting employee.
    pub employee_id: EmployeeId,
    /// Day that was full.
    pub day: WorkDay,
}

/// Resolved rosters for one week, as plain names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWeek {
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Occupants per workday.
    pub days: BTreeMap<WorkDay, Vec<String>>,
    /// Additions dropped for lack of seats.
    pub dropped: Vec<DroppedRequest>,
}

impl ResolvedWeek {
    /// Occupants of one day.
    pub fn day(&self, day: WorkDay) -> &[String] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Concrete rosters for each date of the week.
    pub fn rosters(&self) -> Result<Vec<DateRoster>, ScheduleError> {
        week_dates(self.week_start)
            .into_iter()
            .map(|(date, day)| DateRoster::new(date, self.day(day).to_vec()))
            .collect()
    }

    /// Names rendered for presentation (`Name(@username)` where known).
    pub fn display(&self, directory: &dyn Directory) -> BTreeMap<WorkDay, Vec<String>> {
        self.days
            .iter()
            .map(|(day, names)| (*day, names.iter().map(|n| display_name(directory, n)).collect()))
            .collect()
    }
}

/// Presentation form of a plain name via the directory.
pub fn display_name(directory: &dyn Directory, plain_name: &str) -> String {
    directory
        .find_by_name(plain_name)
        .and_then(|id| directory.identity(id))
        .map_or_else(|| plain_name.to_string(), |identity| identity.display())
}

/// Applies weekly requests to the default assignment.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleResolver {
    max_seats: usize,
}

impl ScheduleResolver {
    /// Resolver for an office with `max_seats` seats.
    pub const fn new(max_seats: usize) -> Self {
        Self { max_seats }
    }

    /// Seat count.
    pub const fn max_seats(&self) -> usize {
        self.max_seats
    }

    /// Resolve a week. Requests from employees missing in the directory are skipped.
    pub fn resolve(
        &self,
        week_start: NaiveDate,
        default: &DefaultAssignment,
        requests: &[WeeklyRequest],
        directory: &dyn Directory,
    ) -> ResolvedWeek {
        let known = known_requests(requests, directory);
        let mut days = BTreeMap::new();
        let mut dropped = Vec::new();
        for day in WorkDay::ALL {
            let (names, day_dropped) = self.merge(day, default.roster_for(day), &known);
            days.insert(day, names);
            dropped.extend(day_dropped);
        }
        ResolvedWeek {
            week_start,
            days,
            dropped,
        }
    }

    /// Apply the week's requests to one day's occupants.
    ///
    /// `base` is whatever the day holds now: the default seats for a day never
    /// written, or a stored roster that live admission already changed. The
    /// merge is idempotent, so running it again over its own output is a no-op.
    pub fn resolve_day(
        &self,
        day: WorkDay,
        base: Vec<String>,
        requests: &[WeeklyRequest],
        directory: &dyn Directory,
    ) -> (Vec<String>, Vec<DroppedRequest>) {
        self.merge(day, base, &known_requests(requests, directory))
    }

    fn merge(
        &self,
        day: WorkDay,
        mut names: Vec<String>,
        known: &[(&WeeklyRequest, String)],
    ) -> (Vec<String>, Vec<DroppedRequest>) {
        for (req, name) in known {
            if req.days_skipped.contains(&day) {
                names.retain(|n| n != name);
            }
        }

        let mut dropped = Vec::new();
        for (req, name) in known {
            if !req.days_requested.contains(&day) || req.days_skipped.contains(&day) {
                continue;
            }
            if names.iter().any(|n| n == name) {
                continue;
            }
            if names.len() < self.max_seats {
                names.push(name.clone());
            } else {
                debug!(employee_id = req.employee_id, day = %day, "requested day is full; dropped");
                dropped.push(DroppedRequest {
                    employee_id: req.employee_id,
                    day,
                });
            }
        }
        (names, dropped)
    }
}

fn known_requests<'a>(
    requests: &'a [WeeklyRequest],
    directory: &dyn Directory,
) -> Vec<(&'a WeeklyRequest, String)> {
    requests
        .iter()
        .filter_map(|req| match directory.identity(req.employee_id) {
            Some(identity) => Some((req, identity.plain_name)),
            None => {
                warn!(employee_id = req.employee_id, "request from unknown employee ignored");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::directory::StaticDirectory;
    use crate::core::model::EmployeeRecord;

    fn directory(names: &[(EmployeeId, &str)]) -> StaticDirectory {
        StaticDirectory::from_records(
            names.iter().map(|(id, name)| EmployeeRecord {
                id: *id,
                manual_name: (*name).into(),
                display_name: (*name).into(),
                username: None,
                approved: true,
            }),
            [],
            [],
        )
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
    }

    #[test]
    fn test_no_requests_yields_default() {
        let default = DefaultAssignment::empty(2).with_day(WorkDay::Monday, &["Ann", "Bob"]);
        let week = ScheduleResolver::new(2).resolve(monday(), &default, &[], &directory(&[]));
        assert_eq!(week.day(WorkDay::Monday), ["Ann", "Bob"]);
        assert!(week.day(WorkDay::Tuesday).is_empty());
    }

    #[test]
    fn test_full_day_drops_request() {
        let default = DefaultAssignment::empty(2).with_day(WorkDay::Monday, &["Ann", "Bob"]);
        let dir = directory(&[(3, "Cid")]);
        let req = WeeklyRequest::new(monday(), 3, [WorkDay::Monday, WorkDay::Tuesday], []);
        let week = ScheduleResolver::new(2).resolve(monday(), &default, &[req], &dir);
        assert_eq!(week.day(WorkDay::Monday), ["Ann", "Bob"]);
        assert_eq!(week.day(WorkDay::Tuesday), ["Cid"]);
        assert_eq!(
            week.dropped,
            vec![DroppedRequest {
                employee_id: 3,
                day: WorkDay::Monday
            }]
        );
    }

    #[test]
    fn test_skip_frees_seat_for_other_request() {
        let default = DefaultAssignment::empty(2).with_day(WorkDay::Monday, &["Ann", "Bob"]);
        let dir = directory(&[(1, "Ann"), (3, "Cid")]);
        let add = WeeklyRequest::new(monday(), 3, [WorkDay::Monday], []);
        let skip = WeeklyRequest::new(monday(), 1, [], [WorkDay::Monday]);
        let week = ScheduleResolver::new(2).resolve(monday(), &default, &[add, skip], &dir);
        assert_eq!(week.day(WorkDay::Monday), ["Bob", "Cid"]);
        assert!(week.dropped.is_empty());
    }

    #[test]
    fn test_resolve_day_merges_onto_live_roster() {
        let dir = directory(&[(1, "Ann"), (3, "Cid"), (4, "Dan")]);
        let requests = [
            WeeklyRequest::new(monday(), 1, [], [WorkDay::Monday]),
            WeeklyRequest::new(monday(), 3, [WorkDay::Monday], []),
            WeeklyRequest::new(monday(), 4, [WorkDay::Monday], []),
        ];
        let resolver = ScheduleResolver::new(2);
        let live = vec!["Ann".to_string(), "Eve".to_string()];

        let (names, dropped) = resolver.resolve_day(WorkDay::Monday, live, &requests, &dir);
        assert_eq!(names, ["Eve", "Cid"]);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].employee_id, 4);

        let (again, _) = resolver.resolve_day(WorkDay::Monday, names.clone(), &requests, &dir);
        assert_eq!(again, names);
    }
}
