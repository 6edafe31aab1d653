//! Domain model: workdays, seats, assignments, rosters, requests and waitlist entries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::core::ScheduleError;
use crate::util::serde::EmployeeId;

/// Seat count of the office when configuration does not override it.
pub const DEFAULT_MAX_SEATS: usize = 8;

/// A day of the working week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkDay {
    /// Monday.
    Monday,
    /// Tuesday.
    Tuesday,
    /// Wednesday.
    Wednesday,
    /// Thursday.
    Thursday,
    /// Friday.
    Friday,
}

impl WorkDay {
    /// All workdays in week order.
    pub const ALL: [Self; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];

    /// Canonical storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }

    /// Three-letter abbreviation for compact listings.
    pub const fn short(self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
        }
    }

    /// Days since Monday.
    pub const fn offset(self) -> i64 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
        }
    }

    /// The workday a calendar date falls on, or `None` on weekends.
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        match date.weekday() {
            Weekday::Mon => Some(Self::Monday),
            Weekday::Tue => Some(Self::Tuesday),
            Weekday::Wed => Some(Self::Wednesday),
            Weekday::Thu => Some(Self::Thursday),
            Weekday::Fri => Some(Self::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }

    /// Parse a day name. Accepts English and Russian full and short forms,
    /// case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "monday" | "mon" | "понедельник" | "пн" => Some(Self::Monday),
            "tuesday" | "tue" | "вторник" | "вт" => Some(Self::Tuesday),
            "wednesday" | "wed" | "среда" | "ср" => Some(Self::Wednesday),
            "thursday" | "thu" | "четверг" | "чт" => Some(Self::Thursday),
            "friday" | "fri" | "пятница" | "пт" => Some(Self::Friday),
            _ => None,
        }
    }

    /// Calendar date of this day in the week starting at `week_start`.
    pub fn date_in(self, week_start: NaiveDate) -> NaiveDate {
        week_start + Duration::days(self.offset())
    }
}

impl fmt::Display for WorkDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ScheduleError::malformed("day name", s))
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Whether `date` is a Monday.
pub fn is_week_start(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// Monday..Friday dates of the week starting at `week_start`.
pub fn week_dates(week_start: NaiveDate) -> Vec<(NaiveDate, WorkDay)> {
    WorkDay::ALL
        .iter()
        .map(|day| (day.date_in(week_start), *day))
        .collect()
}

/// Stable seat identifier `section.index`, e.g. `1.6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatKey {
    /// Office section.
    pub section: u16,
    /// Seat number within the section.
    pub index: u16,
}

impl SeatKey {
    /// Build a key from its parts.
    pub const fn new(section: u16, index: u16) -> Self {
        Self { section, index }
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.index)
    }
}

impl FromStr for SeatKey {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (section, index) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| ScheduleError::malformed("seat key", s))?;
        let section = section
            .parse()
            .map_err(|_| ScheduleError::malformed("seat section", s))?;
        let index = index
            .parse()
            .map_err(|_| ScheduleError::malformed("seat index", s))?;
        Ok(Self { section, index })
    }
}

impl TryFrom<String> for SeatKey {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatKey> for String {
    fn from(key: SeatKey) -> Self {
        key.to_string()
    }
}

/// Admin-edited baseline: for each workday, seat key to employee name.
///
/// An empty name marks a free default seat; seats are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultAssignment {
    days: BTreeMap<WorkDay, BTreeMap<SeatKey, String>>,
}

impl DefaultAssignment {
    /// Wrap an already-built day map.
    pub const fn from_days(days: BTreeMap<WorkDay, BTreeMap<SeatKey, String>>) -> Self {
        Self { days }
    }

    /// Every workday with seats `1.1..=1.max_seats`, all free.
    pub fn empty(max_seats: usize) -> Self {
        let seats: BTreeMap<SeatKey, String> = (1..=max_seats)
            .map(|i| (SeatKey::new(1, u16::try_from(i).unwrap_or(u16::MAX)), String::new()))
            .collect();
        let days = WorkDay::ALL.iter().map(|d| (*d, seats.clone())).collect();
        Self { days }
    }

    /// Fill a day's seats in key order with the given names.
    /// Extra names are ignored; missing names leave seats free.
    #[must_use]
    pub fn with_day(mut self, day: WorkDay, names: &[&str]) -> Self {
        if let Some(seats) = self.days.get_mut(&day) {
            for (slot, name) in seats.values_mut().zip(names.iter().copied().chain(std::iter::repeat(""))) {
                *slot = name.to_string();
            }
        }
        self
    }

    /// Replace one day's seat map.
    pub fn insert_day(&mut self, day: WorkDay, seats: BTreeMap<SeatKey, String>) {
        self.days.insert(day, seats);
    }

    /// Seat map for a day.
    pub fn seats(&self, day: WorkDay) -> Option<&BTreeMap<SeatKey, String>> {
        self.days.get(&day)
    }

    /// All days.
    pub const fn days(&self) -> &BTreeMap<WorkDay, BTreeMap<SeatKey, String>> {
        &self.days
    }

    /// Assign a seat. The seat must already exist for that day.
    pub fn set_seat(
        &mut self,
        day: WorkDay,
        seat: SeatKey,
        name: impl Into<String>,
    ) -> Result<(), ScheduleError> {
        let slot = self
            .days
            .get_mut(&day)
            .and_then(|seats| seats.get_mut(&seat))
            .ok_or_else(|| ScheduleError::InvalidAssignment(format!("no seat {seat} on {day}")))?;
        *slot = name.into().trim().to_string();
        Ok(())
    }

    /// Free a seat without removing its key.
    pub fn clear_seat(&mut self, day: WorkDay, seat: SeatKey) -> Result<(), ScheduleError> {
        self.set_seat(day, seat, "")
    }

    /// Occupants of a day in seat order, free seats skipped.
    pub fn roster_for(&self, day: WorkDay) -> Vec<String> {
        self.days
            .get(&day)
            .map(|seats| {
                seats
                    .values()
                    .map(|name| name.trim())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `plain_name` holds a default seat on `day`.
    pub fn contains(&self, day: WorkDay, plain_name: &str) -> bool {
        self.days
            .get(&day)
            .is_some_and(|seats| seats.values().any(|n| n.trim() == plain_name))
    }

    /// Check that every workday has exactly `max_seats` seats and that nobody
    /// holds two seats on the same day.
    pub fn validate(&self, max_seats: usize) -> Result<(), ScheduleError> {
        for day in WorkDay::ALL {
            let seats = self
                .days
                .get(&day)
                .ok_or_else(|| ScheduleError::InvalidAssignment(format!("{day} is missing")))?;
            if seats.len() != max_seats {
                return Err(ScheduleError::InvalidAssignment(format!(
                    "{day} has {} seats, expected {max_seats}",
                    seats.len()
                )));
            }
            let mut seen = BTreeSet::new();
            for name in seats.values().map(|n| n.trim()).filter(|n| !n.is_empty()) {
                if !seen.insert(name) {
                    return Err(ScheduleError::InvalidAssignment(format!(
                        "{name} holds two seats on {day}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Who an employee is, independent of how they are displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeIdentity {
    /// Name used for roster membership and comparisons.
    pub plain_name: String,
    /// Chat username without the `@`.
    pub username: Option<String>,
}

impl EmployeeIdentity {
    /// Build an identity.
    pub fn new(plain_name: impl Into<String>, username: Option<String>) -> Self {
        Self {
            plain_name: plain_name.into(),
            username: username.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Presentation form: `Name` or `Name(@username)`.
    pub fn display(&self) -> String {
        match &self.username {
            Some(username) => format!("{}(@{})", self.plain_name, username.trim_start_matches('@')),
            None => self.plain_name.clone(),
        }
    }
}

/// Strip a legacy `(@username)` suffix from a stored roster cell.
pub fn strip_username(cell: &str) -> &str {
    let cell = cell.trim();
    match cell.find("(@") {
        Some(pos) if cell.ends_with(')') => cell[..pos].trim_end(),
        _ => cell,
    }
}

/// A registered employee as persisted in the `employees` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// Directory id.
    pub id: EmployeeId,
    /// Name entered by an administrator; the plain identity.
    pub manual_name: String,
    /// Name reported by the chat platform.
    pub display_name: String,
    /// Chat username.
    pub username: Option<String>,
    /// Whether an administrator approved this employee.
    pub approved: bool,
}

impl EmployeeRecord {
    /// Structured identity of this employee.
    pub fn identity(&self) -> EmployeeIdentity {
        EmployeeIdentity::new(self.manual_name.clone(), self.username.clone())
    }
}

/// An employee added by username before they contacted the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEmployee {
    /// Chat username.
    pub username: String,
    /// Name entered by an administrator.
    pub manual_name: String,
}

/// Concrete roster for one date. Holds plain names in seat-fill order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRoster {
    /// Calendar date.
    pub date: NaiveDate,
    /// Workday of `date`.
    pub day: WorkDay,
    /// Seated employees.
    pub employees: Vec<String>,
}

impl DateRoster {
    /// Build a roster, rejecting weekend dates.
    pub fn new(date: NaiveDate, employees: Vec<String>) -> Result<Self, ScheduleError> {
        let day = WorkDay::from_date(date).ok_or(ScheduleError::NotAWorkday(date))?;
        Ok(Self {
            date,
            day,
            employees,
        })
    }

    /// Materialize the default assignment for `date`.
    pub fn from_default(date: NaiveDate, default: &DefaultAssignment) -> Result<Self, ScheduleError> {
        let day = WorkDay::from_date(date).ok_or(ScheduleError::NotAWorkday(date))?;
        Ok(Self {
            date,
            day,
            employees: default.roster_for(day),
        })
    }

    /// Number of occupied seats.
    pub fn len(&self) -> usize {
        self.employees.len()
    }

    /// Whether nobody is seated.
    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    /// Seats still free under `max_seats`.
    pub fn free_slots(&self, max_seats: usize) -> usize {
        max_seats.saturating_sub(self.employees.len())
    }

    /// Whether `plain_name` is seated.
    pub fn contains(&self, plain_name: &str) -> bool {
        self.employees.iter().any(|e| e == plain_name)
    }

    /// Copy with `plain_name` appended.
    #[must_use]
    pub fn with(&self, plain_name: &str) -> Self {
        let mut next = self.clone();
        next.employees.push(plain_name.to_string());
        next
    }

    /// Copy with every occurrence of `plain_name` removed.
    #[must_use]
    pub fn without(&self, plain_name: &str) -> Self {
        let mut next = self.clone();
        next.employees.retain(|e| e != plain_name);
        next
    }

    /// Comma-joined storage form.
    pub fn to_csv(&self) -> String {
        self.employees.join(", ")
    }

    /// Parse the storage form, normalizing legacy display cells.
    pub fn parse_csv(csv: &str) -> Vec<String> {
        csv.split(',')
            .map(strip_username)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One employee's overrides for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRequest {
    /// Monday of the target week.
    pub week_start: NaiveDate,
    /// Requesting employee.
    pub employee_id: EmployeeId,
    /// Extra office days wanted.
    pub days_requested: BTreeSet<WorkDay>,
    /// Default days given up.
    pub days_skipped: BTreeSet<WorkDay>,
}

impl WeeklyRequest {
    /// Build a request. A day named in both sets is kept only as skipped.
    pub fn new(
        week_start: NaiveDate,
        employee_id: EmployeeId,
        requested: impl IntoIterator<Item = WorkDay>,
        skipped: impl IntoIterator<Item = WorkDay>,
    ) -> Self {
        let days_skipped: BTreeSet<WorkDay> = skipped.into_iter().collect();
        let days_requested = requested
            .into_iter()
            .filter(|d| !days_skipped.contains(d))
            .collect();
        Self {
            week_start,
            employee_id,
            days_requested,
            days_skipped,
        }
    }

    /// Translate "these are my office days" into overrides against the default:
    /// default days not wanted are skipped, wanted days are requested.
    pub fn from_desired_days(
        week_start: NaiveDate,
        employee_id: EmployeeId,
        plain_name: &str,
        desired: &[WorkDay],
        default: &DefaultAssignment,
    ) -> Self {
        let mut requested = Vec::new();
        let mut skipped = Vec::new();
        for day in WorkDay::ALL {
            let wanted = desired.contains(&day);
            if wanted {
                requested.push(day);
            } else if default.contains(day, plain_name) {
                skipped.push(day);
            }
        }
        Self::new(week_start, employee_id, requested, skipped)
    }

    /// Ask for a day; undoes an earlier skip of the same day.
    pub fn request_day(&mut self, day: WorkDay) {
        self.days_skipped.remove(&day);
        self.days_requested.insert(day);
    }

    /// Give up a day; undoes an earlier request of the same day.
    pub fn skip_day(&mut self, day: WorkDay) {
        self.days_requested.remove(&day);
        self.days_skipped.insert(day);
    }

    /// Comma-joined storage form of a day set.
    pub fn days_csv(days: &BTreeSet<WorkDay>) -> String {
        days.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(",")
    }

    /// Parse a comma-joined day set.
    pub fn parse_days(csv: &str) -> Result<BTreeSet<WorkDay>, ScheduleError> {
        csv.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect()
    }
}

/// A waitlisted employee for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Waiting employee.
    pub employee_id: EmployeeId,
    /// Plain name captured when queued.
    pub employee_name: String,
}
