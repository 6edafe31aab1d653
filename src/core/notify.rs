//! Outbound notifications to employees.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::model::WorkDay;
use crate::core::AppResult;
use crate::util::serde::EmployeeId;

/// Message delivered to an employee after a roster change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The employee moved from the waitlist into a seat.
    Promoted {
        /// Date of the seat.
        date: NaiveDate,
    },
    /// Seats are free for a date the employee is not on.
    SeatAvailable {
        /// Date with free seats.
        date: NaiveDate,
        /// Number of free seats.
        free_slots: usize,
    },
    /// Requests for the coming week close on Sunday evening.
    RequestReminder {
        /// Monday of the week being planned.
        week_start: NaiveDate,
    },
    /// Final schedule of the coming week for one employee.
    WeekSchedule {
        /// Monday of the week.
        week_start: NaiveDate,
        /// Days with a seat.
        office_days: Vec<WorkDay>,
        /// Days without one.
        remote_days: Vec<WorkDay>,
        /// Free seats on the remote days that still have some.
        free_slots: BTreeMap<WorkDay, usize>,
    },
}

/// Delivery channel. Failures are logged by the caller and never undo a
/// committed roster change.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn notify(&self, employee_id: EmployeeId, notification: &Notification) -> AppResult<()>;
}
