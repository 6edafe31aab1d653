//! In-memory primary store for development and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::core::{
    AuditEvent, DateRoster, DayChange, DefaultAssignment, EmployeeRecord, PendingEmployee,
    PrimaryStore, QueueEntry, ScheduleError, WeeklyRequest,
};
use crate::util::serde::EmployeeId;

#[derive(Debug, Default)]
struct Tables {
    admins: BTreeSet<EmployeeId>,
    employees: BTreeMap<EmployeeId, EmployeeRecord>,
    pending: BTreeMap<String, PendingEmployee>,
    default: Option<DefaultAssignment>,
    schedules: BTreeMap<NaiveDate, DateRoster>,
    queue: BTreeMap<NaiveDate, Vec<QueueEntry>>,
    requests: BTreeMap<(NaiveDate, EmployeeId), WeeklyRequest>,
    logs: Vec<AuditEvent>,
}

/// Primary store held in process memory, with switches to simulate outages.
#[derive(Debug, Default)]
pub struct InMemoryPrimary {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    write_budget: Mutex<Option<usize>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryPrimary {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
        *self.write_budget.lock() = None;
    }

    /// Accept `writes` more data writes, then fail every write until
    /// [`InMemoryPrimary::set_fail_writes`] resets the store.
    pub fn fail_writes_after(&self, writes: usize) {
        *self.write_budget.lock() = Some(writes);
    }

    /// Make every call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Successful data writes so far; log appends are not counted.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored audit events.
    pub fn logs(&self) -> Vec<AuditEvent> {
        self.tables.lock().logs.clone()
    }

    fn check_read(&self) -> Result<(), ScheduleError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScheduleError::primary("in-memory primary marked unavailable"));
        }
        Ok(())
    }

    fn write<F>(&self, apply: F) -> Result<(), ScheduleError>
    where
        F: FnOnce(&mut Tables),
    {
        self.check_read()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ScheduleError::primary("in-memory primary rejecting writes"));
        }
        if let Some(budget) = self.write_budget.lock().as_mut() {
            if *budget == 0 {
                return Err(ScheduleError::primary("in-memory primary write budget spent"));
            }
            *budget -= 1;
        }
        apply(&mut *self.tables.lock());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read<T, F>(&self, read: F) -> Result<T, ScheduleError>
    where
        F: FnOnce(&Tables) -> T,
    {
        self.check_read()?;
        Ok(read(&*self.tables.lock()))
    }
}

#[async_trait]
impl PrimaryStore for InMemoryPrimary {
    async fn load_admins(&self) -> Result<Vec<EmployeeId>, ScheduleError> {
        self.read(|t| t.admins.iter().copied().collect())
    }

    async fn add_admin(&self, id: EmployeeId) -> Result<(), ScheduleError> {
        self.write(|t| {
            t.admins.insert(id);
        })
    }

    async fn remove_admin(&self, id: EmployeeId) -> Result<(), ScheduleError> {
        self.write(|t| {
            t.admins.remove(&id);
        })
    }

    async fn load_employees(&self) -> Result<Vec<EmployeeRecord>, ScheduleError> {
        self.read(|t| t.employees.values().cloned().collect())
    }

    async fn save_employee(&self, record: &EmployeeRecord) -> Result<(), ScheduleError> {
        self.write(|t| {
            t.employees.insert(record.id, record.clone());
        })
    }

    async fn load_pending(&self) -> Result<Vec<PendingEmployee>, ScheduleError> {
        self.read(|t| t.pending.values().cloned().collect())
    }

    async fn save_pending(&self, pending: &PendingEmployee) -> Result<(), ScheduleError> {
        self.write(|t| {
            t.pending.insert(pending.username.clone(), pending.clone());
        })
    }

    async fn remove_pending(&self, username: &str) -> Result<(), ScheduleError> {
        self.write(|t| {
            t.pending.remove(username);
        })
    }

    async fn load_default(&self) -> Result<Option<DefaultAssignment>, ScheduleError> {
        self.read(|t| t.default.clone())
    }

    async fn save_default(&self, assignment: &DefaultAssignment) -> Result<(), ScheduleError> {
        self.write(|t| t.default = Some(assignment.clone()))
    }

    async fn load_roster(&self, date: NaiveDate) -> Result<Option<DateRoster>, ScheduleError> {
        self.read(|t| t.schedules.get(&date).cloned())
    }

    async fn load_queue(&self, date: NaiveDate) -> Result<Vec<QueueEntry>, ScheduleError> {
        self.read(|t| t.queue.get(&date).cloned().unwrap_or_default())
    }

    async fn save_day(&self, change: &DayChange) -> Result<(), ScheduleError> {
        self.write(|t| {
            if let Some(roster) = &change.roster {
                t.schedules.insert(change.date, roster.clone());
            }
            if let Some(queue) = &change.queue {
                t.queue.insert(change.date, queue.clone());
            }
        })
    }

    async fn load_requests(&self, week_start: NaiveDate) -> Result<Vec<WeeklyRequest>, ScheduleError> {
        self.read(|t| {
            t.requests
                .range((week_start, EmployeeId::MIN)..=(week_start, EmployeeId::MAX))
                .map(|(_, r)| r.clone())
                .collect()
        })
    }

    async fn save_request(&self, request: &WeeklyRequest) -> Result<(), ScheduleError> {
        self.write(|t| {
            t.requests
                .insert((request.week_start, request.employee_id), request.clone());
        })
    }

    async fn clear_requests(&self, week_start: NaiveDate) -> Result<(), ScheduleError> {
        self.write(|t| t.requests.retain(|(week, _), _| *week != week_start))
    }

    async fn append_log(&self, event: &AuditEvent) -> Result<(), ScheduleError> {
        self.check_read()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ScheduleError::primary("in-memory primary rejecting writes"));
        }
        self.tables.lock().logs.push(event.clone());
        Ok(())
    }
}
