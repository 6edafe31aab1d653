//! Live admission and FIFO waitlist for concrete dates.
//!
//! Mutations of one date are serialized by a per-date async lock, so the
//! capacity check and the append happen in one critical section even on a
//! multi-threaded runtime. Memory is updated only after the store accepted
//! the change.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::directory::Directory;
use crate::core::model::{DateRoster, EmployeeIdentity, QueueEntry};
use crate::core::notify::{Notification, Notifier};
use crate::core::store::{DayChange, ScheduleStore};
use crate::core::ScheduleError;
use crate::util::serde::EmployeeId;

/// Result of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdmissionOutcome {
    /// Seated.
    Admitted {
        /// Seats left after admission.
        free_slots: usize,
    },
    /// Already seated; nothing changed.
    AlreadyPresent {
        /// Seats currently free.
        free_slots: usize,
    },
    /// The date is full; appended to the waitlist.
    Queued {
        /// 1-based waitlist position.
        position: usize,
    },
    /// Already waitlisted; nothing changed.
    AlreadyQueued {
        /// 1-based waitlist position.
        position: usize,
    },
}

impl AdmissionOutcome {
    /// Whether the employee holds a seat afterwards.
    pub const fn is_seated(&self) -> bool {
        matches!(self, Self::Admitted { .. } | Self::AlreadyPresent { .. })
    }

    /// Turn a waitlist outcome into [`ScheduleError::CapacityExceeded`], for
    /// callers that need a seat or nothing.
    pub const fn require_seat(self) -> Result<Self, ScheduleError> {
        if self.is_seated() {
            Ok(self)
        } else {
            Err(ScheduleError::CapacityExceeded)
        }
    }
}

/// Result of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Removed from the waitlist; no seat changed hands.
    Dequeued,
    /// Seat given up.
    Released {
        /// Waitlisted employee moved into the freed seat.
        promoted: Option<EmployeeId>,
        /// Seats still free after promotion.
        free_slots: usize,
        /// Employees told about the free seats.
        notified: usize,
    },
}

/// Roster and waitlist of one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayState {
    /// Seated employees.
    pub roster: DateRoster,
    /// Waitlist, head first.
    pub queue: VecDeque<QueueEntry>,
}

impl DayState {
    fn queue_position(&self, id: EmployeeId) -> Option<usize> {
        self.queue.iter().position(|e| e.employee_id == id)
    }
}

/// Admission and waitlist engine.
pub struct AdmissionEngine {
    store: Arc<dyn ScheduleStore>,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    max_seats: usize,
    days: RwLock<HashMap<NaiveDate, DayState>>,
    locks: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl AdmissionEngine {
    /// Create an engine.
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn Notifier>,
        max_seats: usize,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            max_seats,
            days: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Seat count.
    pub const fn max_seats(&self) -> usize {
        self.max_seats
    }

    fn lock_for(&self, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(date).or_default().clone()
    }

    fn identity(&self, id: EmployeeId) -> Result<EmployeeIdentity, ScheduleError> {
        self.directory
            .identity(id)
            .ok_or(ScheduleError::UnknownEmployee(id))
    }

    async fn load(&self, date: NaiveDate) -> Result<DayState, ScheduleError> {
        if let Some(state) = self.days.read().get(&date) {
            return Ok(state.clone());
        }
        let roster = self.store.roster(date).await?;
        let queue = self.store.queue(date).await?;
        debug!(date = %date, roster_source = ?roster.source, queue_source = ?queue.source, "day state loaded");
        let state = DayState {
            roster: roster.value,
            queue: queue.value.into_iter().collect(),
        };
        Ok(self.days.write().entry(date).or_insert(state).clone())
    }

    /// Current roster of a date.
    pub async fn roster(&self, date: NaiveDate) -> Result<DateRoster, ScheduleError> {
        Ok(self.load(date).await?.roster)
    }

    /// Current waitlist of a date.
    pub async fn queue(&self, date: NaiveDate) -> Result<Vec<QueueEntry>, ScheduleError> {
        Ok(self.load(date).await?.queue.into_iter().collect())
    }

    async fn commit(&self, state: DayState, change: DayChange) -> Result<(), ScheduleError> {
        let date = change.date;
        self.store.save_day(&change).await?;
        self.days.write().insert(date, state);
        Ok(())
    }

    /// Seat an employee on a date, or waitlist them when the date is full.
    pub async fn admit(&self, date: NaiveDate, employee_id: EmployeeId) -> Result<AdmissionOutcome, ScheduleError> {
        let identity = self.identity(employee_id)?;
        let lock = self.lock_for(date);
        let _guard = lock.lock().await;

        let mut state = self.load(date).await?;
        if state.roster.contains(&identity.plain_name) {
            return Ok(AdmissionOutcome::AlreadyPresent {
                free_slots: state.roster.free_slots(self.max_seats),
            });
        }

        if state.roster.len() < self.max_seats {
            state.roster = state.roster.with(&identity.plain_name);
            // A seated employee cannot also wait for a seat.
            let was_queued = state.queue_position(employee_id).is_some();
            state.queue.retain(|e| e.employee_id != employee_id);
            let change = DayChange {
                date,
                roster: Some(state.roster.clone()),
                queue: was_queued.then(|| state.queue.iter().cloned().collect()),
            };
            let free_slots = state.roster.free_slots(self.max_seats);
            self.commit(state, change).await?;
            info!(date = %date, employee_id, free_slots, "employee admitted");
            return Ok(AdmissionOutcome::Admitted { free_slots });
        }

        if let Some(index) = state.queue_position(employee_id) {
            return Ok(AdmissionOutcome::AlreadyQueued { position: index + 1 });
        }

        state.queue.push_back(QueueEntry {
            employee_id,
            employee_name: identity.plain_name,
        });
        let position = state.queue.len();
        let change = DayChange::queue(date, state.queue.iter().cloned().collect());
        self.commit(state, change).await?;
        info!(date = %date, employee_id, position, "date full; employee waitlisted");
        Ok(AdmissionOutcome::Queued { position })
    }

    /// Give up a seat or leave the waitlist. Freed seats go to the waitlist
    /// head first; seats still free afterwards are broadcast.
    pub async fn release(&self, date: NaiveDate, employee_id: EmployeeId) -> Result<ReleaseOutcome, ScheduleError> {
        let identity = self.identity(employee_id)?;
        let lock = self.lock_for(date);
        let guard = lock.lock().await;

        let mut state = self.load(date).await?;
        let seated = state.roster.contains(&identity.plain_name);

        if !seated {
            if state.queue_position(employee_id).is_none() {
                return Err(ScheduleError::NotFound(format!(
                    "employee {employee_id} is not on {date}"
                )));
            }
            state.queue.retain(|e| e.employee_id != employee_id);
            let change = DayChange::queue(date, state.queue.iter().cloned().collect());
            self.commit(state, change).await?;
            info!(date = %date, employee_id, "employee left the waitlist");
            return Ok(ReleaseOutcome::Dequeued);
        }

        state.roster = state.roster.without(&identity.plain_name);
        let promoted = state.queue.pop_front();
        if let Some(head) = &promoted {
            let name = self
                .directory
                .identity(head.employee_id)
                .map_or_else(|| head.employee_name.clone(), |i| i.plain_name);
            if !state.roster.contains(&name) {
                state.roster = state.roster.with(&name);
            }
        }
        let change = DayChange {
            date,
            roster: Some(state.roster.clone()),
            queue: promoted
                .is_some()
                .then(|| state.queue.iter().cloned().collect()),
        };
        let free_slots = state.roster.free_slots(self.max_seats);
        let roster = state.roster.clone();
        self.commit(state, change).await?;
        drop(guard);

        info!(date = %date, employee_id, free_slots, "seat released");
        let promoted = promoted.map(|head| head.employee_id);
        if let Some(promoted_id) = promoted {
            info!(date = %date, employee_id = promoted_id, "waitlisted employee promoted");
            self.deliver(promoted_id, &Notification::Promoted { date }).await;
        }

        let mut notified = 0;
        if free_slots > 0 {
            let notification = Notification::SeatAvailable { date, free_slots };
            for id in self.broadcast_targets(&roster) {
                self.deliver(id, &notification).await;
                notified += 1;
            }
        }

        Ok(ReleaseOutcome::Released {
            promoted,
            free_slots,
            notified,
        })
    }

    /// Replace the roster of a date under its lock. The waitlist is kept:
    /// entries the new roster already seats are dropped, and waitlisted
    /// employees are promoted into seats the new roster leaves free.
    pub async fn rewrite_roster<F>(&self, date: NaiveDate, rewrite: F) -> Result<DateRoster, ScheduleError>
    where
        F: FnOnce(&DateRoster) -> Vec<String> + Send,
    {
        let lock = self.lock_for(date);
        let guard = lock.lock().await;

        let mut state = self.load(date).await?;
        let queued_before = state.queue.len();
        state.roster = DateRoster::new(date, rewrite(&state.roster))?;
        state.queue.retain(|e| !state.roster.contains(&e.employee_name));

        let mut promoted = Vec::new();
        while state.roster.len() < self.max_seats {
            let Some(head) = state.queue.pop_front() else {
                break;
            };
            let name = self
                .directory
                .identity(head.employee_id)
                .map_or_else(|| head.employee_name.clone(), |i| i.plain_name);
            if !state.roster.contains(&name) {
                state.roster = state.roster.with(&name);
            }
            promoted.push(head.employee_id);
        }

        let change = DayChange {
            date,
            roster: Some(state.roster.clone()),
            queue: (state.queue.len() != queued_before).then(|| state.queue.iter().cloned().collect()),
        };
        let roster = state.roster.clone();
        self.commit(state, change).await?;
        drop(guard);

        debug!(date = %date, seated = roster.len(), promoted = promoted.len(), "roster rewritten");
        for id in promoted {
            info!(date = %date, employee_id = id, "waitlisted employee promoted");
            self.deliver(id, &Notification::Promoted { date }).await;
        }
        Ok(roster)
    }

    fn broadcast_targets(&self, roster: &DateRoster) -> Vec<EmployeeId> {
        self.directory
            .employee_ids()
            .into_iter()
            .filter(|id| {
                self.directory
                    .identity(*id)
                    .is_some_and(|identity| !roster.contains(&identity.plain_name))
            })
            .collect()
    }

    async fn deliver(&self, employee_id: EmployeeId, notification: &Notification) {
        if let Err(err) = self.notifier.notify(employee_id, notification).await {
            warn!(employee_id, error = %err, "notification delivery failed");
        }
    }
}
