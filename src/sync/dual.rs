//! Dual-store read cascade and write-through fan-out.
//!
//! Reads: primary, then the mirror (skipped while the collection has buffered
//! writes), then the flat-file cache, then built-in defaults. A value found in
//! a remote tier is written back to the cache.
//!
//! Writes: primary first. Only after it succeeds are the cache and the mirror
//! updated; mirror failures are buffered and never reach the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::core::audit::AuditEvent;
use crate::core::model::{
    DateRoster, DefaultAssignment, EmployeeRecord, PendingEmployee, QueueEntry, WeeklyRequest,
};
use crate::core::store::{
    Collection, DayChange, LocalCache, PrimaryStore, ReadSource, ScheduleStore, Sourced,
};
use crate::core::ScheduleError;
use crate::sync::buffer::MirrorWrite;
use crate::sync::mirror::MirrorSync;
use crate::sync::rows::{self, Rows};
use crate::util::serde::EmployeeId;

mod keys {
    use chrono::NaiveDate;

    pub const ADMINS: &str = "admins";
    pub const EMPLOYEES: &str = "employees";
    pub const PENDING: &str = "pending_employees";
    pub const DEFAULT: &str = "default_schedule";

    pub fn roster(date: NaiveDate) -> String {
        format!("schedule_{date}")
    }

    pub fn queue(date: NaiveDate) -> String {
        format!("queue_{date}")
    }

    pub fn requests(week_start: NaiveDate) -> String {
        format!("requests_{week_start}")
    }
}

/// Primary + mirror + cache, combined.
pub struct DualStore {
    primary: Arc<dyn PrimaryStore>,
    mirror: Arc<MirrorSync>,
    cache: Arc<dyn LocalCache>,
    max_seats: usize,
    fallback_default: DefaultAssignment,
    fallback_admins: Vec<EmployeeId>,
}

impl DualStore {
    /// Combine the tiers. `fallback_default` and `fallback_admins` answer reads
    /// no tier can. A stored default assignment without exactly `max_seats`
    /// seats per day is skipped like a missing one.
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        mirror: Arc<MirrorSync>,
        cache: Arc<dyn LocalCache>,
        max_seats: usize,
        fallback_default: DefaultAssignment,
        fallback_admins: Vec<EmployeeId>,
    ) -> Self {
        Self {
            primary,
            mirror,
            cache,
            max_seats,
            fallback_default,
            fallback_admins,
        }
    }

    /// Mirror adapter.
    pub const fn mirror(&self) -> &Arc<MirrorSync> {
        &self.mirror
    }

    /// Primary store.
    pub const fn primary(&self) -> &Arc<dyn PrimaryStore> {
        &self.primary
    }

    fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.load(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(key, error = %err, "unreadable cache entry ignored");
                None
            }
        }
    }

    fn cache_put<T: Serialize>(&self, key: &str, value: &T) {
        let stored = serde_json::to_value(value)
            .map_err(|e| ScheduleError::malformed("cache value", e))
            .and_then(|json| self.cache.store(key, &json));
        if let Err(err) = stored {
            warn!(key, error = %err, "cache write failed");
        }
    }

    /// Non-empty mirror rows, unless writes for the collection are pending.
    async fn mirror_rows(&self, collection: Collection) -> Option<Rows> {
        if self.mirror.has_pending(collection) {
            debug!(collection = %collection, "mirror read skipped; writes pending");
            return None;
        }
        match self.mirror.read(collection).await {
            Ok(rows) if !rows.is_empty() => Some(rows),
            Ok(_) => None,
            Err(err) => {
                debug!(collection = %collection, error = %err, "mirror read failed");
                None
            }
        }
    }

    fn primary_read<T>(collection: Collection, result: Result<T, ScheduleError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(collection = %collection, error = %err, "primary read failed; falling back");
                None
            }
        }
    }

    /// Cascade for whole-collection lists: primary, mirror, cache, fallback.
    async fn list<T, D>(
        &self,
        collection: Collection,
        cache_key: &str,
        from_primary: Result<Vec<T>, ScheduleError>,
        decode: D,
        fallback: Vec<T>,
    ) -> Sourced<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        D: Fn(&Rows) -> Vec<T> + Send,
    {
        if let Some(values) = Self::primary_read(collection, from_primary).filter(|v| !v.is_empty()) {
            self.cache_put(cache_key, &values);
            return Sourced::new(values, ReadSource::Primary);
        }
        if let Some(rows) = self.mirror_rows(collection).await {
            let values = decode(&rows);
            if !values.is_empty() {
                self.cache_put(cache_key, &values);
                return Sourced::new(values, ReadSource::Mirror);
            }
        }
        if let Some(values) = self.cache_get::<Vec<T>>(cache_key).filter(|v| !v.is_empty()) {
            return Sourced::new(values, ReadSource::Cache);
        }
        Sourced::new(fallback, ReadSource::Fallback)
    }

    fn usable_default(&self, source: ReadSource, found: DefaultAssignment) -> Option<DefaultAssignment> {
        match found.validate(self.max_seats) {
            Ok(()) => Some(found),
            Err(err) => {
                let err = ScheduleError::malformed("default assignment", err);
                warn!(?source, error = %err, "stored default assignment ignored");
                None
            }
        }
    }

    async fn mirror_write(&self, collection: Collection, write: MirrorWrite) {
        let outcome = self.mirror.write(collection, write).await;
        debug!(collection = %collection, ?outcome, "mirror fan-out");
    }

    fn primary_write(what: &str, result: Result<(), ScheduleError>) -> Result<(), ScheduleError> {
        if let Err(err) = &result {
            error!(what, error = %err, "primary write failed");
        }
        result
    }
}

#[async_trait]
impl ScheduleStore for DualStore {
    async fn admins(&self) -> Result<Sourced<Vec<EmployeeId>>, ScheduleError> {
        let primary = self.primary.load_admins().await;
        Ok(self
            .list(Collection::Admins, keys::ADMINS, primary, rows::decode_admins, self.fallback_admins.clone())
            .await)
    }

    async fn employees(&self) -> Result<Sourced<Vec<EmployeeRecord>>, ScheduleError> {
        let primary = self.primary.load_employees().await;
        Ok(self
            .list(Collection::Employees, keys::EMPLOYEES, primary, rows::decode_employees, Vec::new())
            .await)
    }

    async fn pending_employees(&self) -> Result<Sourced<Vec<PendingEmployee>>, ScheduleError> {
        let primary = self.primary.load_pending().await;
        Ok(self
            .list(Collection::PendingEmployees, keys::PENDING, primary, rows::decode_pending, Vec::new())
            .await)
    }

    async fn default_assignment(&self) -> Result<Sourced<DefaultAssignment>, ScheduleError> {
        let collection = Collection::DefaultSchedule;
        if let Some(found) = Self::primary_read(collection, self.primary.load_default().await)
            .flatten()
            .and_then(|d| self.usable_default(ReadSource::Primary, d))
        {
            self.cache_put(keys::DEFAULT, &found);
            return Ok(Sourced::new(found, ReadSource::Primary));
        }
        if let Some(found) = self
            .mirror_rows(collection)
            .await
            .and_then(|r| rows::decode_default(&r))
            .and_then(|d| self.usable_default(ReadSource::Mirror, d))
        {
            self.cache_put(keys::DEFAULT, &found);
            return Ok(Sourced::new(found, ReadSource::Mirror));
        }
        if let Some(found) = self
            .cache_get::<DefaultAssignment>(keys::DEFAULT)
            .and_then(|d| self.usable_default(ReadSource::Cache, d))
        {
            return Ok(Sourced::new(found, ReadSource::Cache));
        }
        Ok(Sourced::new(self.fallback_default.clone(), ReadSource::Fallback))
    }

    async fn roster(&self, date: NaiveDate) -> Result<Sourced<DateRoster>, ScheduleError> {
        let collection = Collection::Schedules;
        let key = keys::roster(date);
        if let Some(Some(found)) = Self::primary_read(collection, self.primary.load_roster(date).await) {
            self.cache_put(&key, &found);
            return Ok(Sourced::new(found, ReadSource::Primary));
        }
        if let Some(found) = self.mirror_rows(collection).await.and_then(|r| rows::find_roster(&r, date)) {
            self.cache_put(&key, &found);
            return Ok(Sourced::new(found, ReadSource::Mirror));
        }
        if let Some(found) = self.cache_get::<DateRoster>(&key) {
            return Ok(Sourced::new(found, ReadSource::Cache));
        }
        let default = self.default_assignment().await?.value;
        Ok(Sourced::new(
            DateRoster::from_default(date, &default)?,
            ReadSource::Fallback,
        ))
    }

    async fn queue(&self, date: NaiveDate) -> Result<Sourced<Vec<QueueEntry>>, ScheduleError> {
        let primary = self.primary.load_queue(date).await;
        Ok(self
            .list(
                Collection::Queue,
                &keys::queue(date),
                primary,
                move |r: &Rows| rows::decode_queue(r, date),
                Vec::new(),
            )
            .await)
    }

    async fn requests(&self, week_start: NaiveDate) -> Result<Sourced<Vec<WeeklyRequest>>, ScheduleError> {
        let primary = self.primary.load_requests(week_start).await;
        Ok(self
            .list(
                Collection::Requests,
                &keys::requests(week_start),
                primary,
                move |r: &Rows| rows::decode_requests(r, week_start),
                Vec::new(),
            )
            .await)
    }

    async fn save_day(&self, change: &DayChange) -> Result<(), ScheduleError> {
        Self::primary_write("day", self.primary.save_day(change).await)?;
        if let Some(roster) = &change.roster {
            self.cache_put(&keys::roster(change.date), roster);
            self.mirror_write(
                Collection::Schedules,
                MirrorWrite::UpsertByKey {
                    key: rows::key(change.date),
                    row: rows::encode_roster(roster),
                },
            )
            .await;
        }
        if let Some(queue) = &change.queue {
            self.cache_put(&keys::queue(change.date), queue);
            self.mirror_write(
                Collection::Queue,
                MirrorWrite::ReplaceByKey {
                    key: rows::key(change.date),
                    rows: rows::encode_queue(change.date, queue),
                },
            )
            .await;
        }
        Ok(())
    }

    async fn save_default(&self, assignment: &DefaultAssignment) -> Result<(), ScheduleError> {
        Self::primary_write("default assignment", self.primary.save_default(assignment).await)?;
        self.cache_put(keys::DEFAULT, assignment);
        self.mirror_write(
            Collection::DefaultSchedule,
            MirrorWrite::ReplaceAll {
                rows: rows::encode_default(assignment),
            },
        )
        .await;
        Ok(())
    }

    async fn save_request(&self, request: &WeeklyRequest) -> Result<(), ScheduleError> {
        Self::primary_write("request", self.primary.save_request(request).await)?;
        let key = keys::requests(request.week_start);
        let mut cached: Vec<WeeklyRequest> = self.cache_get(&key).unwrap_or_default();
        cached.retain(|r| r.employee_id != request.employee_id);
        cached.push(request.clone());
        self.cache_put(&key, &cached);
        self.mirror_write(
            Collection::Requests,
            MirrorWrite::UpsertByKey {
                key: rows::request_key(request.week_start, request.employee_id),
                row: rows::encode_request(request),
            },
        )
        .await;
        Ok(())
    }

    async fn clear_requests(&self, week_start: NaiveDate) -> Result<(), ScheduleError> {
        Self::primary_write("clear requests", self.primary.clear_requests(week_start).await)?;
        self.cache_put(&keys::requests(week_start), &Vec::<WeeklyRequest>::new());
        self.mirror_write(
            Collection::Requests,
            MirrorWrite::DeleteByKey {
                key: rows::key(week_start),
            },
        )
        .await;
        Ok(())
    }

    async fn save_employee(&self, record: &EmployeeRecord) -> Result<(), ScheduleError> {
        Self::primary_write("employee", self.primary.save_employee(record).await)?;
        let mut cached: Vec<EmployeeRecord> = self.cache_get(keys::EMPLOYEES).unwrap_or_default();
        cached.retain(|e| e.id != record.id);
        cached.push(record.clone());
        self.cache_put(keys::EMPLOYEES, &cached);
        self.mirror_write(
            Collection::Employees,
            MirrorWrite::UpsertByKey {
                key: rows::key(record.id),
                row: rows::encode_employee(record),
            },
        )
        .await;
        Ok(())
    }

    async fn add_admin(&self, id: EmployeeId) -> Result<(), ScheduleError> {
        Self::primary_write("admin", self.primary.add_admin(id).await)?;
        let mut cached: Vec<EmployeeId> = self.cache_get(keys::ADMINS).unwrap_or_default();
        if !cached.contains(&id) {
            cached.push(id);
        }
        self.cache_put(keys::ADMINS, &cached);
        self.mirror_write(
            Collection::Admins,
            MirrorWrite::UpsertByKey {
                key: rows::key(id),
                row: rows::encode_admin(id),
            },
        )
        .await;
        Ok(())
    }

    async fn remove_admin(&self, id: EmployeeId) -> Result<(), ScheduleError> {
        Self::primary_write("admin removal", self.primary.remove_admin(id).await)?;
        let mut cached: Vec<EmployeeId> = self.cache_get(keys::ADMINS).unwrap_or_default();
        cached.retain(|a| *a != id);
        self.cache_put(keys::ADMINS, &cached);
        self.mirror_write(Collection::Admins, MirrorWrite::DeleteByKey { key: rows::key(id) })
            .await;
        Ok(())
    }

    async fn save_pending(&self, pending: &PendingEmployee) -> Result<(), ScheduleError> {
        Self::primary_write("pending employee", self.primary.save_pending(pending).await)?;
        let mut cached: Vec<PendingEmployee> = self.cache_get(keys::PENDING).unwrap_or_default();
        cached.retain(|p| p.username != pending.username);
        cached.push(pending.clone());
        self.cache_put(keys::PENDING, &cached);
        self.mirror_write(
            Collection::PendingEmployees,
            MirrorWrite::UpsertByKey {
                key: rows::key(&pending.username),
                row: rows::encode_pending(pending),
            },
        )
        .await;
        Ok(())
    }

    async fn remove_pending(&self, username: &str) -> Result<(), ScheduleError> {
        Self::primary_write("pending removal", self.primary.remove_pending(username).await)?;
        let mut cached: Vec<PendingEmployee> = self.cache_get(keys::PENDING).unwrap_or_default();
        cached.retain(|p| p.username != username);
        self.cache_put(keys::PENDING, &cached);
        self.mirror_write(
            Collection::PendingEmployees,
            MirrorWrite::DeleteByKey {
                key: rows::key(username),
            },
        )
        .await;
        Ok(())
    }

    async fn append_log(&self, event: &AuditEvent) {
        if let Err(err) = self.primary.append_log(event).await {
            warn!(action = %event.action, error = %err, "audit append to primary failed");
        }
        self.mirror_write(Collection::Logs, MirrorWrite::Append { row: event.to_row() })
            .await;
    }
}
