//! Employee directory seam.
//!
//! The engines only need an id-to-identity lookup, the admin predicate and the
//! list of employees eligible for availability broadcasts.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::core::model::{EmployeeIdentity, EmployeeRecord, PendingEmployee};
use crate::util::serde::EmployeeId;

/// Read-side directory collaborator.
pub trait Directory: Send + Sync {
    /// Identity of an employee, if known.
    fn identity(&self, id: EmployeeId) -> Option<EmployeeIdentity>;

    /// Whether the employee is an administrator.
    fn is_admin(&self, id: EmployeeId) -> bool;

    /// Approved employees, in id order.
    fn employee_ids(&self) -> Vec<EmployeeId>;

    /// Look an employee up by plain name.
    fn find_by_name(&self, plain_name: &str) -> Option<EmployeeId>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    employees: BTreeMap<EmployeeId, EmployeeRecord>,
    admins: BTreeSet<EmployeeId>,
    pending: BTreeMap<String, PendingEmployee>,
}

/// In-process directory loaded from the store at startup and kept current by
/// the service after each successful directory write.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    state: RwLock<DirectoryState>,
}

impl StaticDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loaded records.
    pub fn from_records(
        employees: impl IntoIterator<Item = EmployeeRecord>,
        admins: impl IntoIterator<Item = EmployeeId>,
        pending: impl IntoIterator<Item = PendingEmployee>,
    ) -> Self {
        let dir = Self::new();
        dir.replace(employees, admins, pending);
        dir
    }

    /// Swap the whole directory content.
    pub fn replace(
        &self,
        employees: impl IntoIterator<Item = EmployeeRecord>,
        admins: impl IntoIterator<Item = EmployeeId>,
        pending: impl IntoIterator<Item = PendingEmployee>,
    ) {
        let mut state = self.state.write();
        state.employees = employees.into_iter().map(|e| (e.id, e)).collect();
        state.admins = admins.into_iter().collect();
        state.pending = pending
            .into_iter()
            .map(|p| (normalize_username(&p.username), p))
            .collect();
    }

    /// Insert or replace an employee record.
    pub fn upsert(&self, record: EmployeeRecord) {
        self.state.write().employees.insert(record.id, record);
    }

    /// Full record for an employee.
    pub fn record(&self, id: EmployeeId) -> Option<EmployeeRecord> {
        self.state.read().employees.get(&id).cloned()
    }

    /// Grant or revoke admin rights.
    pub fn set_admin(&self, id: EmployeeId, admin: bool) {
        let mut state = self.state.write();
        if admin {
            state.admins.insert(id);
        } else {
            state.admins.remove(&id);
        }
    }

    /// Current administrators.
    pub fn admins(&self) -> Vec<EmployeeId> {
        self.state.read().admins.iter().copied().collect()
    }

    /// Add a pending employee.
    pub fn add_pending(&self, pending: PendingEmployee) {
        let key = normalize_username(&pending.username);
        self.state.write().pending.insert(key, pending);
    }

    /// Remove and return a pending employee by username.
    pub fn take_pending(&self, username: &str) -> Option<PendingEmployee> {
        self.state.write().pending.remove(&normalize_username(username))
    }

    /// Pending employees.
    pub fn pending(&self) -> Vec<PendingEmployee> {
        self.state.read().pending.values().cloned().collect()
    }

    /// All employee records, approved or not.
    pub fn records(&self) -> Vec<EmployeeRecord> {
        self.state.read().employees.values().cloned().collect()
    }
}

/// Usernames compare without the `@` and case-insensitively.
pub fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

impl Directory for StaticDirectory {
    fn identity(&self, id: EmployeeId) -> Option<EmployeeIdentity> {
        self.state.read().employees.get(&id).map(EmployeeRecord::identity)
    }

    fn is_admin(&self, id: EmployeeId) -> bool {
        self.state.read().admins.contains(&id)
    }

    fn employee_ids(&self) -> Vec<EmployeeId> {
        self.state
            .read()
            .employees
            .values()
            .filter(|e| e.approved)
            .map(|e| e.id)
            .collect()
    }

    fn find_by_name(&self, plain_name: &str) -> Option<EmployeeId> {
        self.state
            .read()
            .employees
            .values()
            .find(|e| e.manual_name == plain_name)
            .map(|e| e.id)
    }
}
