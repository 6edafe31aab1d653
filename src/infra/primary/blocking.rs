//! Synchronous access to a primary store for startup loads.
//!
//! Owns a current-thread runtime. Use it before the main runtime starts or
//! from a dedicated thread; calls made from inside an async context fail
//! instead of blocking a worker.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::runtime::{Builder, Runtime};

use crate::core::{
    DateRoster, DefaultAssignment, EmployeeRecord, PendingEmployee, PrimaryStore, QueueEntry,
    ScheduleError,
};
use crate::util::serde::EmployeeId;

/// Everything the service needs before it can answer commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupSnapshot {
    /// Stored default assignment.
    pub default: Option<DefaultAssignment>,
    /// Employees.
    pub employees: Vec<EmployeeRecord>,
    /// Administrator ids.
    pub admins: Vec<EmployeeId>,
    /// Pending employees.
    pub pending: Vec<PendingEmployee>,
}

/// Blocking facade over a [`PrimaryStore`].
pub struct BlockingPrimary {
    inner: Arc<dyn PrimaryStore>,
    runtime: Runtime,
}

impl BlockingPrimary {
    /// Wrap a store.
    pub fn new(inner: Arc<dyn PrimaryStore>) -> Result<Self, ScheduleError> {
        Ok(Self {
            inner,
            runtime: Self::runtime()?,
        })
    }

    /// Build the store on the facade's own runtime, so connection pools it
    /// opens are driven by that runtime.
    pub fn open<F, Fut, E>(open: F) -> Result<Self, ScheduleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PrimaryStore>, E>>,
        E: Display,
    {
        Self::outside_runtime()?;
        let runtime = Self::runtime()?;
        let inner = runtime.block_on(open()).map_err(ScheduleError::primary)?;
        Ok(Self { inner, runtime })
    }

    fn runtime() -> Result<Runtime, ScheduleError> {
        Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ScheduleError::primary)
    }

    fn outside_runtime() -> Result<(), ScheduleError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ScheduleError::primary(
                "blocking primary call made from inside an async runtime",
            ));
        }
        Ok(())
    }

    fn block_on<T, F>(&self, fut: F) -> Result<T, ScheduleError>
    where
        F: Future<Output = Result<T, ScheduleError>>,
    {
        Self::outside_runtime()?;
        self.runtime.block_on(fut)
    }

    /// Default assignment.
    pub fn load_default(&self) -> Result<Option<DefaultAssignment>, ScheduleError> {
        self.block_on(self.inner.load_default())
    }

    /// Employees.
    pub fn load_employees(&self) -> Result<Vec<EmployeeRecord>, ScheduleError> {
        self.block_on(self.inner.load_employees())
    }

    /// Administrator ids.
    pub fn load_admins(&self) -> Result<Vec<EmployeeId>, ScheduleError> {
        self.block_on(self.inner.load_admins())
    }

    /// Pending employees.
    pub fn load_pending(&self) -> Result<Vec<PendingEmployee>, ScheduleError> {
        self.block_on(self.inner.load_pending())
    }

    /// Roster of a date.
    pub fn load_roster(&self, date: NaiveDate) -> Result<Option<DateRoster>, ScheduleError> {
        self.block_on(self.inner.load_roster(date))
    }

    /// Waitlist of a date.
    pub fn load_queue(&self, date: NaiveDate) -> Result<Vec<QueueEntry>, ScheduleError> {
        self.block_on(self.inner.load_queue(date))
    }

    /// Load the directory and default assignment in one go.
    pub fn load_snapshot(&self) -> Result<StartupSnapshot, ScheduleError> {
        let inner = self.inner.clone();
        self.block_on(async move {
            Ok(StartupSnapshot {
                default: inner.load_default().await?,
                employees: inner.load_employees().await?,
                admins: inner.load_admins().await?,
                pending: inner.load_pending().await?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::primary::InMemoryPrimary;

    #[test]
    fn test_snapshot_loads_outside_runtime() {
        let store = Arc::new(InMemoryPrimary::new());
        let blocking = BlockingPrimary::new(store.clone()).unwrap();
        let snapshot = blocking.load_snapshot().unwrap();
        assert!(snapshot.default.is_none());
        assert!(snapshot.employees.is_empty());
    }

    #[test]
    fn test_open_builds_store_on_own_runtime() {
        let blocking = BlockingPrimary::open(|| async {
            let store: Arc<dyn PrimaryStore> = Arc::new(InMemoryPrimary::new());
            store.add_admin(7).await?;
            Ok::<_, ScheduleError>(store)
        })
        .unwrap();
        assert_eq!(blocking.load_admins().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_refuses_to_block_inside_runtime() {
        let store = Arc::new(InMemoryPrimary::new());
        let blocking = tokio::task::spawn_blocking(move || BlockingPrimary::new(store))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            blocking.load_admins(),
            Err(ScheduleError::PrimaryStoreUnavailable(_))
        ));
        tokio::task::spawn_blocking(move || drop(blocking)).await.unwrap();
    }
}
