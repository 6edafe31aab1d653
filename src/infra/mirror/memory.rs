//! In-memory spreadsheet with failure switches, for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Collection, MirrorError, MirrorStore};

/// Sheets held in a map. Each trait call counts as one API call.
#[derive(Debug, Default)]
pub struct InMemoryMirror {
    sheets: Mutex<HashMap<Collection, Vec<Vec<String>>>>,
    rate_limited: AtomicBool,
    unavailable: AtomicBool,
    rejecting: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryMirror {
    /// Empty mirror, reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a sheet's contents without counting a call.
    pub fn seed(&self, collection: Collection, rows: Vec<Vec<String>>) {
        self.sheets.lock().insert(collection, rows);
    }

    /// Current rows of a sheet, header included.
    pub fn rows(&self, collection: Collection) -> Vec<Vec<String>> {
        self.sheets.lock().get(&collection).cloned().unwrap_or_default()
    }

    /// Answer every call with a quota error.
    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    /// Toggle reachability.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Refuse every write permanently.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Calls received so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), MirrorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MirrorError::Unavailable("in-memory mirror offline".into()));
        }
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(MirrorError::RateLimited);
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), MirrorError> {
        self.check()?;
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(MirrorError::Rejected("in-memory mirror rejecting writes".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirror {
    async fn read_rows(&self, collection: Collection) -> Result<Vec<Vec<String>>, MirrorError> {
        self.check()?;
        Ok(self.rows(collection))
    }

    async fn write_rows(&self, collection: Collection, rows: Vec<Vec<String>>) -> Result<(), MirrorError> {
        self.check_write()?;
        self.sheets.lock().insert(collection, rows);
        Ok(())
    }

    async fn append_row(&self, collection: Collection, row: Vec<String>) -> Result<(), MirrorError> {
        self.check_write()?;
        self.sheets.lock().entry(collection).or_default().push(row);
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_switches_map_to_error_kinds() {
        let mirror = InMemoryMirror::new();
        mirror.append_row(Collection::Logs, vec!["x".into()]).await.unwrap();
        assert_eq!(mirror.rows(Collection::Logs).len(), 1);

        mirror.set_rate_limited(true);
        assert_eq!(mirror.read_rows(Collection::Logs).await, Err(MirrorError::RateLimited));
        mirror.set_rate_limited(false);

        mirror.set_rejecting(true);
        assert!(matches!(
            mirror.write_rows(Collection::Logs, Vec::new()).await,
            Err(MirrorError::Rejected(_))
        ));
        mirror.set_rejecting(false);

        mirror.set_available(false);
        assert!(!mirror.is_reachable().await);
        assert!(matches!(
            mirror.read_rows(Collection::Logs).await,
            Err(MirrorError::Unavailable(_))
        ));
        assert_eq!(mirror.call_count(), 4);
    }
}
