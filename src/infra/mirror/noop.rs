//! Mirror used when spreadsheet sync is disabled.

use async_trait::async_trait;

use crate::core::{Collection, MirrorError, MirrorStore};

/// Accepts every write and has no rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

#[async_trait]
impl MirrorStore for NoopMirror {
    async fn read_rows(&self, _collection: Collection) -> Result<Vec<Vec<String>>, MirrorError> {
        Ok(Vec::new())
    }

    async fn write_rows(&self, _collection: Collection, _rows: Vec<Vec<String>>) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn append_row(&self, _collection: Collection, _row: Vec<String>) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        true
    }
}
