//! Mirror store adapter: rate-limited access to the spreadsheet with
//! buffering of writes that could not be applied.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::store::{Collection, MirrorError, MirrorStore};
use crate::sync::buffer::{BufferedOperation, MirrorWrite, OperationBuffer};
use crate::sync::rate_limit::RateLimiter;
use crate::sync::rows::{self, Rows};

/// What happened to a mirror write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Applied to the sheet.
    Applied,
    /// Deferred for replay.
    Buffered,
    /// Refused permanently and discarded.
    Dropped,
}

/// Result of one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Operations applied.
    pub replayed: usize,
    /// Operations discarded after a permanent error.
    pub dropped: usize,
    /// Operations still pending.
    pub remaining: usize,
    /// Whether the cycle stopped on a rate-limited or unreachable call.
    pub halted: bool,
}

/// Rate-limited mirror access with an operation buffer.
pub struct MirrorSync {
    backend: Arc<dyn MirrorStore>,
    limiter: RateLimiter,
    buffer: OperationBuffer,
}

impl MirrorSync {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn MirrorStore>, limiter: RateLimiter, buffer: OperationBuffer) -> Self {
        Self {
            backend,
            limiter,
            buffer,
        }
    }

    /// Rate limiter in use.
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Pending-write buffer.
    pub const fn buffer(&self) -> &OperationBuffer {
        &self.buffer
    }

    /// Whether writes to `collection` are still waiting for replay.
    pub fn has_pending(&self, collection: Collection) -> bool {
        self.buffer.has_pending(collection)
    }

    fn acquire(&self, collection: Collection) -> Result<(), MirrorError> {
        if self.limiter.try_acquire(collection.priority()) {
            Ok(())
        } else {
            Err(MirrorError::RateLimited)
        }
    }

    /// Data rows of a sheet, header and blank rows removed.
    pub async fn read(&self, collection: Collection) -> Result<Rows, MirrorError> {
        self.acquire(collection)?;
        let sheet = self.backend.read_rows(collection).await?;
        Ok(rows::data_rows(sheet))
    }

    async fn apply(&self, collection: Collection, write: &MirrorWrite) -> Result<(), MirrorError> {
        match write {
            MirrorWrite::Append { row } => {
                self.acquire(collection)?;
                self.backend.append_row(collection, row.clone()).await
            }
            MirrorWrite::ReplaceAll { .. } => {
                self.acquire(collection)?;
                let sheet = rows::apply_write(collection, Vec::new(), write);
                self.backend.write_rows(collection, sheet).await
            }
            MirrorWrite::UpsertByKey { .. }
            | MirrorWrite::DeleteByKey { .. }
            | MirrorWrite::ReplaceByKey { .. } => {
                self.acquire(collection)?;
                let current = self.backend.read_rows(collection).await?;
                let sheet = rows::apply_write(collection, current, write);
                self.acquire(collection)?;
                self.backend.write_rows(collection, sheet).await
            }
        }
    }

    /// Apply a write now, or buffer it on a retryable failure. Writes to a
    /// collection that already has pending operations queue behind them.
    pub async fn write(&self, collection: Collection, write: MirrorWrite) -> WriteOutcome {
        if self.buffer.has_pending(collection) {
            debug!(collection = %collection, op = write.op_type(), "earlier writes pending; buffering");
            self.buffer.push(collection, write, collection.priority());
            return WriteOutcome::Buffered;
        }
        match self.apply(collection, &write).await {
            Ok(()) => WriteOutcome::Applied,
            Err(err) if err.is_retryable() => {
                debug!(collection = %collection, op = write.op_type(), error = %err, "mirror write buffered");
                self.buffer.push(collection, write, collection.priority());
                WriteOutcome::Buffered
            }
            Err(err) => {
                warn!(collection = %collection, op = write.op_type(), error = %err, "mirror write dropped");
                WriteOutcome::Dropped
            }
        }
    }

    /// Replay buffered writes in plan order. Stops at the first operation that
    /// is rate limited or hits an unreachable mirror.
    pub async fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        if self.buffer.is_empty() {
            return report;
        }
        if !self.backend.is_reachable().await {
            debug!(pending = self.buffer.len(), "mirror unreachable; flush skipped");
            report.remaining = self.buffer.len();
            report.halted = true;
            return report;
        }
        for op in self.buffer.plan() {
            match self.replay(&op).await {
                Ok(()) => {
                    self.buffer.remove(op.seq);
                    report.replayed += 1;
                }
                Err(err) if err.is_retryable() => {
                    debug!(collection = %op.collection, seq = op.seq, error = %err, "flush halted");
                    report.halted = true;
                    break;
                }
                Err(err) => {
                    warn!(collection = %op.collection, seq = op.seq, error = %err, "buffered write dropped");
                    self.buffer.remove(op.seq);
                    report.dropped += 1;
                }
            }
        }
        report.remaining = self.buffer.len();
        if report.replayed > 0 || report.dropped > 0 {
            info!(
                replayed = report.replayed,
                dropped = report.dropped,
                remaining = report.remaining,
                "mirror flush cycle finished"
            );
        }
        report
    }

    async fn replay(&self, op: &BufferedOperation) -> Result<(), MirrorError> {
        self.apply(op.collection, &op.write).await
    }
}
