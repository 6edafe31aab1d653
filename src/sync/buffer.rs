//! Bounded buffer of mirror writes waiting for replay.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::store::Collection;
use crate::util::clock::now_ms;
use crate::util::serde::Priority;

/// A sheet mutation, independent of when it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MirrorWrite {
    /// Replace every data row.
    ReplaceAll {
        /// New data rows.
        rows: Vec<Vec<String>>,
    },
    /// Replace the row whose leading cells equal `key`, or append it.
    UpsertByKey {
        /// Leading cells identifying the row.
        key: Vec<String>,
        /// Replacement row.
        row: Vec<String>,
    },
    /// Delete every row whose leading cells equal `key`.
    DeleteByKey {
        /// Leading cells identifying the rows.
        key: Vec<String>,
    },
    /// Replace every row whose leading cells equal `key` with `rows`.
    ReplaceByKey {
        /// Leading cells identifying the rows.
        key: Vec<String>,
        /// Replacement rows.
        rows: Vec<Vec<String>>,
    },
    /// Append one row.
    Append {
        /// Row to append.
        row: Vec<String>,
    },
}

impl MirrorWrite {
    /// Short operation name for logs.
    pub const fn op_type(&self) -> &'static str {
        match self {
            Self::ReplaceAll { .. } => "replace_all",
            Self::UpsertByKey { .. } => "upsert",
            Self::DeleteByKey { .. } => "delete",
            Self::ReplaceByKey { .. } => "replace_by_key",
            Self::Append { .. } => "append",
        }
    }
}

/// A deferred mirror write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedOperation {
    /// Monotonic sequence number; orders operations enqueued in the same millisecond.
    pub seq: u64,
    /// Target sheet.
    pub collection: Collection,
    /// Mutation to apply.
    pub write: MirrorWrite,
    /// Rate-limit class.
    pub priority: Priority,
    /// Enqueue time, milliseconds since the epoch.
    pub enqueued_at_ms: u128,
}

/// Replay order within a priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrder {
    /// Oldest first.
    #[default]
    OldestFirst,
    /// Newest first.
    NewestFirst,
}

#[derive(Debug, Default)]
struct BufferState {
    ops: VecDeque<BufferedOperation>,
    next_seq: u64,
}

/// Ring of pending mirror writes. When full, the oldest entry is evicted.
#[derive(Debug)]
pub struct OperationBuffer {
    state: Mutex<BufferState>,
    capacity: usize,
    order: ReplayOrder,
}

impl OperationBuffer {
    /// Default ring capacity.
    pub const DEFAULT_CAPACITY: usize = 5000;

    /// Create a buffer.
    pub fn new(capacity: usize, order: ReplayOrder) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            capacity: capacity.max(1),
            order,
        }
    }

    /// Append an operation. Returns the evicted entry when the ring was full.
    pub fn push(&self, collection: Collection, write: MirrorWrite, priority: Priority) -> Option<BufferedOperation> {
        let mut state = self.state.lock();
        let evicted = if state.ops.len() >= self.capacity {
            state.ops.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            warn!(collection = %old.collection, op = old.write.op_type(), "operation buffer full; oldest entry evicted");
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.ops.push_back(BufferedOperation {
            seq,
            collection,
            write,
            priority,
            enqueued_at_ms: now_ms(),
        });
        evicted
    }

    /// Snapshot in replay order: priority descending, then by age per [`ReplayOrder`].
    pub fn plan(&self) -> Vec<BufferedOperation> {
        let mut ops: Vec<BufferedOperation> = self.state.lock().ops.iter().cloned().collect();
        match self.order {
            ReplayOrder::OldestFirst => ops.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq))),
            ReplayOrder::NewestFirst => ops.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.seq.cmp(&a.seq))),
        }
        ops
    }

    /// Remove an operation after replay or permanent failure.
    pub fn remove(&self, seq: u64) -> bool {
        let mut state = self.state.lock();
        match state.ops.iter().position(|op| op.seq == seq) {
            Some(index) => state.ops.remove(index).is_some(),
            None => false,
        }
    }

    /// Whether any write for `collection` is waiting.
    pub fn has_pending(&self, collection: Collection) -> bool {
        self.state.lock().ops.iter().any(|op| op.collection == collection)
    }

    /// Pending operations.
    pub fn len(&self) -> usize {
        self.state.lock().ops.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.state.lock().ops.is_empty()
    }

    /// Ring capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured replay order.
    pub const fn order(&self) -> ReplayOrder {
        self.order
    }
}

impl Default for OperationBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, ReplayOrder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(tag: &str) -> MirrorWrite {
        MirrorWrite::Append {
            row: vec![tag.to_string()],
        }
    }

    fn tags(ops: &[BufferedOperation]) -> Vec<String> {
        ops.iter()
            .map(|op| match &op.write {
                MirrorWrite::Append { row } => row[0].clone(),
                other => other.op_type().to_string(),
            })
            .collect()
    }

    #[test]
    fn test_oldest_entry_evicted_when_full() {
        let buffer = OperationBuffer::new(2, ReplayOrder::OldestFirst);
        assert!(buffer.push(Collection::Logs, append("a"), Priority::Low).is_none());
        assert!(buffer.push(Collection::Logs, append("b"), Priority::Low).is_none());
        let evicted = buffer.push(Collection::Logs, append("c"), Priority::Low).unwrap();
        assert_eq!(tags(&[evicted]), vec!["a"]);
        assert_eq!(tags(&buffer.plan()), vec!["b", "c"]);
    }

    #[test]
    fn test_plan_orders_priority_then_age() {
        let buffer = OperationBuffer::new(10, ReplayOrder::OldestFirst);
        buffer.push(Collection::Logs, append("low1"), Priority::Low);
        buffer.push(Collection::Queue, append("high1"), Priority::High);
        buffer.push(Collection::Queue, append("high2"), Priority::High);
        assert_eq!(tags(&buffer.plan()), vec!["high1", "high2", "low1"]);

        let newest = OperationBuffer::new(10, ReplayOrder::NewestFirst);
        newest.push(Collection::Logs, append("low1"), Priority::Low);
        newest.push(Collection::Queue, append("high1"), Priority::High);
        newest.push(Collection::Queue, append("high2"), Priority::High);
        assert_eq!(tags(&newest.plan()), vec!["high2", "high1", "low1"]);
    }

    #[test]
    fn test_pending_per_collection() {
        let buffer = OperationBuffer::default();
        buffer.push(Collection::Schedules, append("x"), Priority::High);
        assert!(buffer.has_pending(Collection::Schedules));
        assert!(!buffer.has_pending(Collection::Queue));
        let seq = buffer.plan()[0].seq;
        assert!(buffer.remove(seq));
        assert!(buffer.is_empty());
    }
}
