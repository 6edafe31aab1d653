//! Synchronization between the primary store and the spreadsheet mirror.

pub mod buffer;
pub mod dual;
pub mod flusher;
pub mod mirror;
pub mod rate_limit;
pub mod rows;

pub use buffer::{BufferedOperation, MirrorWrite, OperationBuffer, ReplayOrder};
pub use dual::DualStore;
pub use flusher::{Flusher, DEFAULT_FLUSH_INTERVAL};
pub use mirror::{FlushReport, MirrorSync, WriteOutcome};
pub use rate_limit::{RateLimit, RateLimiter};
