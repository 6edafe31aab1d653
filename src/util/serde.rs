//! Small serializable types shared across modules.

use serde::{Deserialize, Serialize};

/// Stable employee identifier supplied by the directory (chat user id).
pub type EmployeeId = i64;

/// Priority class of an outbound mirror call.
///
/// `High` covers roster, employee and admin data; `Low` covers telemetry
/// and log appends. Ordered so that `High > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Telemetry and log appends; shed first under load.
    Low,
    /// Data-critical writes and reads; never blocked by the limiter.
    High,
}
