//! Configuration models for the office, storage backends and mirror sync.

pub mod backends;
pub mod office;

pub use backends::{MirrorBackendConfig, MirrorConfig, PrimaryBackendConfig, PrimaryConfig, SyncConfig};
pub use office::{builtin_assignment, OfficeConfig, WeeklyConfig, DEFAULT_UTC_OFFSET_MINUTES};
