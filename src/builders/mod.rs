//! Builders to construct the scheduler from configuration.

pub mod service_builder;

pub use service_builder::{
    assemble, assemble_with_clock, build_mirror_backend, build_parts, build_primary, build_service,
    startup_snapshot, SeatSystem, StoreParts, AUDIT_RETENTION,
};
