//! # Seat Scheduler
//!
//! Capacity-constrained scheduling of a shared office with a fixed number of
//! seats per workday.
//!
//! A weekly default assignment says who sits where on each weekday. Employees
//! adjust it with weekly requests (extra days, skipped days), and for concrete
//! dates they can take a free seat or join a FIFO waitlist that is promoted
//! when someone gives their seat up.
//!
//! ## Storage
//!
//! Every write goes to an authoritative primary store first (Postgres, or an
//! in-memory store for development). A spreadsheet mirror is kept in sync on
//! a best-effort basis: mirror calls are rate limited, failed writes are
//! buffered and replayed by a background flusher, and reads fall back from
//! primary to mirror to a flat-file cache to built-in defaults.
//!
//! ## Key Features
//!
//! - **Schedule resolution**: default assignment plus weekly requests to per-day rosters
//! - **Live admission**: seat-or-waitlist with automatic promotion and notifications
//! - **Rate limiting**: sliding window with a reserved share for high-priority calls
//! - **Operation buffer**: bounded, priority-ordered replay of failed mirror writes
//! - **Read cascade**: primary, mirror, cache, fallback
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use seat_scheduler::builders::build_service;
//! use seat_scheduler::config::OfficeConfig;
//! use seat_scheduler::infra::LogNotifier;
//! use seat_scheduler::runtime::TokioSpawner;
//!
//! let cfg = OfficeConfig::from_env()?;
//! let spawner = TokioSpawner::current().expect("inside a tokio runtime");
//! let system = build_service(&cfg, Arc::new(LogNotifier), &spawner).await?;
//!
//! let today = system.service.today();
//! let outcome = system.service.admit(today, 42).await?;
//! ```
//!
//! For complete scenarios, see `tests/admission_test.rs` and `tests/sync_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling model, engines, service and storage seams.
pub mod core;
/// Configuration models for the office, backends and mirror sync.
pub mod config;
/// Builders to construct the service from configuration.
pub mod builders;
/// Storage, cache and notification adapters.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Rate limiting, buffering and the dual-store policy.
pub mod sync;
/// Shared utilities.
pub mod util;
