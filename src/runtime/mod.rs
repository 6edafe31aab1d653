//! Runtime adapters and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    health, release_seat, request_seat, roster_view, submit_weekly_request, week_view, Health, RosterView,
    SeatRequest, WeekView, WeeklyRequestSubmission,
};
pub use tokio_spawner::TokioSpawner;
