//! Primary store backends.

pub mod blocking;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use blocking::{BlockingPrimary, StartupSnapshot};
pub use memory::InMemoryPrimary;
#[cfg(feature = "postgres")]
pub use postgres::PostgresPrimary;
