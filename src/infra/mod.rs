//! Infrastructure adapters: primary stores, spreadsheet mirrors, the
//! flat-file cache and notification channels.

pub mod cache;
pub mod mirror;
pub mod notify;
pub mod primary;

pub use cache::{FileCache, MemoryCache};
pub use mirror::{InMemoryMirror, NoopMirror};
pub use notify::{Delivery, InMemoryNotifier, LogNotifier};
pub use primary::{BlockingPrimary, InMemoryPrimary, StartupSnapshot};
