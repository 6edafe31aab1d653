//! Spreadsheet mirror backends.

pub mod memory;
pub mod noop;
#[cfg(feature = "sheets")]
pub mod sheets;

pub use memory::InMemoryMirror;
pub use noop::NoopMirror;
#[cfg(feature = "sheets")]
pub use sheets::SheetsMirror;
