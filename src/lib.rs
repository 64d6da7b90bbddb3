//! Workspace placeholder crate.
//!
//! Host applications can depend on `quiz-master-workspace` and enable the
//! documented features instead of wiring `core-service`, `core-auth` and the
//! bridge crates individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
