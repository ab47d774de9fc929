//! Job scheduler runner -- owns the planner, worker pool and shared field.
//!
//! Split into focused submodules:
//! - `core`: JobScheduler struct, constructor, and accessor methods
//! - `scheduling`: id validation and batch planning for a cycle
//! - `execution`: dispatch, join barrier, and post-barrier merge

mod core;
mod execution;
mod scheduling;

pub use self::core::JobScheduler;
