//! Shared spatial accumulator field.
//!
//! [`SpatialGrid`] is the raw bounds-checked storage, [`FieldAccumulator`]
//! applies additive contributions on top of it, and [`SharedField`] wraps the
//! accumulator for use across threads.

pub mod accumulator;
pub mod grid;
pub mod shared;

pub use accumulator::FieldAccumulator;
pub use grid::SpatialGrid;
pub use shared::SharedField;
