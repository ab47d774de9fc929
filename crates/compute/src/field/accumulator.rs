use batchfield_core::{Contribution, GridShape, Position, Result};

use super::grid::SpatialGrid;

/// Applies additive contributions to a [`SpatialGrid`] and answers point queries.
#[derive(Debug, Clone)]
pub struct FieldAccumulator {
    grid: SpatialGrid,
}

impl FieldAccumulator {
    pub fn new(shape: GridShape) -> Result<Self> {
        Ok(Self {
            grid: SpatialGrid::new(shape)?,
        })
    }

    /// Accumulate every `(position, delta)` entry.
    ///
    /// All positions are checked before any cell is touched, so a rejected
    /// call leaves the field unmodified.
    pub fn apply<I>(&mut self, contributions: I) -> Result<()>
    where
        I: IntoIterator<Item = (Position, f64)>,
    {
        let entries: Vec<(Position, f64)> = contributions.into_iter().collect();
        for (pos, _) in &entries {
            self.grid.index(*pos)?;
        }
        for (pos, delta) in entries {
            self.grid.accumulate(pos, delta)?;
        }
        Ok(())
    }

    pub fn accumulate(&mut self, contribution: Contribution) -> Result<()> {
        self.grid.accumulate(contribution.position, contribution.delta)
    }

    pub fn query(&self, pos: Position) -> Result<f64> {
        self.grid.get(pos)
    }

    /// Sum a worker's private partial grid into this field.
    pub fn merge_partial(&mut self, partial: &SpatialGrid) -> Result<()> {
        self.grid.merge_from(partial)
    }

    pub fn shape(&self) -> GridShape {
        self.grid.shape()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }
}
